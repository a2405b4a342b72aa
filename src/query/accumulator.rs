//! Ordered result rows produced by a run.

use crate::relation::Row;

/// Append-only list of result rows in discovery order.
///
/// Rows are never resorted or removed. Each run starts from a fresh
/// accumulator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultAccumulator {
    rows: Vec<Row>,
}

impl ResultAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row and returns its position.
    pub fn push(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Rows in discovery order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when nothing has been produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consumes the accumulator.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Field union of a matched pair. Columns present on both sides take the
/// right-hand value.
pub fn merge_rows(left: &Row, right: &Row) -> Row {
    let mut merged = left.clone();
    merged.extend(right.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
