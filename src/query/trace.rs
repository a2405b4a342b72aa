//! Run progress: the step cursor, row highlights, and run state.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::query::script::Step;

/// Row indices currently marked active, per relation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HighlightState {
    active: BTreeMap<String, BTreeSet<usize>>,
}

impl HighlightState {
    /// Empty highlight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the highlight with exactly one row.
    pub fn focus(&mut self, relation: &str, index: usize) {
        self.active.clear();
        self.mark(relation, index);
    }

    /// Replaces the highlight with one row in each of two relations.
    pub fn focus_pair(&mut self, left: &str, left_index: usize, right: &str, right_index: usize) {
        self.active.clear();
        self.mark(left, left_index);
        self.mark(right, right_index);
    }

    /// Adds a row to the highlight.
    pub fn mark(&mut self, relation: &str, index: usize) {
        self.active
            .entry(relation.to_owned())
            .or_default()
            .insert(index);
    }

    /// Clears every highlight. Returns `true` if anything was active.
    pub fn clear(&mut self) -> bool {
        let had_any = !self.active.is_empty();
        self.active.clear();
        had_any
    }

    /// Active rows of `relation`.
    pub fn rows(&self, relation: &str) -> Vec<usize> {
        self.active
            .get(relation)
            .map(|rows| rows.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `index` of `relation` is active.
    pub fn is_active(&self, relation: &str, index: usize) -> bool {
        self.active
            .get(relation)
            .is_some_and(|rows| rows.contains(&index))
    }

    /// Relations that currently have an active row.
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    /// Returns `true` when nothing is highlighted.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Steps of a run plus a cursor that only moves forward.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExecutionTrace {
    steps: Vec<Step>,
    cursor: Option<usize>,
}

impl ExecutionTrace {
    /// Creates a trace positioned before the first step.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            cursor: None,
        }
    }

    /// Moves to the next step and returns its index, or `None` at the end.
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.steps.len() {
            return None;
        }
        self.cursor = Some(next);
        Some(next)
    }

    /// Cursor as a signed index: `-1` before the first step.
    pub fn cursor(&self) -> isize {
        self.cursor.map_or(-1, |c| c as isize)
    }

    /// Step under the cursor.
    pub fn current(&self) -> Option<&Step> {
        self.cursor.and_then(|c| self.steps.get(c))
    }

    /// All steps.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the cursor rests on the last step.
    pub fn is_finished(&self) -> bool {
        !self.steps.is_empty() && self.cursor == Some(self.steps.len() - 1)
    }
}

/// Why a run stopped before completing its script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The query was not recognized; the run emitted its error step.
    Unsupported,
    /// A newer run started.
    Superseded,
    /// The relation store could not serve the script.
    Failed {
        /// Error description.
        message: String,
    },
}

/// Interpreter state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// No step executed yet.
    #[default]
    Idle,
    /// Executing the step at `step`.
    Running {
        /// Index of the current step.
        step: usize,
    },
    /// Every step executed.
    Completed,
    /// Stopped early.
    Aborted {
        /// Reason for stopping.
        reason: AbortReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::classify::Archetype;
    use crate::query::script::build_script;

    #[test]
    fn cursor_starts_before_first_step_and_stops_at_last() {
        let mut trace = ExecutionTrace::new(build_script(Archetype::IndexSeek).steps);
        assert_eq!(trace.cursor(), -1);
        assert!(trace.current().is_none());
        assert_eq!(trace.advance(), Some(0));
        assert_eq!(trace.advance(), Some(1));
        assert_eq!(trace.advance(), Some(2));
        assert!(trace.is_finished());
        assert_eq!(trace.advance(), None);
        assert_eq!(trace.cursor(), 2);
    }

    #[test]
    fn focus_replaces_previous_rows() {
        let mut highlight = HighlightState::new();
        highlight.focus("users", 0);
        highlight.focus("users", 3);
        assert_eq!(highlight.rows("users"), vec![3]);
        highlight.focus_pair("users", 1, "orders", 2);
        assert!(highlight.is_active("users", 1));
        assert!(highlight.is_active("orders", 2));
        assert!(!highlight.is_active("users", 3));
        assert!(highlight.clear());
        assert!(!highlight.clear());
        assert!(highlight.is_empty());
    }
}
