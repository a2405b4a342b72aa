//! Read-only relation storage consumed by the interpreter.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::relation::value::{IndexKey, Value};
use crate::types::{Result, SimError};

/// Single row represented as a mapping from column name to value.
pub type Row = BTreeMap<String, Value>;

/// Named table with an ordered column list and positionally identified rows.
///
/// A relation is immutable once built. When a key column is declared, a
/// key index is built up front so seeks resolve without touching other rows.
#[derive(Clone, Debug, Serialize)]
pub struct Relation {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    key: Option<String>,
    #[serde(skip)]
    key_index: BTreeMap<IndexKey, usize>,
}

impl Relation {
    /// Creates a relation, rejecting rows that use undeclared columns.
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SimError::Invalid("relation name cannot be empty"));
        }
        let declared: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
        if declared.len() != columns.len() {
            return Err(SimError::InvalidOwned(format!(
                "relation '{name}' declares a column twice"
            )));
        }
        for row in &rows {
            if let Some(column) = row.keys().find(|col| !declared.contains(col.as_str())) {
                return Err(SimError::unknown_column(name, column.clone()));
            }
        }
        Ok(Self {
            name,
            columns,
            rows,
            key: None,
            key_index: BTreeMap::new(),
        })
    }

    /// Declares `column` as the unique key and builds its index.
    pub fn with_key(mut self, column: &str) -> Result<Self> {
        if !self.has_column(column) {
            return Err(SimError::unknown_column(&self.name, column));
        }
        let mut index = BTreeMap::new();
        for (pos, row) in self.rows.iter().enumerate() {
            let key = row
                .get(column)
                .and_then(Value::index_key)
                .ok_or_else(|| {
                    SimError::InvalidOwned(format!(
                        "row {pos} of '{}' has no indexable '{column}' value",
                        self.name
                    ))
                })?;
            if index.insert(key, pos).is_some() {
                return Err(SimError::InvalidOwned(format!(
                    "duplicate key in '{}.{column}' at row {pos}",
                    self.name
                )));
            }
        }
        self.key = Some(column.to_owned());
        self.key_index = index;
        Ok(self)
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Ordered rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row at `index`, if in range.
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the relation has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Declared key column, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether `column` is declared on this relation.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Whether `column` can be answered by the key index.
    pub fn is_indexed(&self, column: &str) -> bool {
        self.key.as_deref() == Some(column)
    }

    /// Locates the row whose key equals `value` through the key index.
    pub fn seek(&self, value: &Value) -> Option<usize> {
        let key = value.index_key()?;
        self.key_index.get(&key).copied()
    }
}

/// Provides read-only access to named relations.
pub trait RelationStore: Send + Sync {
    /// Resolves a relation by name.
    fn relation(&self, name: &str) -> Result<Arc<Relation>>;
    /// Names of every relation in the store, in a stable order.
    fn relation_names(&self) -> Vec<String>;
}

/// Simple in-memory relation store used for fixtures and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRelations {
    relations: BTreeMap<String, Arc<Relation>>,
}

impl InMemoryRelations {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a relation, replacing any previous one with the same name.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations
            .insert(relation.name().to_owned(), Arc::new(relation));
        self
    }

    /// Number of registered relations.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Returns `true` when no relation is registered.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl RelationStore for InMemoryRelations {
    fn relation(&self, name: &str) -> Result<Arc<Relation>> {
        self.relations
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::unknown_relation(name))
    }

    fn relation_names(&self) -> Vec<String> {
        self.relations.keys().cloned().collect()
    }
}

/// Builds a [`Row`] from `(column, value)` pairs.
pub fn row<I, K, V>(cells: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
