#![forbid(unsafe_code)]

//! Shared identifiers and the crate-wide error type.

use std::fmt;

/// Monotonic identifier handed to every simulator run.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, serde::Serialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Errors surfaced by the simulator core.
#[derive(thiserror::Error, Debug)]
pub enum SimError {
    /// The run was superseded by a newer run and must not touch shared state.
    #[error("run was superseded by a newer run")]
    Cancelled,
    /// The relation store has no table with this name.
    #[error("unknown relation '{name}'")]
    UnknownRelation {
        /// Requested relation name.
        name: String,
    },
    /// The relation exists but does not declare the column.
    #[error("relation '{relation}' has no column '{column}'")]
    UnknownColumn {
        /// Relation that was inspected.
        relation: String,
        /// Missing column name.
        column: String,
    },
    /// Invalid argument with a static description.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Invalid argument with a formatted description.
    #[error("invalid argument: {0}")]
    InvalidOwned(String),
    /// The background task driving a run panicked or was aborted.
    #[error("run task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SimError {
    /// Builds an [`SimError::UnknownRelation`].
    pub fn unknown_relation(name: impl Into<String>) -> Self {
        SimError::UnknownRelation { name: name.into() }
    }

    /// Builds an [`SimError::UnknownColumn`].
    pub fn unknown_column(relation: impl Into<String>, column: impl Into<String>) -> Self {
        SimError::UnknownColumn {
            relation: relation.into(),
            column: column.into(),
        }
    }

    /// Returns `true` when the error only signals that a run went stale.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SimError::Cancelled)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;
