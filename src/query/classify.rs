//! Maps free-form query text onto one of the teaching archetypes.
//!
//! Not a SQL parser: a handful of literal substrings are
//! recognized and everything else is [`Archetype::Unsupported`].

use std::fmt;

use serde::Serialize;

/// Keyword that selects the equality-join archetype.
pub const JOIN_KEYWORD: &str = "join";
/// Literal predicate answered by a key-index seek.
pub const SEEK_PATTERN: &str = "id = 1";
/// Literal predicate answered by a sequential scan with a filter.
pub const SCAN_PATTERN: &str = "age > 25";

/// Query-shape category chosen once per run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Equality predicate on the key column: one direct index access.
    IndexSeek,
    /// Comparison on a non-indexed column: visit every row and filter.
    SequentialFilterScan,
    /// Two relations matched on `key = foreign key` with a nested loop.
    EqualityJoin,
    /// Anything the simulator does not recognize.
    Unsupported,
}

impl Archetype {
    /// Every archetype, in classification order.
    pub const ALL: [Archetype; 4] = [
        Archetype::EqualityJoin,
        Archetype::IndexSeek,
        Archetype::SequentialFilterScan,
        Archetype::Unsupported,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Archetype::IndexSeek => "index_seek",
            Archetype::SequentialFilterScan => "sequential_filter_scan",
            Archetype::EqualityJoin => "equality_join",
            Archetype::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies `query`. First match wins; the order matters because a join
/// query may also contain `id = 1`.
pub fn classify(query: &str) -> Archetype {
    let normalized = query.to_lowercase();
    if normalized.contains(JOIN_KEYWORD) {
        Archetype::EqualityJoin
    } else if normalized.contains(SEEK_PATTERN) {
        Archetype::IndexSeek
    } else if normalized.contains(SCAN_PATTERN) {
        Archetype::SequentialFilterScan
    } else {
        Archetype::Unsupported
    }
}
