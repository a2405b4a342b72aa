#![forbid(unsafe_code)]

//! Relations (named tables) the simulator reads from.
//!
//! The simulator never mutates relations; it only resolves them by name
//! through a [`RelationStore`] and walks their rows by position.

/// Built-in `users`/`orders` tables.
pub mod fixtures;

/// Relation type, row alias, and store trait.
pub mod store;

/// Cell values and index keys.
pub mod value;

pub use store::{row, InMemoryRelations, Relation, RelationStore, Row};
pub use value::{IndexKey, Value};
