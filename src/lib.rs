//! Query execution simulator for teaching relational database internals.
//!
//! A short query string is classified into one of a few archetypes (index
//! seek, sequential filter scan, nested-loop equality join), expanded into a
//! script of steps, and interpreted over small in-memory tables. Subscribers
//! observe row highlights and result rows as the run progresses.
//!
//! ```no_run
//! use std::sync::Arc;
//! use queryscope::query::{Pacing, Simulator};
//! use queryscope::relation::fixtures::playground_relations;
//!
//! # async fn demo() -> queryscope::types::Result<()> {
//! let sim = Simulator::new(Arc::new(playground_relations()?), Pacing::default());
//! let report = sim.run("SELECT * FROM users WHERE age > 25").await?;
//! assert_eq!(report.rows.len(), 3);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod query;
pub mod relation;
pub mod types;

pub use query::{Archetype, Pacing, RunReport, SimEvent, Simulator};
pub use types::{Result, RunId, SimError};
