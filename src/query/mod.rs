#![forbid(unsafe_code)]

//! Query execution simulator.
//!
//! Text is classified into a teaching archetype, the archetype is expanded
//! into a fixed script of steps, and the interpreter walks that script over
//! in-memory relations while publishing highlight and result events.

/// Ordered, append-only result rows.
pub mod accumulator;

/// Snapshot and event publication.
pub mod board;

/// Query text → archetype.
pub mod classify;

/// Strategy trees with abstract cost estimates.
pub mod explain;

/// Step-by-step execution of a script.
pub mod interpreter;

/// Opt-in work counters.
pub mod profile;

/// Archetype → step script.
pub mod script;

/// Public entry point owning runs and subscriptions.
pub mod simulator;

/// Pacing and run invalidation tokens.
pub mod timing;

/// Step cursor, highlights, and run state.
pub mod trace;

pub use board::{BoardSnapshot, SimEvent};
pub use classify::{classify, Archetype};
pub use explain::{explain, PlanExplain};
pub use interpreter::{estimated_duration, RunReport};
pub use script::{build_script, Script, Step, StepKind};
pub use simulator::{RunHandle, Simulator};
pub use timing::Pacing;
pub use trace::{AbortReason, HighlightState, RunState};
