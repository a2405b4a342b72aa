//! Publication of run progress to subscribers.
//!
//! The interpreter owns its highlight and result state. After every mutation
//! it hands an immutable [`BoardSnapshot`] plus the matching [`SimEvent`]s to
//! the [`Stage`], which publishes them only if the run's token is still live.
//! The liveness check and the publish happen under one lock, and starting a
//! run advances the epoch under that same lock, so nothing from a superseded
//! run can be observed after the newer run's `RunStarted`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::query::classify::Archetype;
use crate::query::script::{Script, Step};
use crate::query::timing::{RunEpoch, RunToken};
use crate::query::trace::{HighlightState, RunState};
use crate::relation::Row;
use crate::types::{Result, RunId, SimError};

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Immutable view of the live run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BoardSnapshot {
    /// Publication sequence number, increasing across runs.
    pub seq: u64,
    /// Run that produced the snapshot; `None` before the first run.
    pub run: Option<RunId>,
    /// Archetype of the run.
    pub archetype: Option<Archetype>,
    /// State machine position.
    pub state: RunState,
    /// Step cursor, `-1` before the first step.
    pub cursor: isize,
    /// Script steps.
    pub steps: Vec<Step>,
    /// Active rows per relation.
    pub highlight: HighlightState,
    /// Result rows in discovery order.
    pub results: Vec<Row>,
}

/// Progress notification tagged with the run that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A run was issued and shared state was reset.
    RunStarted {
        /// Run identifier.
        run: RunId,
        /// Chosen archetype.
        archetype: Archetype,
        /// Script to be executed.
        steps: Vec<Step>,
    },
    /// The cursor moved to a step.
    StepStarted {
        /// Run identifier.
        run: RunId,
        /// Step index.
        index: usize,
        /// Step being executed.
        step: Step,
    },
    /// Highlight changed during a step.
    Highlight {
        /// Run identifier.
        run: RunId,
        /// Step index.
        index: usize,
        /// Full highlight after the change.
        highlight: HighlightState,
    },
    /// A result row was appended.
    RowEmitted {
        /// Run identifier.
        run: RunId,
        /// Step index.
        index: usize,
        /// Position in the result set.
        position: usize,
        /// The row.
        row: Row,
    },
    /// The run stopped.
    RunFinished {
        /// Run identifier.
        run: RunId,
        /// Terminal state.
        state: RunState,
        /// Number of result rows.
        rows: usize,
    },
}

impl SimEvent {
    /// Run that produced the event.
    pub fn run(&self) -> RunId {
        match self {
            SimEvent::RunStarted { run, .. }
            | SimEvent::StepStarted { run, .. }
            | SimEvent::Highlight { run, .. }
            | SimEvent::RowEmitted { run, .. }
            | SimEvent::RunFinished { run, .. } => *run,
        }
    }

    /// Whether the event represents a write to highlight or result state.
    pub fn is_write(&self) -> bool {
        matches!(self, SimEvent::Highlight { .. } | SimEvent::RowEmitted { .. })
    }
}

/// Shared publication point for every run of one simulator.
#[derive(Clone)]
pub(crate) struct Stage {
    inner: Arc<StageInner>,
}

struct StageInner {
    seq: Mutex<u64>,
    epoch: RunEpoch,
    events: broadcast::Sender<SimEvent>,
    snapshots: watch::Sender<Arc<BoardSnapshot>>,
}

impl Stage {
    pub(crate) fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let (snapshots, _) = watch::channel(Arc::new(BoardSnapshot {
            cursor: -1,
            ..BoardSnapshot::default()
        }));
        Self {
            inner: Arc::new(StageInner {
                seq: Mutex::new(0),
                epoch: RunEpoch::new(),
                events,
                snapshots,
            }),
        }
    }

    /// Invalidates the live run, resets the board, and issues a new token.
    pub(crate) fn begin(&self, script: &Script) -> RunToken {
        let mut seq = self.inner.seq.lock();
        let previous = self.inner.epoch.live();
        let token = self.inner.epoch.advance();
        if let Some(previous) = previous {
            debug!(previous = previous.0, next = token.id().0, "sim.run.invalidate");
        }
        *seq += 1;
        let snapshot = BoardSnapshot {
            seq: *seq,
            run: Some(token.id()),
            archetype: Some(script.archetype),
            state: RunState::Idle,
            cursor: -1,
            steps: script.steps.clone(),
            highlight: HighlightState::new(),
            results: Vec::new(),
        };
        let _ = self.inner.events.send(SimEvent::RunStarted {
            run: token.id(),
            archetype: script.archetype,
            steps: script.steps.clone(),
        });
        self.inner.snapshots.send_replace(Arc::new(snapshot));
        token
    }

    /// Publishes `events` and a snapshot built by `build` if `token` is live.
    pub(crate) fn publish<F>(&self, token: &RunToken, events: Vec<SimEvent>, build: F) -> Result<()>
    where
        F: FnOnce(u64) -> BoardSnapshot,
    {
        let mut seq = self.inner.seq.lock();
        if !token.is_live() {
            return Err(SimError::Cancelled);
        }
        *seq += 1;
        let snapshot = build(*seq);
        for event in events {
            let _ = self.inner.events.send(event);
        }
        self.inner.snapshots.send_replace(Arc::new(snapshot));
        Ok(())
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<Arc<BoardSnapshot>> {
        self.inner.snapshots.subscribe()
    }

    pub(crate) fn snapshot(&self) -> Arc<BoardSnapshot> {
        Arc::clone(&self.inner.snapshots.borrow())
    }

    pub(crate) fn live_run(&self) -> Option<RunId> {
        self.inner.epoch.live()
    }
}
