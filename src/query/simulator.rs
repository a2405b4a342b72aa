//! Entry point tying classification, scripting, and interpretation together.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::PlaygroundConfig;
use crate::query::board::{BoardSnapshot, SimEvent, Stage, DEFAULT_EVENT_CAPACITY};
use crate::query::classify::{classify, Archetype};
use crate::query::explain::{explain, PlanExplain};
use crate::query::interpreter::{Interpreter, RunReport};
use crate::query::script::{build_script, Script};
use crate::query::timing::Pacing;
use crate::relation::RelationStore;
use crate::types::{Result, RunId};

/// Runs queries against a relation store, one live run at a time.
///
/// Starting a run while another is still animating aborts the older run and
/// restarts from a clean board: the older run's pending pauses wake up, see
/// that they were superseded, and exit without publishing anything.
pub struct Simulator {
    store: Arc<dyn RelationStore>,
    pacing: Pacing,
    stage: Stage,
}

impl Simulator {
    /// Creates a simulator with the default event channel capacity.
    pub fn new(store: Arc<dyn RelationStore>, pacing: Pacing) -> Self {
        Self::with_event_capacity(store, pacing, DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a simulator whose event channel buffers `capacity` events per
    /// subscriber before slow subscribers start lagging.
    pub fn with_event_capacity(
        store: Arc<dyn RelationStore>,
        pacing: Pacing,
        capacity: usize,
    ) -> Self {
        Self {
            store,
            pacing,
            stage: Stage::new(capacity),
        }
    }

    /// Builds a simulator from a loaded configuration.
    pub fn from_config(config: &PlaygroundConfig) -> Result<Self> {
        let pacing = config.pacing()?;
        let store = config.relations()?;
        Ok(Self::with_event_capacity(
            Arc::new(store),
            pacing,
            config.event_capacity(),
        ))
    }

    /// Relation store backing every run.
    pub fn store(&self) -> &Arc<dyn RelationStore> {
        &self.store
    }

    /// Pacing applied to every run.
    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Classifies `query` and builds its script without running it.
    pub fn plan(&self, query: &str) -> Script {
        build_script(classify(query))
    }

    /// Explains the strategy the simulator would use for `query`.
    pub fn explain(&self, query: &str) -> Result<PlanExplain> {
        explain(&self.plan(query), self.store.as_ref())
    }

    /// Receives every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.stage.subscribe()
    }

    /// Receives the latest board snapshot whenever it changes.
    pub fn watch(&self) -> watch::Receiver<Arc<BoardSnapshot>> {
        self.stage.watch()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        self.stage.snapshot()
    }

    /// Identifier of the live run, if any run was started.
    pub fn live_run(&self) -> Option<RunId> {
        self.stage.live_run()
    }

    /// Starts a run on the current Tokio runtime, superseding any live run.
    ///
    /// The previous run is invalidated and the board reset before this call
    /// returns.
    pub fn start(&self, query: &str) -> RunHandle {
        let script = self.plan(query);
        let archetype = script.archetype;
        let token = self.stage.begin(&script);
        let run = token.id();
        info!(run = run.0, %archetype, query, "sim.run.start");
        let interpreter = Interpreter::new(
            Arc::clone(&self.store),
            self.pacing,
            self.stage.clone(),
            token,
            script,
        );
        RunHandle {
            run,
            archetype,
            task: tokio::spawn(interpreter.run()),
        }
    }

    /// Starts a run and waits for it to stop.
    pub async fn run(&self, query: &str) -> Result<RunReport> {
        self.start(query).join().await
    }
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    run: RunId,
    archetype: Archetype,
    task: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    /// Run identifier.
    pub fn id(&self) -> RunId {
        self.run
    }

    /// Archetype chosen for the run.
    pub fn archetype(&self) -> Archetype {
        self.archetype
    }

    /// Waits for the run to stop.
    pub async fn join(self) -> Result<RunReport> {
        self.task.await?
    }
}
