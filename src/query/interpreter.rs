//! Step-by-step interpretation of a [`Script`] against a relation store.
//!
//! The interpreter walks steps strictly in order and performs real row work:
//! sequential scans, a single key-index seek, and an O(n·m) nested-loop
//! equi-join. It suspends only at pacing points between steps and between
//! rows (or row pairs); predicates are evaluated without suspending.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::query::accumulator::{merge_rows, ResultAccumulator};
use crate::query::board::{BoardSnapshot, SimEvent, Stage};
use crate::query::classify::Archetype;
use crate::query::profile::{record_profile, SimProfileKind};
use crate::query::script::{Comparison, JoinSpec, Script, Step};
use crate::query::timing::{Pacing, RunToken};
use crate::query::trace::{AbortReason, ExecutionTrace, HighlightState, RunState};
use crate::relation::{Relation, RelationStore, Row, Value};
use crate::types::{Result, RunId, SimError};

/// Outcome of a run as seen by the task that drove it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run: RunId,
    /// Archetype that was executed.
    pub archetype: Archetype,
    /// Script fingerprint.
    pub fingerprint: u64,
    /// Terminal state.
    pub state: RunState,
    /// Index of the last step entered, `-1` if none.
    pub cursor: isize,
    /// Rows this run produced, in discovery order.
    pub rows: Vec<Row>,
}

/// Executes one script for one run.
pub(crate) struct Interpreter {
    store: Arc<dyn RelationStore>,
    pacing: Pacing,
    stage: Stage,
    token: RunToken,
    archetype: Archetype,
    fingerprint: u64,
    trace: ExecutionTrace,
    highlight: HighlightState,
    results: ResultAccumulator,
    state: RunState,
}

impl Interpreter {
    pub(crate) fn new(
        store: Arc<dyn RelationStore>,
        pacing: Pacing,
        stage: Stage,
        token: RunToken,
        script: Script,
    ) -> Self {
        Self {
            store,
            pacing,
            stage,
            token,
            archetype: script.archetype,
            fingerprint: script.fingerprint,
            trace: ExecutionTrace::new(script.steps),
            highlight: HighlightState::new(),
            results: ResultAccumulator::new(),
            state: RunState::Idle,
        }
    }

    /// Drives the script to a terminal state.
    ///
    /// A superseded run returns `Ok` with [`AbortReason::Superseded`]; it
    /// publishes nothing once it notices. Store failures are published as
    /// [`AbortReason::Failed`] and returned as errors.
    pub(crate) async fn run(mut self) -> Result<RunReport> {
        let run = self.token.id();
        debug!(
            run = run.0,
            archetype = %self.archetype,
            steps = self.trace.steps().len(),
            "sim.run.begin"
        );
        match self.execute().await {
            Ok(()) => Ok(self.into_report()),
            Err(SimError::Cancelled) => {
                record_profile(SimProfileKind::RunSuperseded);
                debug!(run = run.0, cursor = self.trace.cursor(), "sim.run.superseded");
                self.state = RunState::Aborted {
                    reason: AbortReason::Superseded,
                };
                Ok(self.into_report())
            }
            Err(err) => {
                let message = err.to_string();
                let _ = self.finish(RunState::Aborted {
                    reason: AbortReason::Failed { message },
                });
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> Result<()> {
        while let Some(index) = self.trace.advance() {
            let step = self.trace.steps()[index].clone();
            self.state = RunState::Running { step: index };
            let mut events = vec![SimEvent::StepStarted {
                run: self.token.id(),
                index,
                step: step.clone(),
            }];
            if self.highlight.clear() {
                events.push(self.highlight_event(index));
            }
            self.commit(events)?;
            debug!(
                run = self.token.id().0,
                index,
                kind = %step.kind(),
                text = step.text(),
                "sim.step.begin"
            );

            match &step {
                Step::Info { .. } | Step::Success { .. } => {}
                Step::Error { .. } => {
                    return self.finish(RunState::Aborted {
                        reason: AbortReason::Unsupported,
                    });
                }
                Step::Scan {
                    relation, filter, ..
                } => self.scan(index, relation, filter.as_ref()).await?,
                Step::Filter {
                    relation,
                    predicate,
                    ..
                } => self.filter(index, relation, predicate).await?,
                Step::Seek {
                    relation,
                    column,
                    value,
                    ..
                } => self.seek(index, relation, column, value).await?,
                Step::Match { join, .. } => self.nested_loop(index, join).await?,
            }
            self.token.pause(self.pacing.step_gap).await?;
        }
        self.finish(RunState::Completed)
    }

    async fn scan(
        &mut self,
        index: usize,
        relation: &str,
        filter: Option<&Comparison>,
    ) -> Result<()> {
        let rel = self.store.relation(relation)?;
        if let Some(pred) = filter {
            require_column(&rel, &pred.column)?;
        }
        for pos in 0..rel.len() {
            record_profile(SimProfileKind::ScanRow);
            self.highlight.focus(rel.name(), pos);
            let event = self.highlight_event(index);
            self.commit(vec![event])?;
            self.token.pause(self.pacing.scan_row).await?;
            if let (Some(pred), Some(row)) = (filter, rel.row(pos)) {
                record_profile(SimProfileKind::PredicateEval);
                if pred.evaluate(row) {
                    self.emit(index, row.clone())?;
                }
            }
        }
        Ok(())
    }

    async fn filter(&mut self, index: usize, relation: &str, predicate: &Comparison) -> Result<()> {
        let rel = self.store.relation(relation)?;
        require_column(&rel, &predicate.column)?;
        for pos in 0..rel.len() {
            record_profile(SimProfileKind::FilterRow);
            self.highlight.focus(rel.name(), pos);
            let event = self.highlight_event(index);
            self.commit(vec![event])?;
            self.token.pause(self.pacing.filter_row).await?;
            if let Some(row) = rel.row(pos) {
                record_profile(SimProfileKind::PredicateEval);
                if predicate.evaluate(row) {
                    self.emit(index, row.clone())?;
                }
            }
        }
        Ok(())
    }

    async fn seek(&mut self, index: usize, relation: &str, column: &str, value: &Value) -> Result<()> {
        let rel = self.store.relation(relation)?;
        require_column(&rel, column)?;
        if !rel.is_indexed(column) {
            return Err(SimError::InvalidOwned(format!(
                "no key index on {relation}.{column}"
            )));
        }
        record_profile(SimProfileKind::Seek);
        let found = rel.seek(value);
        if let Some(pos) = found {
            self.highlight.focus(rel.name(), pos);
            let event = self.highlight_event(index);
            self.commit(vec![event])?;
        }
        self.token.pause(self.pacing.seek_latency).await?;
        if let Some(row) = found.and_then(|pos| rel.row(pos)) {
            self.emit(index, row.clone())?;
        }
        Ok(())
    }

    async fn nested_loop(&mut self, index: usize, join: &JoinSpec) -> Result<()> {
        let left = self.store.relation(&join.left)?;
        let right = self.store.relation(&join.right)?;
        require_column(&left, &join.left_key)?;
        require_column(&right, &join.right_key)?;
        for (i, outer) in left.rows().iter().enumerate() {
            self.highlight.focus(left.name(), i);
            let event = self.highlight_event(index);
            self.commit(vec![event])?;
            for (j, inner) in right.rows().iter().enumerate() {
                record_profile(SimProfileKind::PairCompared);
                self.highlight.focus_pair(left.name(), i, right.name(), j);
                let event = self.highlight_event(index);
                self.commit(vec![event])?;
                self.token.pause(self.pacing.match_pair).await?;
                let matched = match (outer.get(&join.left_key), inner.get(&join.right_key)) {
                    (Some(key), Some(fk)) => key.matches(fk),
                    _ => false,
                };
                if matched {
                    self.emit(index, merge_rows(outer, inner))?;
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, index: usize, row: Row) -> Result<()> {
        let position = self.results.push(row.clone());
        record_profile(SimProfileKind::RowEmitted);
        self.commit(vec![SimEvent::RowEmitted {
            run: self.token.id(),
            index,
            position,
            row,
        }])
    }

    fn finish(&mut self, state: RunState) -> Result<()> {
        self.state = state.clone();
        let mut events = Vec::new();
        if self.highlight.clear() {
            if let Ok(index) = usize::try_from(self.trace.cursor()) {
                events.push(self.highlight_event(index));
            }
        }
        events.push(SimEvent::RunFinished {
            run: self.token.id(),
            state,
            rows: self.results.len(),
        });
        self.commit(events)?;
        info!(
            run = self.token.id().0,
            archetype = %self.archetype,
            rows = self.results.len(),
            "sim.run.finished"
        );
        Ok(())
    }

    fn highlight_event(&self, index: usize) -> SimEvent {
        SimEvent::Highlight {
            run: self.token.id(),
            index,
            highlight: self.highlight.clone(),
        }
    }

    fn commit(&self, events: Vec<SimEvent>) -> Result<()> {
        self.stage.publish(&self.token, events, |seq| BoardSnapshot {
            seq,
            run: Some(self.token.id()),
            archetype: Some(self.archetype),
            state: self.state.clone(),
            cursor: self.trace.cursor(),
            steps: self.trace.steps().to_vec(),
            highlight: self.highlight.clone(),
            results: self.results.rows().to_vec(),
        })
    }

    fn into_report(self) -> RunReport {
        RunReport {
            run: self.token.id(),
            archetype: self.archetype,
            fingerprint: self.fingerprint,
            state: self.state,
            cursor: self.trace.cursor(),
            rows: self.results.into_rows(),
        }
    }
}

fn require_column(rel: &Relation, column: &str) -> Result<()> {
    if rel.has_column(column) {
        Ok(())
    } else {
        Err(SimError::unknown_column(rel.name(), column))
    }
}

/// Total pacing delay a full run of `script` would spend suspended.
///
/// Saturates at [`Duration::MAX`] instead of overflowing.
pub fn estimated_duration(script: &Script, store: &dyn RelationStore, pacing: &Pacing) -> Duration {
    let rows = |name: &str| store.relation(name).map(|r| r.len()).unwrap_or(0);
    let times = |delay: Duration, count: usize| {
        u32::try_from(count)
            .ok()
            .and_then(|n| delay.checked_mul(n))
            .unwrap_or(Duration::MAX)
    };
    let mut total = Duration::ZERO;
    for step in &script.steps {
        let per_step = match step {
            Step::Info { .. } | Step::Success { .. } => Duration::ZERO,
            Step::Error { .. } => return total,
            Step::Scan { relation, .. } => times(pacing.scan_row, rows(relation)),
            Step::Filter { relation, .. } => times(pacing.filter_row, rows(relation)),
            Step::Seek { .. } => pacing.seek_latency,
            Step::Match { join, .. } => times(
                pacing.match_pair,
                rows(&join.left).saturating_mul(rows(&join.right)),
            ),
        };
        total = total.saturating_add(per_step).saturating_add(pacing.step_gap);
    }
    total
}
