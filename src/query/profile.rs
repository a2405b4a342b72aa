//! Opt-in counters for row-level interpreter work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

/// A snapshot of simulator work counters.
///
/// Counting is enabled via the `QUERYSCOPE_PROFILE` environment variable and
/// tracks how much row-level work the interpreter performed across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimProfileSnapshot {
    /// Rows visited by sequential scans.
    pub rows_scanned: u64,
    /// Rows visited by standalone filter passes.
    pub rows_filtered: u64,
    /// Predicate evaluations (scan filters and filter steps).
    pub predicate_evals: u64,
    /// (left, right) pairs compared by nested-loop matching.
    pub pairs_compared: u64,
    /// Key-index seeks.
    pub seeks: u64,
    /// Rows appended to result sets.
    pub rows_emitted: u64,
    /// Runs that stopped because a newer run started.
    pub runs_superseded: u64,
}

#[derive(Default)]
struct SimProfileCounters {
    rows_scanned: AtomicU64,
    rows_filtered: AtomicU64,
    predicate_evals: AtomicU64,
    pairs_compared: AtomicU64,
    seeks: AtomicU64,
    rows_emitted: AtomicU64,
    runs_superseded: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<SimProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("QUERYSCOPE_PROFILE").is_some())
}

fn counters() -> Option<&'static SimProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(SimProfileCounters::default))
}

pub(crate) enum SimProfileKind {
    /// One row visited by a scan.
    ScanRow,
    /// One row visited by a filter pass.
    FilterRow,
    /// One predicate evaluation.
    PredicateEval,
    /// One nested-loop pair.
    PairCompared,
    /// One index seek.
    Seek,
    /// One result row.
    RowEmitted,
    /// One superseded run.
    RunSuperseded,
}

pub(crate) fn record_profile(kind: SimProfileKind) {
    let Some(counters) = counters() else {
        return;
    };
    let counter = match kind {
        SimProfileKind::ScanRow => &counters.rows_scanned,
        SimProfileKind::FilterRow => &counters.rows_filtered,
        SimProfileKind::PredicateEval => &counters.predicate_evals,
        SimProfileKind::PairCompared => &counters.pairs_compared,
        SimProfileKind::Seek => &counters.seeks,
        SimProfileKind::RowEmitted => &counters.rows_emitted,
        SimProfileKind::RunSuperseded => &counters.runs_superseded,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of the simulator work counters.
///
/// # Arguments
///
/// * `reset` - If `true`, resets all counters to zero after reading them.
///
/// # Returns
///
/// `Some(SimProfileSnapshot)` if counting is enabled via the
/// `QUERYSCOPE_PROFILE` environment variable, or `None` otherwise.
///
/// # Example
///
/// ```no_run
/// use queryscope::query::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(false) {
///     println!("pairs compared: {}", snapshot.pairs_compared);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<SimProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(SimProfileSnapshot {
        rows_scanned: load(&counters.rows_scanned),
        rows_filtered: load(&counters.rows_filtered),
        predicate_evals: load(&counters.predicate_evals),
        pairs_compared: load(&counters.pairs_compared),
        seeks: load(&counters.seeks),
        rows_emitted: load(&counters.rows_emitted),
        runs_superseded: load(&counters.runs_superseded),
    })
}
