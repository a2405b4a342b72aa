#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use queryscope::query::{AbortReason, Pacing, RunState, SimEvent, Simulator};
use queryscope::relation::fixtures::playground_relations;
use queryscope::relation::Value;
use queryscope::RunId;
use tokio::sync::broadcast;

const SCAN: &str = "SELECT * FROM users WHERE age > 25";
const SEEK: &str = "SELECT * FROM users WHERE id = 1";
const JOIN: &str = "SELECT * FROM users JOIN orders ON users.id = orders.user_id";

fn simulator() -> Simulator {
    Simulator::new(Arc::new(playground_relations().unwrap()), Pacing::default())
}

fn drain(events: &mut broadcast::Receiver<SimEvent>) -> Vec<SimEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Asserts that nothing tagged with `stale` is published after `fresh` starts.
fn assert_quiet_after_restart(events: &[SimEvent], stale: RunId, fresh: RunId) {
    let restart = events
        .iter()
        .position(|e| matches!(e, SimEvent::RunStarted { run, .. } if *run == fresh))
        .expect("newer run never started");
    let leaked: Vec<&SimEvent> = events[restart..]
        .iter()
        .filter(|e| e.run() == stale)
        .collect();
    assert!(leaked.is_empty(), "superseded run leaked events: {leaked:?}");
}

#[tokio::test(start_paused = true)]
async fn superseded_scan_stops_writing() {
    let sim = simulator();
    let mut events = sim.subscribe();

    let first = sim.start(SCAN);
    // Lands inside the scan step's per-row pacing.
    tokio::time::sleep(Duration::from_millis(900)).await;
    let second = sim.start(SEEK);
    let (first_id, second_id) = (first.id(), second.id());

    let first = first.join().await.unwrap();
    let second = second.join().await.unwrap();

    assert_eq!(
        first.state,
        RunState::Aborted {
            reason: AbortReason::Superseded
        }
    );
    assert_eq!(second.state, RunState::Completed);

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| e.run() == first_id && e.is_write()));
    assert_quiet_after_restart(&events, first_id, second_id);

    let board = sim.snapshot();
    assert_eq!(board.run, Some(second_id));
    assert_eq!(board.results.len(), 1);
    assert_eq!(board.results[0]["id"], Value::Int(1));
    assert!(board.highlight.is_empty());
}

#[tokio::test(start_paused = true)]
async fn superseded_join_mid_loop_leaves_no_partial_rows() {
    let sim = simulator();
    let mut events = sim.subscribe();

    let first = sim.start(JOIN);
    // Past both scans, into the pairwise matching.
    tokio::time::sleep(Duration::from_millis(4_550)).await;
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.run, Some(first.id()));
    assert!(!snapshot.highlight.is_empty());

    let second = sim.start(SCAN);
    let first_id = first.id();
    let second_id = second.id();
    let first = first.join().await.unwrap();
    let second = second.join().await.unwrap();

    assert!(matches!(first.state, RunState::Aborted { .. }));
    assert_eq!(second.rows.len(), 3);
    assert_quiet_after_restart(&drain(&mut events), first_id, second_id);

    let board = sim.snapshot();
    assert_eq!(board.results, second.rows);
    assert!(board.results.iter().all(|r| !r.contains_key("user_id")));
}

#[tokio::test(start_paused = true)]
async fn restarting_the_same_query_aborts_and_restarts() {
    let sim = simulator();
    let first = sim.start(SCAN);
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let second = sim.start(SCAN);
    assert_eq!(sim.live_run(), Some(second.id()));

    let first = first.join().await.unwrap();
    let second = second.join().await.unwrap();
    assert!(matches!(
        first.state,
        RunState::Aborted {
            reason: AbortReason::Superseded
        }
    ));
    let ages: Vec<Value> = second.rows.iter().map(|r| r["age"].clone()).collect();
    assert_eq!(ages, vec![Value::Int(29), Value::Int(31), Value::Int(27)]);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_starts_never_run_the_first() {
    let sim = simulator();
    let mut events = sim.subscribe();
    let first = sim.start(JOIN);
    let second = sim.start(SEEK);
    let first_id = first.id();

    let first = first.join().await.unwrap();
    second.join().await.unwrap();

    assert_eq!(first.cursor, 0);
    assert!(first.rows.is_empty());
    let events = drain(&mut events);
    let from_first: Vec<&SimEvent> = events.iter().filter(|e| e.run() == first_id).collect();
    assert_eq!(from_first.len(), 1);
    assert!(matches!(from_first[0], SimEvent::RunStarted { .. }));
}

#[tokio::test(start_paused = true)]
async fn pacing_matches_estimate() {
    let sim = simulator();
    let script = sim.plan(SEEK);
    let expected = queryscope::query::estimated_duration(&script, sim.store().as_ref(), &sim.pacing());
    let started = tokio::time::Instant::now();
    sim.run(SEEK).await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= expected, "{elapsed:?} < {expected:?}");
    assert!(elapsed < expected + Duration::from_millis(50), "{elapsed:?}");
}
