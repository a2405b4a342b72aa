#![allow(missing_docs)]

use std::fs;
use std::time::Duration;

use queryscope::config::{ConfigError, PlaygroundConfig};
use queryscope::query::{Pacing, RunState, Simulator};
use queryscope::relation::{RelationStore, Value};
use tempfile::TempDir;

const INVENTORY: &str = r#"
[pacing]
step_gap_ms = 40
scan_row_ms = 20
filter_row_ms = 30
match_pair_ms = 10
seek_latency_ms = 80

[events]
capacity = 64

[logging]
filter = "queryscope=debug"

[[relations]]
name = "users"
columns = ["id", "name", "age"]
key = "id"
rows = [
  { id = 1, name = "Ada", age = 36 },
  { id = 2, name = "Lin", age = 19 },
  { id = 3, name = "Ola", age = 25.5 },
]

[[relations]]
name = "orders"
columns = ["id", "user_id", "amount"]
key = "id"
rows = [
  { id = 10, user_id = 3, amount = 9.5 },
  { id = 11, user_id = 1, amount = 12 },
]
"#;

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("playground.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn load_reads_every_section() {
    let (_dir, path) = write_config(INVENTORY);
    let config = PlaygroundConfig::load(Some(path.clone())).expect("load");
    assert_eq!(config.path(), Some(path.as_path()));
    assert_eq!(config.event_capacity(), 64);
    assert_eq!(config.log_filter(), "queryscope=debug");
    assert_eq!(
        config.pacing().unwrap(),
        Pacing {
            step_gap: Duration::from_millis(40),
            scan_row: Duration::from_millis(20),
            filter_row: Duration::from_millis(30),
            match_pair: Duration::from_millis(10),
            seek_latency: Duration::from_millis(80),
        }
    );
    let store = config.relations().unwrap();
    assert_eq!(store.relation_names(), vec!["orders", "users"]);
    assert_eq!(store.relation("users").unwrap().len(), 3);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let config = PlaygroundConfig::load(Some(dir.path().join("absent.toml"))).expect("load");
    assert_eq!(config.pacing().unwrap(), Pacing::default());
    let store = config.relations().unwrap();
    assert_eq!(store.relation("users").unwrap().len(), 5);
}

#[test]
fn malformed_file_reports_its_path() {
    let (_dir, path) = write_config("[pacing\nstep_gap_ms = 1");
    let err = PlaygroundConfig::load(Some(path.clone())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(&path.display().to_string()));
}

#[test]
fn duplicate_keys_are_rejected() {
    let (_dir, path) = write_config(
        r#"
[[relations]]
name = "users"
columns = ["id"]
key = "id"
rows = [{ id = 1 }, { id = 1 }]
"#,
    );
    let err = PlaygroundConfig::load(Some(path)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }), "{err}");
}

#[tokio::test(start_paused = true)]
async fn configured_simulator_runs_against_configured_tables() {
    let (_dir, path) = write_config(INVENTORY);
    let config = PlaygroundConfig::load(Some(path)).expect("load");
    let sim = Simulator::from_config(&config).expect("simulator");

    let scan = sim.run("SELECT name FROM users WHERE age > 25").await.unwrap();
    assert_eq!(scan.state, RunState::Completed);
    let names: Vec<Value> = scan.rows.iter().map(|r| r["name"].clone()).collect();
    assert_eq!(names, vec![Value::from("Ada"), Value::from("Ola")]);

    let join = sim.run("users join orders").await.unwrap();
    let pairs: Vec<(Value, Value)> = join
        .rows
        .iter()
        .map(|r| (r["name"].clone(), r["amount"].clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Value::from("Ada"), Value::Int(12)),
            (Value::from("Ola"), Value::Float(9.5)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn speed_override_scales_run_time() {
    let (_dir, path) = write_config(INVENTORY);
    let config = PlaygroundConfig::load(Some(path))
        .expect("load")
        .with_speed(Some(4.0));
    let pacing = config.pacing().unwrap();
    assert_eq!(pacing.step_gap, Duration::from_millis(10));
    assert_eq!(pacing.seek_latency, Duration::from_millis(20));

    let sim = Simulator::from_config(&config).expect("simulator");
    let started = tokio::time::Instant::now();
    let report = sim.run("id = 1").await.unwrap();
    assert_eq!(report.rows[0]["name"], Value::from("Ada"));
    assert!(started.elapsed() < Duration::from_millis(100));
}
