#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

/// Points the binary at a config file that does not exist, so runs use the
/// built-in defaults regardless of the host's config directory.
fn isolated() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("playground.toml");
    (dir, path)
}

fn run_json(config: &Path, args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("playground")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config)
        .args(["--format", "json"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn run_seek_reports_single_row() {
    let (_dir, config) = isolated();
    let json = run_json(&config, &["run", "--instant", "SELECT * FROM users WHERE id = 1"]);
    let report = &json["report"];
    assert_eq!(report["archetype"], "index_seek");
    assert_eq!(report["state"]["state"], "completed");
    let rows = report["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Alice");

    let events = json["events"].as_array().expect("events");
    assert_eq!(events.first().expect("first event")["event"], "run_started");
    assert_eq!(events.last().expect("last event")["event"], "run_finished");
}

#[test]
fn run_join_streams_rows_in_loop_order() {
    let (_dir, config) = isolated();
    let json = run_json(&config, &["run", "--instant", "users JOIN orders"]);
    let emitted: Vec<i64> = json["events"]
        .as_array()
        .expect("events")
        .iter()
        .filter(|e| e["event"] == "row_emitted")
        .map(|e| e["row"]["id"].as_i64().expect("order id"))
        .collect();
    assert_eq!(emitted, vec![101, 102, 103, 104]);
}

#[test]
fn unsupported_query_is_reported_not_failed() {
    let (_dir, config) = isolated();
    let json = run_json(&config, &["run", "--instant", "DROP EVERYTHING"]);
    assert_eq!(json["report"]["state"]["state"], "aborted");
    assert_eq!(json["report"]["state"]["reason"], "unsupported");
    assert_eq!(json["report"]["rows"].as_array().map(Vec::len), Some(0));
}

#[test]
fn run_text_prints_result_grid() {
    let (_dir, config) = isolated();
    let output = cargo_bin_cmd!("playground")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&config)
        .args(["--theme", "plain", "run", "--instant", "age > 25"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf8");
    assert!(stdout.contains("Results"), "{stdout}");
    for name in ["Bob", "Charlie", "Eve"] {
        assert!(stdout.contains(name), "missing {name}: {stdout}");
    }
    assert!(stdout.contains("[2] FILTER"), "{stdout}");
}

#[test]
fn explain_join_describes_nested_loop() {
    let (_dir, config) = isolated();
    let json = run_json(&config, &["explain", "select * from users join orders"]);
    let root = &json["root"];
    assert_eq!(root["op"], "NestedLoopJoin");
    assert_eq!(root["inputs"].as_array().map(Vec::len), Some(2));
    assert_eq!(root["cost"].as_f64(), Some(20.0 + 5.0 + 4.0));
}

#[test]
fn tables_lists_fixtures() {
    let (_dir, config) = isolated();
    let json = run_json(&config, &["tables"]);
    let names: Vec<&str> = json
        .as_array()
        .expect("tables")
        .iter()
        .map(|t| t["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["orders", "users"]);
}

#[test]
fn config_env_var_selects_relations() {
    let (dir, _) = isolated();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
[[relations]]
name = "users"
columns = ["id", "age"]
key = "id"
rows = [{ id = 1, age = 90 }, { id = 2, age = 10 }]
"#,
    )
    .expect("write config");
    let output = cargo_bin_cmd!("playground")
        .env_remove("RUST_LOG")
        .env("QUERYSCOPE_CONFIG", &path)
        .args(["--format", "json", "run", "--instant", "age > 25"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    let rows = json["report"]["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["age"], 90);
}

#[test]
fn invalid_config_fails_with_message() {
    let (dir, _) = isolated();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[events]\ncapacity = 0\n").expect("write");
    let output = cargo_bin_cmd!("playground")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&path)
        .arg("tables")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("invalid playground config"), "{stderr}");
}

#[test]
fn inconsistent_pacing_fails_only_when_used() {
    let (dir, _) = isolated();
    let path = dir.path().join("slow_seek.toml");
    fs::write(&path, "[pacing]\nseek_latency_ms = 10\nscan_row_ms = 200\n").expect("write");

    let output = cargo_bin_cmd!("playground")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&path)
        .args(["run", "id = 1"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("seek latency must exceed"), "{stderr}");

    let json = run_json(&path, &["run", "--instant", "id = 1"]);
    assert_eq!(json["report"]["state"]["state"], "completed");
    assert_eq!(run_json(&path, &["tables"]).as_array().map(Vec::len), Some(2));
}

#[test]
fn completions_are_generated() {
    let output = cargo_bin_cmd!("playground")
        .args(["completions", "bash"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("playground"));
}
