//! Integration tests for the `conduit` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CONFIG: &str = r#"
[canary]
enabled = true
percentage = 25
exclude_roles = ["critical"]

[[models]]
id = "planner-stable"
name = "Planner"
provider = "anthropic"
role = "planner"
capabilities = ["text"]

[[models]]
id = "vision-model"
name = "Vision"
provider = "openai"
role = "analyst"
capabilities = ["text", "vision"]
"#;

const FAN_OUT: &str = r#"{
    "id": "fan-out",
    "tasks": [
        {"id": "A", "type": "analysis", "agentRef": "echo", "inputs": {"query": "start"}},
        {"id": "B", "type": "codegen", "agentRef": "echo", "dependencies": ["A"]},
        {"id": "C", "type": "review", "agentRef": "echo", "dependencies": ["A"]}
    ]
}"#;

/// Runs the binary inside `dir` with `dir` as HOME so no user config leaks in.
fn conduit(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("conduit").unwrap();
    cmd.current_dir(dir.path()).env("HOME", dir.path()).env_remove("CONDUIT_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_validate_valid_graph() {
    let dir = TempDir::new().unwrap();
    write(&dir, "graph.json", FAN_OUT);

    conduit(&dir)
        .args(["validate", "graph.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Graph is valid"))
        .stdout(predicate::str::contains("Round 2"))
        .stdout(predicate::str::contains("B, C"));
}

#[test]
fn test_validate_cycle_fails() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "cycle.json",
        r#"{"id": "cycle", "tasks": [
            {"id": "a", "type": "t", "agentRef": "echo", "dependencies": ["b"]},
            {"id": "b", "type": "t", "agentRef": "echo", "dependencies": ["a"]}
        ]}"#,
    );

    conduit(&dir)
        .args(["validate", "cycle.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("circular dependency detected"));
}

#[test]
fn test_validate_json_output() {
    let dir = TempDir::new().unwrap();
    write(&dir, "graph.json", FAN_OUT);

    let output = conduit(&dir).args(["validate", "graph.json", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["tasks"], 3);
    assert_eq!(json["levels"], serde_json::json!([["A"], ["B", "C"]]));
}

#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().unwrap();
    conduit(&dir)
        .args(["validate", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read task graph"));
}

#[test]
fn test_run_completes() {
    let dir = TempDir::new().unwrap();
    write(&dir, "graph.json", FAN_OUT);

    let output = conduit(&dir).args(["run", "graph.json", "--json", "--poll-ms", "5"]).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let job: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"]["completed_count"], 3);
    assert_eq!(job["results"].as_object().unwrap().len(), 3);
    assert_eq!(job["results"]["B"]["outputs"]["dependencies"]["A"]["task_id"], "A");
}

#[test]
fn test_run_reports_failed_task() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "graph.json",
        r#"{"id": "broken", "tasks": [
            {"id": "setup", "type": "t", "agentRef": "echo"},
            {"id": "deploy", "type": "t", "agentRef": "echo", "dependencies": ["setup"], "inputs": {"fail": "no credentials"}}
        ]}"#,
    );

    conduit(&dir)
        .args(["run", "graph.json", "--poll-ms", "5"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Job failed"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("no credentials"));
}

#[test]
fn test_run_rejects_invalid_graph() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "graph.json",
        r#"{"id": "dangling", "tasks": [{"id": "a", "type": "t", "agentRef": "echo", "dependencies": ["ghost"]}]}"#,
    );

    conduit(&dir)
        .args(["run", "graph.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_run_with_routed_agent() {
    let dir = TempDir::new().unwrap();
    write(&dir, "conduit.toml", CONFIG);
    write(
        &dir,
        "graph.json",
        r#"{"id": "routed", "tasks": [
            {"id": "look", "type": "analysis", "agentRef": "analyst", "constraints": {"capabilities": ["vision"]}}
        ]}"#,
    );

    let output = conduit(&dir).args(["run", "graph.json", "--json", "--poll-ms", "5"]).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let job: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(job["results"]["look"]["outputs"]["model_id"], "vision-model");
}

#[test]
fn test_select_uses_local_config() {
    let dir = TempDir::new().unwrap();
    write(&dir, "conduit.toml", CONFIG);

    conduit(&dir)
        .args(["select", "--role", "analyst", "--capability", "vision", "--user", "u1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vision-model"));
}

#[test]
fn test_select_unknown_role_fails() {
    let dir = TempDir::new().unwrap();
    write(&dir, "conduit.toml", CONFIG);

    conduit(&dir)
        .args(["select", "--role", "designer"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("No model available for role 'designer'"));
}

#[test]
fn test_select_repeat_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "custom.toml", CONFIG);

    let output = conduit(&dir)
        .arg("--config")
        .arg(&config)
        .args(["select", "--role", "planner", "--user", "consistent-user"])
        .args(["--project", "consistent-project", "--repeat", "3", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let selections = json["selections"].as_array().unwrap();
    assert_eq!(selections.len(), 3);
    for selection in selections {
        assert_eq!(selection["model"]["id"], "planner-stable");
        assert_eq!(selection["reason"], selections[0]["reason"]);
    }
    assert_eq!(json["statistics"]["total_selections"], 3);
}

#[test]
fn test_canary_show() {
    let dir = TempDir::new().unwrap();
    write(&dir, "conduit.toml", CONFIG);

    conduit(&dir)
        .args(["canary", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled"))
        .stdout(predicate::str::contains("25"))
        .stdout(predicate::str::contains("critical"));
}

#[test]
fn test_canary_bucket_matches_library() {
    let dir = TempDir::new().unwrap();

    let output = conduit(&dir)
        .args(["canary", "bucket", "--user", "u1", "--project", "p1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let expected = conduit_models::bucket_for(Some("u1"), Some("p1")).unwrap();
    assert_eq!(json["bucket"], u64::from(expected));
    // Canary is disabled without a config file
    assert_eq!(json["canary"], false);
}

#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    write(&dir, "conduit.toml", "[canary]\nenabled = true\npercentage = 150\n");

    conduit(&dir)
        .args(["canary", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid"));
}
