//! Integration tests for the Roost CLI
//!
//! Runs the built `roost` binary and checks its output and side effects.

use roost_core::core_loadable::SnapshotCache;
use roost_core::core_model::DirectedPost;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn roost(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_roost"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("failed to run roost binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_filter_check_reports_blocked_text() {
    let output = roost(&["filter", "check", "what a Bozo"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["blocked"], true);
    assert!(report["entries"].as_u64().unwrap() > 0);

    let output = roost(&["filter", "check", "lovely weather"]);
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["blocked"], false);
}

#[test]
fn test_filter_cipher_round_trip() {
    let encoded = roost(&["filter", "cipher", "roost"]);
    assert_eq!(stdout(&encoded).trim(), "illhg");

    let decoded = roost(&["filter", "cipher", "--decode", "illhg"]);
    assert_eq!(stdout(&decoded).trim(), "roost");
}

#[test]
fn test_cache_inspect_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("posts.json");

    let output = roost(&["cache", "inspect", missing.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_demo_writes_inspectable_snapshot() {
    let dir = TempDir::new().unwrap();
    let output = roost(&["demo", "--cache-dir", dir.path().to_str().unwrap()]);
    assert!(output.status.success(), "demo failed: {}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(text.contains("partner Friend"));
    assert!(text.contains("blocked=true"));
    assert!(text.contains("phase after sign-out: anonymous"));

    let snapshot = dir.path().join("posts.json");
    assert!(Path::new(&snapshot).exists());
    let posts = SnapshotCache::<DirectedPost>::at(snapshot.clone()).load().unwrap();
    assert_eq!(posts.len(), 2);

    let inspect = roost(&["cache", "inspect", snapshot.to_str().unwrap()]);
    assert!(inspect.status.success());
    assert!(stdout(&inspect).contains("2 post(s)"));
}

#[test]
fn test_bad_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roost.toml");
    std::fs::write(&path, "[filter]\ncipher_key = \"short\"\n").unwrap();

    let output = roost(&["--config", path.to_str().unwrap(), "filter", "check", "hi"]);
    assert!(!output.status.success());
}
