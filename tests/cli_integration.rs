//! Integration tests for the testlens binary
//!
//! Runs the real CLI against temporary data directories.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run testlens and return (success, stdout, stderr)
fn run_testlens(data_dir: &Path, args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_testlens"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .output()
        .expect("Failed to execute testlens");

    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn test_init_writes_default_config() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");

    let (success, _, stderr) = run_testlens(&data_dir, &["init"]);
    assert!(success, "init should succeed: {}", stderr);
    assert!(data_dir.join("config.toml").exists());

    let (success, stdout, _) = run_testlens(&data_dir, &["status"]);
    assert!(success);
    assert!(stdout.contains("Quality snapshots: 0"));
}

#[test]
fn test_status_before_init() {
    let tmp = TempDir::new().unwrap();
    let (success, stdout, _) = run_testlens(&tmp.path().join("missing"), &["status"]);
    assert!(success);
    assert!(stdout.contains("NOT INITIALIZED"));
}

#[test]
fn test_classify_prints_json() {
    let tmp = TempDir::new().unwrap();
    let (success, stdout, _) = run_testlens(
        tmp.path(),
        &["classify", "--message", "net::ERR_CONNECTION_REFUSED at http://localhost:3000/"],
    );
    assert!(success);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["category"], "network");
    assert_eq!(value["severity"], "high");
}

#[test]
fn test_analyze_writes_report() {
    let tmp = TempDir::new().unwrap();
    let results = tmp.path().join("results.json");
    std::fs::write(
        &results,
        r#"[
            {"title": "login", "status": "passed", "duration": 1000},
            {"title": "cart", "status": "failed", "duration": 1000,
             "error": {"message": "Timeout 5000ms exceeded"}}
        ]"#,
    )
    .unwrap();
    let report_path = tmp.path().join("report.json");

    let (success, _, stderr) = run_testlens(
        tmp.path(),
        &[
            "analyze",
            "--results",
            results.to_str().unwrap(),
            "--output",
            report_path.to_str().unwrap(),
            "--period",
            "daily",
        ],
    );
    assert!(success, "analyze should succeed: {}", stderr);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert!(report["metrics"]["overall_score"].is_number());
    assert_eq!(report["failure_analysis"]["total_failures"], 1);
    assert!(tmp.path().join("quality-history.json").exists());
}

#[test]
fn test_unknown_period_fails() {
    let tmp = TempDir::new().unwrap();
    let (success, _, stderr) = run_testlens(tmp.path(), &["trends", "--period", "yearly"]);
    assert!(!success);
    assert!(stderr.contains("yearly"));
    assert!(stderr.contains("possible values: daily, weekly, monthly"));
}
