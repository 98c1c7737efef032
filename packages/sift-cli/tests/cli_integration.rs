use assert_cmd::Command;
use predicates::prelude::*;

fn sift_queue() -> Command {
    let mut cmd = Command::cargo_bin("sift-queue").unwrap();
    cmd.env_remove("SIFT_QUEUE_WORKERS")
        .env_remove("SIFT_QUEUE_NOTIFY_CAPACITY");
    cmd
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(stdout.to_vec())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    sift_queue()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    sift_queue()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sift-queue"));
}

// =============================================================================
// CONFIG SUBCOMMAND
// =============================================================================

#[test]
fn test_config_defaults() {
    sift_queue()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workers: 3"))
        .stdout(predicate::str::contains("Notification capacity: 1000"));
}

#[test]
fn test_config_json_reads_env() {
    let output = sift_queue()
        .args(["config", "--json"])
        .env("SIFT_QUEUE_WORKERS", "5")
        .assert()
        .success();

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(parsed["workerCount"], 5);
    assert_eq!(parsed["notificationCapacity"], 1000);
}

#[test]
fn test_config_rejects_bad_env() {
    sift_queue()
        .arg("config")
        .env("SIFT_QUEUE_WORKERS", "lots")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("SIFT_QUEUE_WORKERS"));
}

// =============================================================================
// DEMO SUBCOMMAND
// =============================================================================

#[test]
fn test_demo_json_runs_to_idle() {
    let output = sift_queue()
        .args([
            "demo",
            "--interactive",
            "3",
            "--background",
            "1",
            "--steps",
            "2",
            "--step-ms",
            "1",
            "--json",
        ])
        .assert()
        .success();

    let lines = json_lines(&output.get_output().stdout);
    let stats = lines.last().unwrap();
    assert_eq!(stats["type"], "stats");
    assert_eq!(stats["depth"], 0);
    assert_eq!(stats["remaining"], 0);
    assert_eq!(stats["workers"].as_array().unwrap().len(), 3);

    let progress: Vec<&serde_json::Value> =
        lines.iter().filter(|l| l["type"] == "progress").collect();
    assert!(progress
        .iter()
        .any(|l| l["record"]["activity"] == "interactive-2" && l["record"]["progress"] == 1.0));
    assert!(progress.last().unwrap()["worker"].is_null());
}

#[test]
fn test_demo_text_output() {
    sift_queue()
        .args([
            "demo",
            "--interactive",
            "1",
            "--background",
            "0",
            "--steps",
            "1",
            "--step-ms",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[worker 0] interactive-0 100%"))
        .stdout(predicate::str::contains("[idle]"))
        .stdout(predicate::str::contains("worker 2 (background)"));
}

#[test]
fn test_demo_failure_is_logged_not_fatal() {
    sift_queue()
        .args([
            "demo",
            "--interactive",
            "0",
            "--background",
            "1",
            "--steps",
            "3",
            "--step-ms",
            "1",
            "--fail-at",
            "1",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("failed"))
        .stdout(predicate::str::contains("depth=0 remaining=0 running=0"));
}

#[test]
fn test_demo_rejects_single_worker() {
    sift_queue()
        .args(["demo", "--workers", "1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("At least 2 workers"));
}

#[test]
fn test_demo_rejects_zero_steps() {
    sift_queue()
        .args(["demo", "--steps", "0"])
        .assert()
        .failure();
}
