//! CLI integration tests

use std::process::Command;

fn cgm() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cgm"));
    // Keep the tests independent of a developer's .env and shell
    for key in [
        "LIBRE_USERNAME",
        "LIBRE_PASSWORD",
        "PUSHOVER_USER",
        "PUSHOVER_TOKEN",
        "GLUCOSE_CRITICAL_LOW",
        "GLUCOSE_CRITICAL_HIGH",
        "EXAMINE_COUNT",
        "WINDOW_CAPACITY",
        "CGM_API_URL",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = cgm().arg("--help").output().expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("CGM glucose monitor"), "Should show app name");
    assert!(stdout.contains("probe"), "Should show probe command");
    assert!(stdout.contains("notify"), "Should show notify command");
    assert!(stdout.contains("evaluate"), "Should show evaluate command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = cgm().arg("--version").output().expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cgm"), "Should show binary name");
}

/// Test evaluate prints one decision per reading
#[test]
fn test_evaluate_json_output() {
    let output = cgm()
        .args([
            "evaluate", "2.0", "2.1", "1.9", "2.5", "3.0", "1.5", "--format", "json",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Evaluate should succeed");

    let steps: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let decisions: Vec<&str> = steps
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["decision"].as_str().unwrap())
        .collect();
    assert_eq!(
        decisions,
        vec!["None", "None", "None", "None", "None", "SustainedLow"]
    );
}

/// Test evaluate table output mentions the alarm
#[test]
fn test_evaluate_table_output() {
    let output = cgm()
        .args(["evaluate", "25", "26", "--examine", "2", "--capacity", "2"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("SustainedHigh"));
}

/// Test evaluate rejects inconsistent parameters
#[test]
fn test_evaluate_rejects_examine_above_capacity() {
    let output = cgm()
        .args(["evaluate", "5.0", "--examine", "8"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("EXAMINE_COUNT"));
}

/// Test notify requires Pushover credentials
#[test]
fn test_notify_requires_credentials() {
    let output = cgm()
        .current_dir(std::env::temp_dir())
        .args(["notify", "--priority", "normal"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Notify without credentials should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--user"));
}

/// Test probe subcommand help
#[test]
fn test_probe_help() {
    let output = cgm()
        .args(["probe", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--raw"), "Should show raw option");
    assert!(stdout.contains("--region"), "Should show region option");
}

/// Test status against a stub monitor
#[test]
fn test_status_json_output() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/healthz")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"status":"degraded","components":{"source":{"status":"degraded","message":"1 consecutive failures: timeout","last_check_timestamp":1700000000}}}"#,
        )
        .create();
    server
        .mock("GET", "/readyz")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ready":true}"#)
        .create();

    let output = cgm()
        .args(["status", "--api-url", &server.url(), "--format", "json"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Status should succeed");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["health"]["status"], "degraded");
    assert_eq!(report["readiness"]["ready"], true);
}

/// Test invalid command
#[test]
fn test_invalid_command() {
    let output = cgm()
        .arg("invalid-command")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Invalid command should fail");
}
