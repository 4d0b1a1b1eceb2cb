//! Integration tests for the `zest` binary.
//!
//! Each test writes real files into a temp dir and runs the built binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;
use zest_reporting::Report;
use zest_reporting::backends::json;

fn zest(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zest"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("should run the zest binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("valid UTF-8")
}

fn saved_report(dir: &TempDir) -> std::path::PathBuf {
    let report: Report = serde_json::from_value(serde_json::json!({
        "start_time": "2026-01-01T00:00:00Z",
        "end_time": "2026-01-01T00:00:03Z",
        "suites": [{
            "name": "api",
            "description": "API",
            "tests": [
                {
                    "name": "login",
                    "description": "Login",
                    "status": "passed",
                    "start_time": "2026-01-01T00:00:00Z",
                    "end_time": "2026-01-01T00:00:01Z"
                },
                {
                    "name": "logout",
                    "description": "Logout",
                    "status": "failed",
                    "start_time": "2026-01-01T00:00:01Z",
                    "end_time": "2026-01-01T00:00:02Z",
                    "steps": [{
                        "description": "Logout",
                        "start_time": "2026-01-01T00:00:01Z",
                        "end_time": "2026-01-01T00:00:02Z",
                        "entries": [{
                            "type": "check",
                            "time": "2026-01-01T00:00:01Z",
                            "description": "Expect status to be equal to 200",
                            "outcome": false,
                            "details": "got 500"
                        }]
                    }]
                }
            ]
        }]
    }))
    .expect("valid report");

    let path = dir.path().join("report.json");
    json::save(&path, &report).expect("should save report");
    path
}

#[test]
fn test_report_failed_only_shows_failures() {
    // Given: A saved report with one passed and one failed test
    let dir = TempDir::new().expect("should create temp dir");
    saved_report(&dir);

    // When: Rendering failures of the report directory
    let output = zest(&["report", ".", "--failed-only"], dir.path());

    // Then: Only the failed test and its failing check are listed
    assert!(output.status.success(), "report should succeed");
    let text = stdout(&output);
    assert!(text.contains("api.logout"));
    assert!(!text.contains("api.login"));
    assert!(text.contains("got 500"));
}

#[test]
fn test_stats_json_output() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = saved_report(&dir);

    let output = zest(
        &["stats", path.to_str().expect("utf-8 path"), "--output", "json"],
        dir.path(),
    );

    assert!(output.status.success(), "stats should succeed");
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["tests"].as_u64(), Some(2));
    assert_eq!(parsed["failed"].as_u64(), Some(1));
    assert_eq!(parsed["successful"].as_bool(), Some(false));
}

#[test]
fn test_convert_to_junit() {
    let dir = TempDir::new().expect("should create temp dir");
    saved_report(&dir);

    let output = zest(
        &["convert", "report.json", "out/junit.xml", "--to", "junit"],
        dir.path(),
    );

    assert!(output.status.success(), "convert should succeed");
    let xml =
        std::fs::read_to_string(dir.path().join("out/junit.xml")).expect("junit file written");
    assert!(xml.contains(r#"<testsuite name="api""#));
    assert!(xml.contains("<failure"));
}

#[test]
fn test_missing_report_exit_code() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = zest(&["report", "."], dir.path());

    assert_eq!(output.status.code(), Some(3), "no report should exit with 3");
}

#[test]
fn test_config_validate_rejects_unknown_backend() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        dir.path().join("zest.toml"),
        "[reporting]\nbackends = [\"html\"]\n",
    )
    .expect("should write config");

    let output = zest(&["config", "validate"], dir.path());

    assert_eq!(output.status.code(), Some(2), "invalid config should exit with 2");
    assert!(stdout(&output).contains("INVALID"));
}

#[test]
fn test_config_show_without_file_uses_defaults() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = zest(&["config", "show", "--section", "run"], dir.path());

    assert!(output.status.success(), "show should fall back to defaults");
    let text = stdout(&output);
    assert!(text.contains("defaults"));
    assert!(text.contains("report_dir"));
}
