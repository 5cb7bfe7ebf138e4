//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_sleepwell-cli"))
        .args(args)
        .env("SLEEPWELL_DATA_DIR", data_dir)
        .env("SLEEPWELL_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

/// A data directory without sensors.
fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let output = run_cli(dir.path(), &["config", "set", "sampler.sensor_backend", "none"]);
    assert_eq!(output.0, 0, "config set failed: {}", output.2);
    dir
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_login_creates_week() {
    let dir = data_dir();
    let output = run_cli(dir.path(), &["auth", "login", "--username", "ana", "--password", "pw"]);
    assert_eq!(output.0, 0, "login failed: {}", output.2);
    assert_eq!(json(&output.1)["outcome"], "seeded");
    assert_eq!(json(&output.1)["pushed"], 7);

    let output = run_cli(dir.path(), &["window", "list", "--json"]);
    assert_eq!(output.0, 0);
    let windows = json(&output.1);
    assert_eq!(windows.as_array().unwrap().len(), 7);
    assert_eq!(windows[0]["start_day"], "MONDAY");
    assert_eq!(windows[0]["sleep_time"], "22:00");

    let output = run_cli(dir.path(), &["auth", "status"]);
    let status = json(&output.1);
    assert_eq!(status["logged_in"], true);
    assert_eq!(status["username"], "ana");
    assert_eq!(status["sync_state"], "seeded");
}

#[test]
fn test_login_with_blank_password_fails() {
    let dir = data_dir();
    let output = run_cli(dir.path(), &["auth", "login", "--username", "ana"]);
    assert_eq!(output.0, 1);
    assert!(output.2.contains("email and password can not be empty"));
}

#[test]
fn test_signup_password_mismatch() {
    let dir = data_dir();
    let output = run_cli(
        dir.path(),
        &["auth", "signup", "--username", "ana", "--password", "a", "--confirm", "b"],
    );
    assert_eq!(output.0, 1);
    assert!(output.2.contains("Passwords do not match"));
}

#[test]
fn test_window_edits() {
    let dir = data_dir();
    run_cli(dir.path(), &["auth", "login", "--username", "ana", "--password", "pw"]);

    let output = run_cli(dir.path(), &["window", "set", "friday", "--sleep", "23:45"]);
    assert_eq!(output.0, 0, "window set failed: {}", output.2);
    let change = json(&output.1);
    assert_eq!(change["window"]["sleep_time"], "23:45");
    assert_eq!(change["remote"], "mirrored");

    let output = run_cli(dir.path(), &["window", "disable", "SAT"]);
    assert_eq!(json(&output.1)["window"]["enabled"], false);

    let output = run_cli(dir.path(), &["window", "remove", "sunday"]);
    assert_eq!(output.0, 0);
    let output = run_cli(dir.path(), &["window", "list", "--json"]);
    assert_eq!(json(&output.1).as_array().unwrap().len(), 6);

    let output = run_cli(dir.path(), &["window", "add", "sunday", "--sleep", "21:30"]);
    assert_eq!(output.0, 0, "window add failed: {}", output.2);
    assert_eq!(json(&output.1)["window"]["end_day"], "MONDAY");

    let output = run_cli(dir.path(), &["window", "add", "sunday"]);
    assert_eq!(output.0, 1);
    assert!(output.2.contains("already has a window"));
}

#[test]
fn test_unknown_day_fails() {
    let dir = data_dir();
    let output = run_cli(dir.path(), &["window", "enable", "someday"]);
    assert_eq!(output.0, 1);
    assert!(output.2.contains("not a day of the week"));
}

#[test]
fn test_motion_record_and_stats() {
    let dir = data_dir();
    let output = run_cli(dir.path(), &["motion", "record", "--day", "Tuesday"]);
    assert_eq!(output.0, 0, "motion record failed: {}", output.2);
    assert_eq!(json(&output.1)["count"], 1);
    let output = run_cli(dir.path(), &["motion", "record", "--day", "Tuesday"]);
    assert_eq!(json(&output.1)["count"], 2);

    let output = run_cli(dir.path(), &["motion", "stats"]);
    let stats = json(&output.1);
    assert_eq!(stats["motion"]["total_disturbances"], 2);
    assert_eq!(stats["motion"]["busiest_day"], "Tuesday");

    let output = run_cli(dir.path(), &["motion", "reset", "--day", "Tuesday"]);
    assert_eq!(json(&output.1)["count"], 0);

    let output = run_cli(dir.path(), &["motion", "cleanup"]);
    assert_eq!(output.0, 0);
    assert!(output.1.contains("removed 0 samples"));

    let output = run_cli(dir.path(), &["motion", "sample", "--seconds", "0"]);
    assert_eq!(output.0, 0, "motion sample failed: {}", output.2);
    assert!(output.1.contains("no disturbance"));
}

#[test]
fn test_dark_mode_toggle() {
    let dir = data_dir();
    let output = run_cli(dir.path(), &["prefs", "dark-mode"]);
    assert!(output.1.contains("dark mode: off"));
    let output = run_cli(dir.path(), &["prefs", "dark-mode", "toggle"]);
    assert!(output.1.contains("dark mode: on"));
    let output = run_cli(dir.path(), &["prefs", "dark-mode"]);
    assert!(output.1.contains("dark mode: on"));
}

#[test]
fn test_sync_requires_login() {
    let dir = data_dir();
    let output = run_cli(dir.path(), &["sync"]);
    assert_eq!(output.0, 1);
    assert!(output.2.contains("Not logged in"));
}

#[test]
fn test_logout_then_wipe() {
    let dir = data_dir();
    run_cli(dir.path(), &["auth", "login", "--username", "ana", "--password", "pw"]);

    let output = run_cli(dir.path(), &["data", "wipe"]);
    assert_eq!(output.0, 1);

    let output = run_cli(dir.path(), &["data", "wipe", "--yes"]);
    assert_eq!(output.0, 0, "wipe failed: {}", output.2);
    assert!(output.1.contains("7 remote windows"));

    let output = run_cli(dir.path(), &["window", "list", "--json"]);
    assert_eq!(json(&output.1).as_array().unwrap().len(), 0);

    let output = run_cli(dir.path(), &["auth", "logout"]);
    assert_eq!(output.0, 0);
    let output = run_cli(dir.path(), &["auth", "status"]);
    assert_eq!(json(&output.1)["logged_in"], false);
}

#[test]
fn test_config_get_set() {
    let dir = data_dir();
    let output = run_cli(dir.path(), &["config", "get", "sampler.sensor_backend"]);
    assert_eq!(output.1.trim(), "none");

    let output = run_cli(dir.path(), &["config", "set", "schedule.sleep_time", "21:15"]);
    assert_eq!(output.0, 0);
    run_cli(dir.path(), &["auth", "login", "--username", "ana", "--password", "pw"]);
    let output = run_cli(dir.path(), &["window", "list", "--json"]);
    assert_eq!(json(&output.1)[0]["sleep_time"], "21:15");

    let output = run_cli(dir.path(), &["config", "set", "sampler.period_minutes", "0"]);
    assert_eq!(output.0, 1);

    let output = run_cli(dir.path(), &["config", "get", "nope"]);
    assert_eq!(output.0, 1);
}
