mod common;

use common::{signage_command, unreachable_ws_url};
use predicates::prelude::*;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct CliEnv {
    dir: TempDir,
}

impl CliEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> assert_cmd::Command {
        signage_command(self.dir.path(), &self.dir.path().join("signage.db"))
    }

    fn snapshot(&self) -> serde_json::Value {
        let output = self.cmd().arg("snapshot").output().unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

#[test]
fn test_standby_overnight_window() {
    let env = CliEnv::new();
    for (at, expected) in [("23:30", true), ("05:00", true), ("12:00", false)] {
        env.cmd()
            .args(["standby", "--start", "22:00", "--end", "06:00", "--at", at])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("\"standby\": {}", expected)));
    }
}

#[test]
fn test_standby_same_day_window_and_disabled() {
    let env = CliEnv::new();
    env.cmd()
        .args(["standby", "--start", "01:00", "--end", "05:00", "--at", "03:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"standby\": true"));

    env.cmd()
        .args(["standby", "--start", "01:00", "--end", "05:00", "--at", "03:00", "--disabled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"standby\": false"));
}

#[test]
fn test_standby_malformed_window_uses_defaults() {
    let env = CliEnv::new();
    env.cmd()
        .args(["standby", "--start", "soon", "--end", "later", "--at", "23:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"standby\": true"));
}

#[test]
fn test_standby_rejects_bad_at() {
    let env = CliEnv::new();
    env.cmd()
        .args(["standby", "--start", "22:00", "--end", "06:00", "--at", "noon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_INPUT"));
}

#[test]
fn test_snapshot_on_fresh_database_has_defaults() {
    let env = CliEnv::new();
    let snapshot = env.snapshot();

    assert_eq!(snapshot["mode"]["name"], "null");
    assert_eq!(snapshot["settings"]["standby_end_time"], "06:00");
    assert_eq!(snapshot["data"], serde_json::json!([]));
    assert!(snapshot.get("playlist").is_none());
}

#[test]
fn test_data_set_shows_in_snapshot() {
    let env = CliEnv::new();
    env.cmd()
        .args(["data", "set", "temperature", "21", "--type", "INT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"INT\""));
    env.cmd()
        .args(["data", "set", "temperature", "---", "--type", "INT"])
        .assert()
        .success();

    let snapshot = env.snapshot();
    assert_eq!(snapshot["data"][0]["name"], "temperature");
    assert_eq!(snapshot["data"][0]["value"], "---");
    assert_eq!(snapshot["data"].as_array().unwrap().len(), 1);
}

#[test]
fn test_data_set_negative_int() {
    let env = CliEnv::new();
    env.cmd()
        .args(["data", "set", "outside", "-5", "--type", "INT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"value\": \"-5\""));

    let snapshot = env.snapshot();
    assert_eq!(snapshot["data"][0]["name"], "outside");
    assert_eq!(snapshot["data"][0]["value"], "-5");
}

#[test]
fn test_data_set_rejects_bad_int() {
    let env = CliEnv::new();
    env.cmd()
        .args(["data", "set", "temperature", "warm", "--type", "INT"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_INPUT"));
}

#[test]
fn test_mode_set_unknown_playlist() {
    let env = CliEnv::new();
    env.cmd()
        .args(["mode", "set", "playlist", "--playlist", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOT_FOUND"));
}

#[test]
fn test_playlist_flow() {
    let env = CliEnv::new();
    env.cmd()
        .args(["playlist", "create", "Entrance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"Entrance\""));
    env.cmd()
        .args(["playlist", "add-media", "1", "b2.jpg", "--path", "/uploads/b2.jpg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"format\": \"jpg\""))
        .stdout(predicate::str::contains("\"position\": 0"));
    env.cmd()
        .args(["playlist", "add-media", "1", "c3.mp4", "--path", "/uploads/c3.mp4", "--type", "video"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"position\": 1"));
    env.cmd()
        .args(["mode", "set", "playlist", "--playlist", "1"])
        .assert()
        .success();

    let snapshot = env.snapshot();
    let medias = snapshot["playlist"]["medias"].as_array().unwrap();
    assert_eq!(snapshot["playlist"]["name"], "Entrance");
    assert_eq!(medias.len(), 2);
    assert_eq!(medias[1]["type"], "video");
}

#[test]
fn test_accident_record_only_rises() {
    let env = CliEnv::new();
    env.cmd()
        .args(["accident", "set", "--days", "30"])
        .assert()
        .success();
    env.cmd()
        .args(["accident", "set", "--days", "2", "--this-year", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"record_days_without_accident\": 30"));
}

#[test]
fn test_settings_set_partial_update() {
    let env = CliEnv::new();
    env.cmd()
        .args(["settings", "set", "--standby", "true", "--start", "21:30"])
        .assert()
        .success();

    let snapshot = env.snapshot();
    assert_eq!(snapshot["settings"]["standby"], true);
    assert_eq!(snapshot["settings"]["standby_start_time"], "21:30");
    assert_eq!(snapshot["settings"]["standby_end_time"], "06:00");
    assert_eq!(snapshot["settings"]["theme"], "dark");
}

#[test]
fn test_invalid_env_config_is_reported() {
    let env = CliEnv::new();
    env.cmd()
        .env("SIGNAGE_BROADCAST_INTERVAL_MS", "fast")
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SIGNAGE_BROADCAST_INTERVAL_MS"));
}

#[test]
fn test_invalid_log_retention_is_reported() {
    let env = CliEnv::new();
    env.cmd()
        .env("SIGNAGE_LOG_RETENTION_DAYS", "a week")
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SIGNAGE_LOG_RETENTION_DAYS"));
}

#[test]
fn test_watch_gives_up_on_unreachable_relay() {
    let env = CliEnv::new();
    env.cmd()
        .args([
            "watch",
            "--url",
            &unreachable_ws_url(),
            "--reconnect-delay-ms",
            "50",
            "--reconnect-attempts",
            "2",
        ])
        .timeout(Duration::from_secs(20))
        .assert()
        .failure()
        .stderr(predicate::str::contains("TRANSPORT_ERROR"));
}

#[cfg(unix)]
#[test]
fn test_watch_stops_on_interrupt_while_waiting_to_retry() {
    let env = CliEnv::new();
    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_signage"))
        .env("HOME", env.dir.path())
        .env_remove("RUST_LOG")
        .args([
            "watch",
            "--url",
            &unreachable_ws_url(),
            "--reconnect-delay-ms",
            "60000",
        ])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    // Let the first attempt fail and the retry wait begin
    std::thread::sleep(Duration::from_millis(1500));
    let killed = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().ok();
            panic!("watch ignored Ctrl-C during the retry wait");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success());
}
