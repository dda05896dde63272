//! Integration tests for the `readygate` binary.
//!
//! Each run gets its own config and state directories so a user's global configuration
//! cannot leak into the assertions.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const LIFECYCLE_SCRIPT: &str = r#"
initial = "initial"
ready = "running"

[[step]]
submit = "note"
gate = "running"
args = ["window shown"]

[[step]]
submit = "count"
gate = "libraries_ready"
args = [{ tag = "i64", value = 40 }]

[[step]]
submit = "fail"
gate = "bindings_ready"
args = ["binding missing"]

[[step]]
advance = "libraries_ready"

[[step]]
submit = "count"
gate = "launched"
args = [{ tag = "i64", value = 2 }]

[[step]]
advance = "running"
expect = "launched"

[[step]]
advance = "running"
expect = "libraries_ready"

[[step]]
submit = "note"
gate = "running"
args = ["inline"]
"#;

fn readygate(home: &Path, args: &[&str], envs: &[(&str, &str)]) -> Output {
    let bin = env!("CARGO_BIN_EXE_readygate");
    let mut command = Command::new(bin);
    command
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_STATE_HOME", home.join("state"))
        .env("HOME", home)
        .env_remove("READYGATE_LOG")
        .env_remove("READYGATE_LOG_FORMAT")
        .env_remove("READYGATE_LOG_OUTPUT")
        .args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().unwrap()
}

fn write_script(dir: &TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_replay_json_report() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(&temp_dir, "lifecycle.toml", LIFECYCLE_SCRIPT);

    let output = readygate(temp_dir.path(), &["--quiet", "replay", &script, "--json"], &[]);
    assert!(
        output.status.success(),
        "replay should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let transcript: Vec<&str> = report["transcript"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line.as_str().unwrap())
        .collect();
    assert_eq!(
        transcript,
        vec![
            "count: +40 = 40",
            "count: +2 = 42",
            "note: window shown",
            "note: inline"
        ]
    );

    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 8);
    assert_eq!(steps[0]["outcome"], "queued");
    assert_eq!(steps[4]["outcome"], "executed");
    assert_eq!(steps[5]["outcome"], "rejected");
    assert_eq!(steps[5]["current"], "libraries_ready");
    assert_eq!(steps[6]["outcome"], "failed");
    assert!(steps[6]["error"]
        .as_str()
        .unwrap()
        .contains("binding missing"));
    assert_eq!(steps[7]["outcome"], "executed");

    assert_eq!(report["stats"]["state"], "running");
    assert_eq!(report["stats"]["ready"], true);
    assert_eq!(report["stats"]["executed"], 4);
    assert_eq!(report["stats"]["failed"], 1);
}

#[test]
fn test_replay_text_report() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(&temp_dir, "lifecycle.toml", LIFECYCLE_SCRIPT);

    let output = readygate(temp_dir.path(), &["-q", "replay", &script], &[]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("transcript:"));
    assert!(stdout.contains("rejected (state is libraries_ready)"));
    assert!(stdout.contains("state: running  ready: true"));
}

#[test]
fn test_check_reports_unresolvable_steps() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        &temp_dir,
        "bad.toml",
        r#"
[[step]]
submit = "emit"
gate = "running"
args = ["frame"]

[[step]]
advance = "running"
"#,
    );

    let output = readygate(temp_dir.path(), &["-q", "check", &script], &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("step 1:"), "stderr={}", stderr);
    assert!(stderr.contains("cannot be deferred"), "stderr={}", stderr);
}

#[test]
fn test_check_accepts_valid_script() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(&temp_dir, "lifecycle.toml", LIFECYCLE_SCRIPT);

    let output = readygate(temp_dir.path(), &["-q", "check", &script], &[]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("8 step(s) OK"));
}

#[test]
fn test_invalid_env_override_fails_before_running() {
    let temp_dir = TempDir::new().unwrap();
    let output = readygate(
        temp_dir.path(),
        &["states"],
        &[("READYGATE__LOGGING__FORMAT", "xml")],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid log format: xml"));
}

#[test]
fn test_logging_to_file_keeps_stdout_clean() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("logs").join("replay.log");
    let config = temp_dir.path().join("readygate.toml");
    fs::write(
        &config,
        format!(
            "[logging]\nlevel = \"debug\"\nformat = \"json\"\noutput = \"file\"\nfile = {:?}\n",
            log_file.to_string_lossy()
        ),
    )
    .unwrap();

    let output = readygate(
        temp_dir.path(),
        &["--config", &config.to_string_lossy(), "states"],
        &[],
    );
    assert!(
        output.status.success(),
        "states should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("initial"));

    let logged = fs::read_to_string(&log_file).unwrap();
    let first: serde_json::Value = serde_json::from_str(logged.lines().next().unwrap()).unwrap();
    assert!(first["timestamp"].is_string());
    assert_eq!(first["level"], "INFO");
}
