//! CLI tests for `autofix run`, `autofix config` and `autofix env`.
//!
//! Spawns the autofix binary against a temp config using the mock backend, so
//! no network is touched. Commands are chosen to classify as unknown failures,
//! which keeps host package managers out of the picture.

use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use autofix::exit_codes;
use autofix::io::config::load_config;

fn write_mock_config(dir: &Path, auto_execute: bool) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let contents = format!(
        "[backend]\nprovider = \"mock\"\n\n[safety]\nauto_execute = {auto_execute}\n"
    );
    fs::write(&path, contents).expect("write config");
    path
}

fn autofix(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_autofix"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("spawn autofix")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn successful_command_exits_zero() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_mock_config(temp.path(), false);

    let output = autofix(&config, &["run", "echo", "hello"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("[Detecting Environment]"));
    assert!(stdout.contains("[Executing Command] echo hello"));
    assert!(stdout.contains("hello\n"));
    assert!(stdout.contains("[Success]"));
}

#[test]
fn destructive_command_is_blocked_without_running() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_mock_config(temp.path(), true);
    let victim = temp.path().join("keep");
    fs::create_dir(&victim).expect("mkdir");
    let victim_arg = victim.to_string_lossy().into_owned();

    let output = autofix(&config, &["run", "rm", "-rf", &victim_arg]);

    assert_eq!(output.status.code(), Some(exit_codes::BLOCKED));
    assert!(stdout_of(&output).contains("[Failed] destructive command blocked: rm -rf"));
    assert!(!stdout_of(&output).contains("[Executing Command]"));
    assert!(victim.exists());
}

#[test]
fn declined_fix_exits_with_command_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_mock_config(temp.path(), false);

    let output = autofix(&config, &["run", "false; exit 3"]);

    assert_eq!(output.status.code(), Some(3));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("[Suggested Fix] echo 'Mock fix applied'"));
    assert!(stdout.contains("Execute this fix? [no terminal, declined]"));
    assert!(stdout.contains("[Failed] fix declined by user"));
    assert!(!stdout.contains("[Applying Fix]"));
}

#[test]
fn auto_execute_applies_fix_then_gives_up() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_mock_config(temp.path(), true);

    let output = autofix(&config, &["run", "false; exit 3"]);

    assert_eq!(output.status.code(), Some(3));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("[Applying Fix] echo 'Mock fix applied'"));
    assert!(stdout.contains("[Fix Applied]"));
    assert!(stdout.contains("[Retry 1/3]"));
    assert!(stdout.contains("[Failed] no fix available"));
    assert!(!stdout.contains("[no terminal, declined]"));
}

#[test]
fn config_subcommand_persists_value() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("nested").join("config.toml");

    let output = autofix(&config, &["config", "safety.auto_execute", "true"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout_of(&output).contains("safety.auto_execute = true"));
    let cfg = load_config(&config).expect("load config");
    assert!(cfg.safety.auto_execute);
    assert!(cfg.safety.require_sudo_confirm);
}

#[test]
fn config_subcommand_rejects_unknown_key() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config.toml");

    let output = autofix(&config, &["config", "safety.yolo", "true"]);

    assert_eq!(output.status.code(), Some(exit_codes::ERROR));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown config key"));
    assert!(!config.exists());
}

#[test]
fn env_prints_snapshot_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config.toml");

    let output = autofix(&config, &["env"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("env json");
    for key in [
        "os",
        "os_version",
        "architecture",
        "package_manager",
        "has_sudo",
        "in_container",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
}
