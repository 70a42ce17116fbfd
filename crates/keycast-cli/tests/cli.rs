use assert_cmd::Command;

fn keycast() -> Command {
    let mut cmd = Command::cargo_bin("keycast").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn help_lists_subcommands() {
    let help = stdout_of(keycast().arg("--help"));
    assert!(help.contains("overlay"));
    assert!(help.contains("record"));
    assert!(help.contains("config"));
}

#[test]
fn config_defaults_when_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml");
    let out = stdout_of(keycast().arg("--config").arg(&path).arg("config"));
    assert!(out.contains("capacity = 10"));
    assert!(out.contains("hide_after_ms = 5000"));
    assert!(out.contains("start = \"F9\""));
}

#[test]
fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[overlay]\ncapacity = 3\n\n[capture]\nmouse = false\n").unwrap();

    let out = stdout_of(keycast().arg("--config").arg(&path).arg("config"));
    assert!(out.contains("capacity = 3"));
    assert!(out.contains("hide_after_ms = 5000"));
    assert!(out.contains("mouse = false"));
}

#[test]
fn malformed_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[overlay\ncapacity = 3\n").unwrap();

    let output = keycast()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("keycast: failed to parse config"));
}

#[test]
fn invalid_hotkey_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[keys]\nstop = \"ctrl+\"\n").unwrap();

    keycast()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .failure();
}

#[test]
fn record_requires_a_task_name() {
    let dir = tempfile::tempdir().unwrap();
    let output = keycast()
        .arg("--config")
        .arg(dir.path().join("none.toml"))
        .args(["record", "   "])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("task name must not be empty"));
}

#[test]
fn log_file_receives_output() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("keycast.log");
    keycast()
        .arg("--config")
        .arg(dir.path().join("none.toml"))
        .arg("--log-file")
        .arg(&log)
        .arg("-v")
        .arg("config")
        .assert()
        .success();
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("config file not found"));
}
