use assert_cmd::Command;
use tempfile::tempdir;

fn nback() -> Command {
    Command::cargo_bin("nback").unwrap()
}

#[test]
fn help_lists_task_options() {
    let output = nback().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("--n-level"));
    assert!(stdout.contains("--practice-sequence"));
}

#[test]
fn print_config_applies_overrides() {
    let dir = tempdir().unwrap();
    let cfg_path = dir.path().join("missing.json");

    let output = nback()
        .args(["--config", cfg_path.to_str().unwrap(), "-n", "3", "--print-config"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["nBackSettings"]["nLevel"], 3);
    assert_eq!(json["nBackSettings"]["numberOfTrials"], 50);
    assert_eq!(json["breakSettings"]["enableBreaks"], false);
}

#[test]
fn invalid_level_is_rejected() {
    let dir = tempdir().unwrap();
    let cfg_path = dir.path().join("missing.json");

    let output = nback()
        .args(["--config", cfg_path.to_str().unwrap(), "-n", "7", "--print-config"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("7"));
}

#[test]
fn save_config_persists_settings() {
    let dir = tempdir().unwrap();
    let cfg_path = dir.path().join("nested").join("config.json");

    nback()
        .args([
            "--config",
            cfg_path.to_str().unwrap(),
            "-t",
            "20",
            "--save-config",
            "--print-config",
        ])
        .assert()
        .success();

    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&cfg_path).unwrap()).unwrap();
    assert_eq!(saved["nBackSettings"]["numberOfTrials"], 20);

    // the saved file is picked up on the next run
    let output = nback()
        .args(["--config", cfg_path.to_str().unwrap(), "--print-config"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["nBackSettings"]["numberOfTrials"], 20);
}
