//! Binary-level tests of `tnr`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use tnr_cli::constants::{ENV_NO_SELFUPDATE, ENV_UPDATE_CACHE_DIR, HELPER_FLAG};

fn tnr(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tnr").unwrap();
    cmd.env(ENV_NO_SELFUPDATE, "1").env(ENV_UPDATE_CACHE_DIR, temp.path().join("cache"));
    cmd
}

#[test]
fn test_version_command() {
    let temp = TempDir::new().unwrap();
    tnr(&temp).arg("version").assert().success().stdout(predicate::str::starts_with("tnr "));
}

#[test]
fn test_update_refused_when_disabled() {
    let temp = TempDir::new().unwrap();
    tnr(&temp)
        .arg("update")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("TNR_NO_SELFUPDATE"));
}

#[test]
fn test_helper_rejects_malformed_arguments() {
    let temp = TempDir::new().unwrap();
    tnr(&temp).args([HELPER_FLAG, "--bogus", "x"]).assert().failure().code(1);
}

#[cfg(unix)]
#[test]
fn test_helper_finalizes_staged_update() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("install");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("tnr"), b"old").unwrap();
    std::fs::write(dir.join("tnr.new"), b"new").unwrap();
    let log_file = temp.path().join("helper.log");

    tnr(&temp)
        .args([HELPER_FLAG, "--finalize", "--to"])
        .arg(&dir)
        .arg("--log-file")
        .arg(&log_file)
        .assert()
        .success();

    assert_eq!(std::fs::read(dir.join("tnr")).unwrap(), b"new");
    assert!(!dir.join("tnr.new").exists());
    assert!(std::fs::read_to_string(&log_file).unwrap().contains("finalize completed"));
}
