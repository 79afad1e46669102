//! Stage-then-finalize on a real directory.

use std::fs;
use tempfile::TempDir;
use tnr_cli::upgrade::helper::{HelperRequest, execute};
use tnr_cli::upgrade::staging::{backup_path, has_staged_update, marker_path, staged_path};
use tnr_cli::upgrade::{FinalizeOutcome, InstallMeta, Platform, UpdateConfig, finalize_at_startup};

fn install_dir(temp: &TempDir) -> std::path::PathBuf {
    let dir = temp.path().join("Program Files").join("tnr");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(Platform::current().exe_name()), b"old").unwrap();
    dir
}

#[test]
fn test_helper_stage_then_startup_finalize() {
    let temp = TempDir::new().unwrap();
    let dir = install_dir(&temp);
    let download = temp.path().join("download");
    fs::write(&download, b"new").unwrap();

    execute(&HelperRequest::Stage {
        from: download,
        to: dir.clone(),
        version: "2.0.0".to_string(),
    })
    .unwrap();
    assert!(has_staged_update(&dir));
    assert_eq!(fs::read_to_string(marker_path(&dir)).unwrap(), "2.0.0");

    let exe = dir.join(Platform::current().exe_name());
    assert_eq!(fs::read(&exe).unwrap(), b"old");

    let config = UpdateConfig::new("1.0.0").with_executable(&exe);
    let outcome = finalize_at_startup(&config).unwrap();
    assert_eq!(
        outcome,
        FinalizeOutcome::Swapped {
            version: Some("2.0.0".to_string()),
            backup_removed: true,
        }
    );
    assert_eq!(fs::read(&exe).unwrap(), b"new");
    assert!(!staged_path(&dir).exists());
    assert!(!marker_path(&dir).exists());
    assert!(!backup_path(&dir).exists());

    // Nothing staged any more: both runs are no-ops.
    assert_eq!(finalize_at_startup(&config), Some(FinalizeOutcome::NothingStaged));
    assert_eq!(finalize_at_startup(&config), Some(FinalizeOutcome::NothingStaged));
    assert_eq!(fs::read(&exe).unwrap(), b"new");
}

#[test]
fn test_helper_finalize_request() {
    let temp = TempDir::new().unwrap();
    let dir = install_dir(&temp);
    fs::write(staged_path(&dir), b"staged").unwrap();

    execute(&HelperRequest::Finalize {
        to: dir.clone(),
    })
    .unwrap();

    assert_eq!(fs::read(dir.join(Platform::current().exe_name())).unwrap(), b"staged");
    assert!(!has_staged_update(&dir));
}

#[test]
fn test_helper_update_meta_request() {
    let temp = TempDir::new().unwrap();
    let document = temp.path().join("meta.json");
    fs::write(&document, br#"{"installType":"msi","source":"winget","version":"2.0.0"}"#).unwrap();
    let target = temp.path().join("ProgramData").join("install-meta.json");

    execute(&HelperRequest::UpdateMeta {
        from: document,
        to: target.clone(),
    })
    .unwrap();

    assert_eq!(InstallMeta::read(&target), Some(InstallMeta::new("msi", "winget", "2.0.0")));
}

#[test]
fn test_leftover_backup_swept_on_startup() {
    let temp = TempDir::new().unwrap();
    let dir = install_dir(&temp);
    fs::write(backup_path(&dir), b"previous").unwrap();

    let config = UpdateConfig::new("1.0.0").with_executable(dir.join(Platform::current().exe_name()));
    assert_eq!(finalize_at_startup(&config), Some(FinalizeOutcome::NothingStaged));
    assert!(!backup_path(&dir).exists());
}
