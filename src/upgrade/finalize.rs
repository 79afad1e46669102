//! Startup finalizer.
//!
//! Runs synchronously at the start of every launch, before the async runtime
//! and argument parsing. With nothing staged it only sweeps a leftover backup.

use std::path::Path;
use tracing::{debug, warn};

use crate::core::{Result, UpdateError};
use crate::upgrade::UpdateConfig;
use crate::upgrade::elevation::is_elevated;
use crate::upgrade::helper::{HelperRequest, run_elevated_helper};
use crate::upgrade::staging::{
    FinalizeOutcome, backup_path, finalize_in_dir, has_staged_update, staged_version, sweep_backup,
};
use crate::utils::fs::dir_writable;

/// Completes an update staged next to `exe`.
///
/// Swaps in place when the directory is writable or the process is elevated;
/// otherwise relaunches an elevated finalize helper.
pub fn finalize_pending_update(exe: &Path) -> Result<FinalizeOutcome> {
    let (dir, exe_name) = split_exe(exe)?;

    if !has_staged_update(dir) {
        sweep_backup(dir);
        return Ok(FinalizeOutcome::NothingStaged);
    }

    if dir_writable(dir) || is_elevated() {
        return finalize_in_dir(dir, exe_name);
    }

    debug!("{} is not writable; finalizing through the elevated helper", dir.display());
    let version = staged_version(dir);
    run_elevated_helper(HelperRequest::Finalize {
        to: dir.to_path_buf(),
    })?;

    if has_staged_update(dir) {
        return Err(UpdateError::other("Elevated helper did not finalize the staged update"));
    }
    Ok(FinalizeOutcome::Swapped {
        version,
        backup_removed: !backup_path(dir).exists(),
    })
}

/// Entry point called first thing in `main`. Never fails; problems are logged
/// and the previous executable keeps running.
pub fn finalize_at_startup(config: &UpdateConfig) -> Option<FinalizeOutcome> {
    let exe = match config.current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            debug!("Skipping finalize: {e}");
            return None;
        }
    };

    match finalize_pending_update(&exe) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("Could not apply staged update: {e}");
            None
        }
    }
}

/// Tries to finalize right after an explicit update staged a binary.
///
/// Returns `true` when the swap happened. Failure is not an error for the
/// caller: the staged update is applied on the next launch instead.
pub fn try_finalize_now(exe: &Path) -> bool {
    match finalize_pending_update(exe) {
        Ok(outcome) => outcome.swapped(),
        Err(e) => {
            debug!("Immediate finalize failed; will retry on next launch: {e}");
            false
        }
    }
}

fn split_exe(exe: &Path) -> Result<(&Path, &str)> {
    let dir = exe.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = exe
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| UpdateError::other(format!("Invalid executable path: {}", exe.display())))?;
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrade::staging::stage_in_dir;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_finalize_pending_update_swaps() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("tnr");
        fs::write(&exe, b"old").unwrap();
        let binary = temp.path().join("download.bin");
        fs::write(&binary, b"new").unwrap();
        stage_in_dir(temp.path(), &binary, "2.0.0").unwrap();

        let outcome = finalize_pending_update(&exe).unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::Swapped {
                version: Some("2.0.0".to_string()),
                backup_removed: true,
            }
        );
        assert_eq!(fs::read(&exe).unwrap(), b"new");

        assert_eq!(finalize_pending_update(&exe).unwrap(), FinalizeOutcome::NothingStaged);
    }

    #[test]
    fn test_leftover_backup_swept_without_staged_update() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("tnr");
        fs::write(&exe, b"current").unwrap();
        fs::write(backup_path(temp.path()), b"previous").unwrap();

        assert_eq!(finalize_pending_update(&exe).unwrap(), FinalizeOutcome::NothingStaged);
        assert!(!backup_path(temp.path()).exists());
        assert_eq!(fs::read(&exe).unwrap(), b"current");
    }

    #[test]
    fn test_finalize_at_startup_uses_configured_executable() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("tnr");
        fs::write(&exe, b"old").unwrap();
        fs::write(temp.path().join("tnr.new"), b"new").unwrap();

        let config = UpdateConfig::new("1.0.0").with_executable(&exe);
        assert!(finalize_at_startup(&config).unwrap().swapped());
        assert!(!try_finalize_now(&exe));
        assert_eq!(fs::read(&exe).unwrap(), b"new");
    }
}
