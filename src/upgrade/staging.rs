//! Stage-then-finalize primitives.
//!
//! A staged update is a replacement executable (`tnr.new`) and a marker
//! (`.tnr-update`, holding the target version) next to the installed
//! executable. Staging never touches the installed executable; finalize swaps
//! it using renames only:
//!
//! ```text
//! tnr      -> tnr.old     (backup)
//! tnr.new  -> tnr         (on failure: tnr.old -> tnr)
//! remove .tnr-update, then tnr.old (bounded retries)
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{
    BACKUP_BINARY_NAME, BACKUP_REMOVE_ATTEMPTS, STAGED_BINARY_NAME, STAGED_MARKER_NAME,
};
use crate::core::{Result, UpdateError};
use crate::utils::backoff::blocking_backoff_with_delay;
use crate::utils::fs::{atomic_write, ensure_dir, set_executable};

/// Path of the staged executable in `dir`.
pub fn staged_path(dir: &Path) -> PathBuf {
    dir.join(STAGED_BINARY_NAME)
}

/// Path of the staged-update marker in `dir`.
pub fn marker_path(dir: &Path) -> PathBuf {
    dir.join(STAGED_MARKER_NAME)
}

/// Path of the backup executable in `dir`.
pub fn backup_path(dir: &Path) -> PathBuf {
    dir.join(BACKUP_BINARY_NAME)
}

/// Whether `dir` holds a staged executable.
pub fn has_staged_update(dir: &Path) -> bool {
    staged_path(dir).is_file()
}

/// Version recorded in the marker, if any.
pub fn staged_version(dir: &Path) -> Option<String> {
    fs::read_to_string(marker_path(dir))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Stages `new_binary` in `dir` for `version` and returns the staged path.
///
/// The staged file is written through a temporary file and renamed into place,
/// so a half-copied `tnr.new` is never observable. The marker is written last.
pub fn stage_in_dir(dir: &Path, new_binary: &Path, version: &str) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let staged = staged_path(dir);

    let tmp = tempfile::Builder::new().prefix(".tnr-stage").tempfile_in(dir)?;
    fs::copy(new_binary, tmp.path())?;
    set_executable(tmp.path())?;
    tmp.persist(&staged).map_err(|e| e.error)?;

    atomic_write(&marker_path(dir), version.as_bytes())?;
    debug!("Staged {} for version {version}", staged.display());
    Ok(staged)
}

/// Result of a finalize attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// No staged update was present.
    NothingStaged,
    /// The staged executable replaced the installed one.
    Swapped {
        /// Version from the marker, if it was readable
        version: Option<String>,
        /// Whether the backup executable was deleted
        backup_removed: bool,
    },
}

impl FinalizeOutcome {
    /// Whether an executable was swapped.
    pub const fn swapped(&self) -> bool {
        matches!(self, Self::Swapped { .. })
    }
}

/// Completes a staged update in `dir`, replacing `dir/<exe_name>`.
///
/// A no-op when nothing is staged, so running it twice is safe. Never leaves
/// the executable path missing: if the staged file cannot be renamed in, the
/// backup is renamed back.
///
/// # Errors
///
/// [`UpdateError::SwapFailed`]; `rolled_back` tells whether the previous
/// executable is in place.
pub fn finalize_in_dir(dir: &Path, exe_name: &str) -> Result<FinalizeOutcome> {
    finalize_with(dir, exe_name, |from, to| fs::rename(from, to))
}

/// [`finalize_in_dir`] with the rename operation supplied by the caller.
fn finalize_with<R>(dir: &Path, exe_name: &str, rename: R) -> Result<FinalizeOutcome>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    let staged = staged_path(dir);
    if !staged.is_file() {
        sweep_backup(dir);
        return Ok(FinalizeOutcome::NothingStaged);
    }

    let exe = dir.join(exe_name);
    let backup = backup_path(dir);
    let version = staged_version(dir);
    let swap_failed = |reason: String, rolled_back: bool| UpdateError::SwapFailed {
        path: exe.display().to_string(),
        reason,
        rolled_back,
    };

    remove_if_present(&backup)?;

    let had_exe = exe.exists();
    if had_exe {
        rename(exe.as_path(), backup.as_path())
            .map_err(|e| swap_failed(format!("cannot move current executable aside: {e}"), true))?;
    }

    if let Err(e) = rename(staged.as_path(), exe.as_path()) {
        let rolled_back = !had_exe || rename(backup.as_path(), exe.as_path()).is_ok();
        if !rolled_back {
            warn!("Could not restore {} from {}", exe.display(), backup.display());
        }
        return Err(swap_failed(format!("cannot move staged executable into place: {e}"), rolled_back));
    }

    if let Err(e) = remove_if_present(&marker_path(dir)) {
        warn!("Failed to remove update marker: {e}");
    }
    let backup_removed = !had_exe || remove_backup(&backup);

    info!(
        "Finalized update of {}{}",
        exe.display(),
        version.as_deref().map(|v| format!(" to {v}")).unwrap_or_default()
    );
    Ok(FinalizeOutcome::Swapped {
        version,
        backup_removed,
    })
}

/// Deletes the backup executable, retrying with exponential backoff.
///
/// The OS may briefly keep a just-replaced executable locked. Returns whether
/// the backup is gone; a leftover is logged and removed by a later
/// [`sweep_backup`].
pub fn remove_backup(backup: &Path) -> bool {
    let mut attempt = 0;
    loop {
        match fs::remove_file(backup) {
            Ok(()) => return true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
            Err(e) if attempt + 1 >= BACKUP_REMOVE_ATTEMPTS => {
                warn!("Leaving backup {} for the next launch: {e}", backup.display());
                return false;
            }
            Err(e) => {
                debug!("Backup removal attempt {} failed: {e}", attempt + 1);
                attempt = blocking_backoff_with_delay(attempt);
            }
        }
    }
}

/// Removes a backup left behind by an earlier finalize. Returns whether one
/// was removed.
pub fn sweep_backup(dir: &Path) -> bool {
    let backup = backup_path(dir);
    if !backup.exists() {
        return false;
    }
    match fs::remove_file(&backup) {
        Ok(()) => {
            debug!("Removed leftover backup {}", backup.display());
            true
        }
        Err(e) => {
            debug!("Leftover backup {} still locked: {e}", backup.display());
            false
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install_dir() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("bin");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("tnr"), b"old").unwrap();
        (temp, dir)
    }

    #[test]
    fn test_stage_leaves_executable_untouched() {
        let (temp, dir) = install_dir();
        let binary = temp.path().join("download");
        fs::write(&binary, b"new").unwrap();

        let staged = stage_in_dir(&dir, &binary, "1.2.3").unwrap();
        assert_eq!(staged, dir.join("tnr.new"));
        assert_eq!(fs::read(dir.join("tnr")).unwrap(), b"old");
        assert!(has_staged_update(&dir));
        assert_eq!(staged_version(&dir).as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_stage_then_finalize() {
        let (temp, dir) = install_dir();
        let binary = temp.path().join("download");
        fs::write(&binary, b"new").unwrap();
        stage_in_dir(&dir, &binary, "1.2.3").unwrap();

        let outcome = finalize_in_dir(&dir, "tnr").unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::Swapped {
                version: Some("1.2.3".to_string()),
                backup_removed: true,
            }
        );
        assert_eq!(fs::read(dir.join("tnr")).unwrap(), b"new");
        assert!(!staged_path(&dir).exists());
        assert!(!marker_path(&dir).exists());
        assert!(!backup_path(&dir).exists());
    }

    #[test]
    fn test_finalize_twice_is_noop() {
        let (_temp, dir) = install_dir();
        assert_eq!(finalize_in_dir(&dir, "tnr").unwrap(), FinalizeOutcome::NothingStaged);
        assert_eq!(finalize_in_dir(&dir, "tnr").unwrap(), FinalizeOutcome::NothingStaged);
        assert_eq!(fs::read(dir.join("tnr")).unwrap(), b"old");
    }

    #[test]
    fn test_stale_backup_replaced() {
        let (_temp, dir) = install_dir();
        fs::write(backup_path(&dir), b"ancient").unwrap();
        fs::write(staged_path(&dir), b"new").unwrap();

        assert!(finalize_in_dir(&dir, "tnr").unwrap().swapped());
        assert_eq!(fs::read(dir.join("tnr")).unwrap(), b"new");
        assert!(!backup_path(&dir).exists());
    }

    fn failing_rename(blocked: Vec<PathBuf>) -> impl Fn(&Path, &Path) -> io::Result<()> {
        move |from, to| {
            if blocked.iter().any(|path| path == from) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
            }
            fs::rename(from, to)
        }
    }

    #[test]
    fn test_failed_rename_in_restores_backup() {
        let (_temp, dir) = install_dir();
        fs::write(staged_path(&dir), b"new").unwrap();
        fs::write(marker_path(&dir), b"1.2.3").unwrap();

        let err = finalize_with(&dir, "tnr", failing_rename(vec![staged_path(&dir)])).unwrap_err();
        match err {
            UpdateError::SwapFailed {
                rolled_back,
                reason,
                ..
            } => {
                assert!(rolled_back);
                assert!(reason.contains("staged executable"));
            }
            other => panic!("expected SwapFailed, got {other:?}"),
        }
        assert_eq!(fs::read(dir.join("tnr")).unwrap(), b"old");
        assert!(!backup_path(&dir).exists());
        // Still staged, so the next launch retries.
        assert!(has_staged_update(&dir));
    }

    #[test]
    fn test_failed_rollback_is_reported() {
        let (_temp, dir) = install_dir();
        fs::write(staged_path(&dir), b"new").unwrap();

        let blocked = vec![staged_path(&dir), backup_path(&dir)];
        let err = finalize_with(&dir, "tnr", failing_rename(blocked)).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::SwapFailed {
                rolled_back: false,
                ..
            }
        ));
        assert_eq!(fs::read(backup_path(&dir)).unwrap(), b"old");
    }

    #[test]
    fn test_unremovable_stale_backup_leaves_executable() {
        let (_temp, dir) = install_dir();
        fs::write(staged_path(&dir), b"new").unwrap();
        fs::create_dir_all(backup_path(&dir).join("occupied")).unwrap();

        assert!(finalize_in_dir(&dir, "tnr").is_err());
        assert_eq!(fs::read(dir.join("tnr")).unwrap(), b"old");
        assert!(has_staged_update(&dir));
    }

    #[test]
    fn test_sweep_backup() {
        let (_temp, dir) = install_dir();
        assert!(!sweep_backup(&dir));
        fs::write(backup_path(&dir), b"old").unwrap();
        assert!(sweep_backup(&dir));
        assert!(!backup_path(&dir).exists());
    }

    #[test]
    fn test_remove_backup_missing_is_success() {
        let temp = TempDir::new().unwrap();
        assert!(remove_backup(&temp.path().join("tnr.old")));
    }
}
