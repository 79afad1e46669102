use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::{Result, UpdateError};
use crate::upgrade::installer::InstallOutcome;
use crate::utils::fs::{dir_writable, replace_executable};

// Copy next to the target, then rename, so the swap stays atomic under sudo too.
const SUDO_SCRIPT: &str = r#"cp "$1" "$3" && chmod 755 "$3" && mv -f "$3" "$2""#;

/// Replaces the executable in place.
///
/// Renaming over a running executable is safe on Unix: the running process
/// keeps its open inode. When the directory is not writable a single `sudo`
/// invocation performs the same copy and rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixInstaller;

impl UnixInstaller {
    /// Installs `new_binary` as `exe`.
    ///
    /// # Errors
    ///
    /// [`UpdateError::PermissionDenied`] when the directory is not writable and
    /// `sudo` is unavailable, declined, or fails.
    pub async fn install(&self, exe: &Path, new_binary: &Path, version: &str) -> Result<InstallOutcome> {
        let dir = install_dir(exe);

        if dir_writable(&dir) {
            let (src, dest) = (new_binary.to_path_buf(), exe.to_path_buf());
            let replaced = tokio::task::spawn_blocking(move || replace_executable(&src, &dest))
                .await
                .map_err(|e| UpdateError::other(format!("Install task failed: {e}")))?;

            match replaced {
                Ok(()) => {
                    info!("Replaced {} with version {version}", exe.display());
                    return Ok(InstallOutcome::Replaced);
                }
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    debug!("Rename into {} denied; retrying with sudo", dir.display());
                }
                Err(e) => {
                    return Err(UpdateError::SwapFailed {
                        path: exe.display().to_string(),
                        reason: e.to_string(),
                        rolled_back: true,
                    });
                }
            }
        }

        install_with_sudo(exe, new_binary).await?;
        info!("Replaced {} with version {version} using sudo", exe.display());
        Ok(InstallOutcome::Replaced)
    }
}

async fn install_with_sudo(exe: &Path, new_binary: &Path) -> Result<()> {
    let denied = |operation: &str| UpdateError::PermissionDenied {
        operation: operation.to_string(),
        path: exe.display().to_string(),
    };

    let sudo = which::which("sudo").map_err(|_| denied("replace executable (sudo is not available)"))?;
    let staging = install_dir(exe).join(".tnr-tmp");

    let status = tokio::process::Command::new(sudo)
        .args(["sh", "-c", SUDO_SCRIPT, "sh"])
        .arg(new_binary)
        .arg(exe)
        .arg(&staging)
        .status()
        .await
        .map_err(|e| denied(&format!("launch sudo: {e}")))?;

    if !status.success() {
        return Err(denied("replace executable with sudo"));
    }
    Ok(())
}

fn install_dir(exe: &Path) -> PathBuf {
    match exe.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_replaces_in_writable_dir() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("tnr");
        let new_binary = temp.path().join("extracted-tnr");
        std::fs::write(&exe, b"old").unwrap();
        std::fs::write(&new_binary, b"new").unwrap();

        let outcome = UnixInstaller.install(&exe, &new_binary, "1.2.3").await.unwrap();
        assert_eq!(outcome, InstallOutcome::Replaced);
        assert_eq!(std::fs::read(&exe).unwrap(), b"new");
        assert!(!temp.path().join(".tnr-tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_binary_leaves_executable() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("tnr");
        std::fs::write(&exe, b"old").unwrap();

        let result = UnixInstaller.install(&exe, &temp.path().join("missing"), "1.2.3").await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&exe).unwrap(), b"old");
    }

    #[test]
    fn test_install_dir_of_bare_name() {
        assert_eq!(install_dir(Path::new("tnr")), PathBuf::from("."));
        assert_eq!(install_dir(Path::new("/usr/local/bin/tnr")), PathBuf::from("/usr/local/bin"));
    }
}
