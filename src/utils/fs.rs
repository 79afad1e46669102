//! File system helpers for replacing executables safely.
//!
//! Every write that other processes may observe goes through a temporary file in
//! the destination directory followed by a rename, so readers see either the old
//! content or the new content, never a partial file.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::constants::WRITE_PROBE_NAME;

/// Ensures a directory exists, creating it and all parents if needed.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Returns `true` if the current user can create files in `dir`.
///
/// Creates and removes a probe file; permission bits alone are not reliable
/// (ACLs, read-only mounts, UAC virtualization).
pub fn dir_writable(dir: &Path) -> bool {
    tempfile::Builder::new().prefix(WRITE_PROBE_NAME).tempfile_in(dir).is_ok()
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// The parent directory is created if missing. The temporary file lives in the
/// same directory so the final rename never crosses filesystems.
///
/// # Examples
///
/// ```rust,no_run
/// use tnr_cli::utils::fs::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> std::io::Result<()> {
/// atomic_write(Path::new("/tmp/tnr/latest.json"), br#"{"latest_version":"v1.2.3"}"#)?;
/// # Ok(())
/// # }
/// ```
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = parent_dir(path);
    ensure_dir(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copies `src` over `dest` atomically and marks the result executable.
///
/// The copy is written to a temporary file next to `dest`, made executable,
/// then renamed into place. On Unix renaming over a running executable is safe:
/// the running process keeps its mapped inode.
pub fn replace_executable(src: &Path, dest: &Path) -> std::io::Result<()> {
    let parent = parent_dir(dest);
    let tmp = tempfile::Builder::new().prefix(".tnr-tmp").tempfile_in(parent)?;
    fs::copy(src, tmp.path())?;
    set_executable(tmp.path())?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Sets `0o755` permissions on Unix; a no-op elsewhere.
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parents() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nested/dir/latest.json");

        atomic_write(&target, b"{}").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{}");

        atomic_write(&target, b"{\"a\":1}").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_dir_writable_leaves_no_probe() {
        let temp = TempDir::new().unwrap();
        assert!(dir_writable(temp.path()));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_dir_writable_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(!dir_writable(&temp.path().join("missing")));
    }

    #[test]
    fn test_replace_executable() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("new-build");
        let dest = temp.path().join("tnr");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        replace_executable(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
