//! Release archive extraction.
//!
//! Windows releases are `.zip` files; every other platform ships gzip-compressed
//! tarballs. Entries with absolute paths, drive prefixes or `..` components are
//! rejected with [`UpdateError::ExtractionFailed`].

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::core::{Result, UpdateError};

/// Unpacks `archive` into `dest`, creating `dest` if needed.
///
/// Dispatches on the file name: `.zip` archives are read with a zip reader that
/// keeps directory structure and Unix modes; anything else is read as `.tar.gz`.
///
/// # Errors
///
/// [`UpdateError::ExtractionFailed`] for corrupt archives or unsafe entry paths.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    let name = archive_name(archive);
    debug!("Extracting {name} into {}", dest.display());

    let failed = |reason: String| UpdateError::ExtractionFailed {
        archive: name.clone(),
        reason,
    };

    if name.to_lowercase().ends_with(".zip") {
        extract_zip(archive, dest).map_err(|e| failed(e.to_string()))
    } else {
        extract_tar_gz(archive, dest).map_err(|e| failed(e.to_string()))
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> io::Result<()> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?).map_err(io::Error::other)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(io::Error::other)?;
        let relative = entry
            .enclosed_name()
            .filter(|path| is_relative_inside(path))
            .ok_or_else(|| unsafe_entry(Path::new(entry.name())))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
    }
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> io::Result<()> {
    let mut tarball = tar::Archive::new(GzDecoder::new(File::open(archive)?));
    tarball.set_preserve_permissions(true);

    for entry in tarball.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        if !is_relative_inside(&path) {
            return Err(unsafe_entry(&path));
        }
        let kind = entry.header().entry_type();
        if !(kind.is_dir() || kind.is_file()) {
            debug!("Skipping non-regular tar entry {}", path.display());
            continue;
        }
        if !entry.unpack_in(dest)? {
            return Err(unsafe_entry(&path));
        }
    }
    Ok(())
}

/// Only plain relative components: no root, no drive prefix, no `..`.
fn is_relative_inside(path: &Path) -> bool {
    path.components().all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn unsafe_entry(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("unsafe entry path: {}", path.display()))
}

/// Finds the executable named `exe_name` inside an extracted archive.
///
/// Looks for `dir/<exe_name>` first, then falls back to the first file matching
/// `tnr*` anywhere below `dir` (archives sometimes wrap the binary in a folder).
///
/// # Errors
///
/// [`UpdateError::ExecutableNotFound`] if neither lookup matches.
pub fn locate_executable(dir: &Path, exe_name: &str) -> Result<PathBuf> {
    let exact = dir.join(exe_name);
    if exact.is_file() {
        return Ok(exact);
    }

    let not_found = || UpdateError::ExecutableNotFound {
        name: exe_name.to_string(),
        dir: dir.display().to_string(),
    };

    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{root}/**/tnr*");
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|_| not_found())?
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_file())
        .collect();
    matches.sort();

    // Prefer an exact name in a nested folder over e.g. a README named tnr.txt.
    let best = matches
        .iter()
        .find(|path| path.file_name().is_some_and(|name| name == exe_name))
        .or_else(|| matches.first())
        .cloned();
    best.ok_or_else(not_found)
}

fn archive_name(archive: &Path) -> String {
    archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_tar_gz, write_zip};
    use tempfile::TempDir;

    #[test]
    fn test_extract_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tnr_linux_amd64.tar.gz");
        write_tar_gz(&archive, &[("tnr", b"#!/bin/sh\necho new\n".as_slice(), 0o755)]).unwrap();

        let out = temp.path().join("out");
        extract(&archive, &out).unwrap();
        let exe = locate_executable(&out, "tnr").unwrap();
        assert_eq!(fs::read(&exe).unwrap(), b"#!/bin/sh\necho new\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&exe).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_extract_zip_preserves_layout() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tnr_windows_amd64.ZIP");
        write_zip(&archive, &[("bin/tnr.exe", b"MZ".as_slice(), 0o755), ("LICENSE", b"MIT".as_slice(), 0o644)])
            .unwrap();

        let out = temp.path().join("out");
        extract(&archive, &out).unwrap();
        assert!(out.join("LICENSE").is_file());

        let exe = locate_executable(&out, "tnr.exe").unwrap();
        assert_eq!(exe, out.join("bin").join("tnr.exe"));
    }

    #[test]
    fn test_glob_fallback() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("tnr_1.2.3_linux_amd64");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("tnr-linux"), b"bin").unwrap();

        let exe = locate_executable(temp.path(), "tnr").unwrap();
        assert_eq!(exe, nested.join("tnr-linux"));
    }

    #[test]
    fn test_executable_not_found() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README.md"), b"docs").unwrap();
        let err = locate_executable(temp.path(), "tnr").unwrap_err();
        assert!(matches!(err, UpdateError::ExecutableNotFound { .. }));
    }

    /// Tarball with a raw entry name, bypassing the builder's path validation.
    fn raw_tar_gz(path: &Path, name: &str) {
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_size(4);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();

        let gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(gz);
        builder.append(&header, b"evil".as_slice()).unwrap();
        fs::write(path, builder.into_inner().unwrap().finish().unwrap()).unwrap();
    }

    #[test]
    fn test_tar_rejects_escaping_entries() {
        for name in ["../evil", "/abs/evil", "bin/../../evil"] {
            let temp = TempDir::new().unwrap();
            let archive = temp.path().join("tnr_linux_amd64.tar.gz");
            raw_tar_gz(&archive, name);

            let out = temp.path().join("out");
            let err = extract(&archive, &out).unwrap_err();
            assert!(
                matches!(err, UpdateError::ExtractionFailed { ref reason, .. } if reason.contains("unsafe entry path")),
                "{name}: {err:?}"
            );
            assert!(!out.join("abs").exists());
            assert!(!temp.path().join("evil").exists());
        }
    }

    #[test]
    fn test_zip_rejects_escaping_entries() {
        for name in ["../evil", "/abs/evil"] {
            let temp = TempDir::new().unwrap();
            let archive = temp.path().join("tnr_windows_amd64.zip");
            write_zip(&archive, &[(name, b"evil".as_slice(), 0o644)]).unwrap();

            let out = temp.path().join("out");
            let err = extract(&archive, &out).unwrap_err();
            assert!(matches!(err, UpdateError::ExtractionFailed { .. }), "{name}: {err:?}");
            assert!(!out.join("abs").exists());
            assert!(!temp.path().join("evil").exists());
        }
    }

    #[test]
    fn test_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tnr_linux_amd64.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, UpdateError::ExtractionFailed { .. }));
    }
}
