//! Test utilities for tnr
//!
//! Helpers for building release archives, checksum manifests and feed payloads
//! in memory, plus once-only tracing setup for tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use tnr_cli::test_utils::ReleaseFixture;
//! use tnr_cli::upgrade::Platform;
//!
//! let fixture =
//!     ReleaseFixture::new("v1.2.3", &Platform::current(), b"new binary").unwrap();
//! let body = fixture.release_json("http://127.0.0.1:1234");
//! assert!(body.contains("checksums.txt"));
//! ```

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::io::{self, Cursor, Write};
use std::path::Path;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::upgrade::Platform;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// A file to place in a test archive: `(path, contents, unix mode)`.
pub type ArchiveEntry<'a> = (&'a str, &'a [u8], u32);

/// Builds a `.tar.gz` archive in memory.
pub fn tar_gz_bytes(entries: &[ArchiveEntry<'_>]) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, name, *data)?;
    }
    builder.into_inner()?.finish()
}

/// Builds a `.zip` archive in memory.
pub fn zip_bytes(entries: &[ArchiveEntry<'_>]) -> io::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data, mode) in entries {
        let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
        writer.start_file(*name, options).map_err(io::Error::other)?;
        writer.write_all(data)?;
    }
    Ok(writer.finish().map_err(io::Error::other)?.into_inner())
}

/// Writes a `.tar.gz` archive to `path`.
pub fn write_tar_gz(path: &Path, entries: &[ArchiveEntry<'_>]) -> io::Result<()> {
    std::fs::write(path, tar_gz_bytes(entries)?)
}

/// Writes a `.zip` archive to `path`.
pub fn write_zip(path: &Path, entries: &[ArchiveEntry<'_>]) -> io::Result<()> {
    std::fs::write(path, zip_bytes(entries)?)
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A complete fake release for one platform: archive, checksum manifest and
/// feed payload.
#[derive(Debug, Clone)]
pub struct ReleaseFixture {
    /// Release tag.
    pub tag: String,
    /// Archive asset name, e.g. `tnr_linux_amd64.tar.gz`.
    pub archive_name: String,
    /// Archive contents.
    pub archive: Vec<u8>,
    /// Executable packed into the archive.
    pub binary: Vec<u8>,
}

impl ReleaseFixture {
    /// Packs `binary` as the tnr executable for `platform`.
    pub fn new(tag: &str, platform: &Platform, binary: &[u8]) -> io::Result<Self> {
        let entries: [ArchiveEntry<'_>; 1] = [(platform.exe_name(), binary, 0o755)];
        let (archive_name, archive) = if platform.is_windows() {
            (format!("tnr_{}_{}.zip", platform.os, platform.arch), zip_bytes(&entries)?)
        } else {
            (format!("tnr_{}_{}.tar.gz", platform.os, platform.arch), tar_gz_bytes(&entries)?)
        };
        Ok(Self {
            tag: tag.to_string(),
            archive_name,
            archive,
            binary: binary.to_vec(),
        })
    }

    /// SHA-256 of the archive.
    pub fn sha256(&self) -> String {
        sha256_hex(&self.archive)
    }

    /// Checksum manifest listing the archive and an unrelated asset.
    pub fn checksums(&self) -> String {
        format!(
            "{}  tnr_plan9_mips.tar.gz\n{}  {}\n",
            "0".repeat(64),
            self.sha256(),
            self.archive_name
        )
    }

    /// Release feed payload whose asset URLs point at `base_url`.
    pub fn release_json(&self, base_url: &str) -> String {
        serde_json::json!({
            "tag_name": self.tag,
            "assets": [
                {
                    "name": self.archive_name,
                    "browser_download_url": format!("{base_url}/download/{}", self.archive_name),
                    "size": self.archive.len()
                },
                {
                    "name": "checksums.txt",
                    "browser_download_url": format!("{base_url}/download/checksums.txt")
                }
            ]
        })
        .to_string()
    }
}
