use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::core::{Result, UpdateError};

/// Verifies the integrity of downloaded release assets using SHA-256.
///
/// Two checks are available:
/// - [`verify_checksum`](Self::verify_checksum) against a single expected digest
/// - [`verify_against_manifest`](Self::verify_against_manifest) against a checksum
///   manifest of `<hex-digest>  <filename>` lines
///
/// A failed check is fatal to the update attempt; nothing is installed.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the SHA-256 checksum of a file as lowercase hex.
    ///
    /// The file is hashed in chunks, so large archives are never held in memory.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use tnr_cli::upgrade::verification::ChecksumVerifier;
    /// use std::path::Path;
    ///
    /// # async fn example() -> tnr_cli::core::Result<()> {
    /// let checksum = ChecksumVerifier::compute_sha256(Path::new("/tmp/tnr.tar.gz")).await?;
    /// println!("SHA256: {checksum}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compute_sha256(file_path: &Path) -> Result<String> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = fs::File::open(file_path).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Verify a file against an expected digest (case-insensitive).
    ///
    /// An empty expected digest means "nothing to verify" and succeeds.
    ///
    /// # Errors
    ///
    /// [`UpdateError::ChecksumMismatch`] if the digests differ.
    pub async fn verify_checksum(file_path: &Path, expected_checksum: &str) -> Result<()> {
        let expected = expected_checksum.trim().to_lowercase();
        if expected.is_empty() {
            debug!("No expected checksum supplied; skipping verification");
            return Ok(());
        }

        let actual = Self::compute_sha256(file_path).await?;
        if actual != expected {
            return Err(UpdateError::ChecksumMismatch {
                file: display_name(file_path),
                expected,
                actual,
            });
        }

        info!("Checksum verified for {}", display_name(file_path));
        Ok(())
    }

    /// Verify a file against a checksum manifest on disk.
    ///
    /// Succeeds if any manifest line contains the file's digest (compared
    /// case-insensitively).
    ///
    /// # Errors
    ///
    /// [`UpdateError::ChecksumMismatch`] if no line lists the digest.
    pub async fn verify_against_manifest(file_path: &Path, manifest_path: &Path) -> Result<()> {
        let actual = Self::compute_sha256(file_path).await?;
        let manifest = fs::read_to_string(manifest_path).await?;

        if manifest_lists_digest(&manifest, &actual) {
            info!("Checksum for {} found in manifest", display_name(file_path));
            return Ok(());
        }

        Err(UpdateError::ChecksumMismatch {
            file: display_name(file_path),
            expected: format!("an entry in {}", display_name(manifest_path)),
            actual,
        })
    }
}

/// Whether any line of `manifest` contains `digest`.
pub fn manifest_lists_digest(manifest: &str, digest: &str) -> bool {
    let digest = digest.to_lowercase();
    !digest.is_empty() && manifest.lines().any(|line| line.to_lowercase().contains(&digest))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
