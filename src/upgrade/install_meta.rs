//! Persisted install metadata.
//!
//! External installers record how tnr was installed in a small JSON document:
//!
//! ```json
//! { "installType": "msi", "source": "msi", "version": "1.2.3" }
//! ```
//!
//! The file is read by every update attempt to pick an install strategy and
//! rewritten after a platform installer upgrade, since the installer may reset
//! or omit it. Installers written in PowerShell tend to emit a UTF-8 byte order
//! mark, so one is stripped before parsing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::INSTALL_META_FILE;
use crate::core::Result;
use crate::upgrade::source::strip_v;
use crate::utils::fs::atomic_write;

/// Install type written by the platform installer package.
pub const PLATFORM_INSTALLER_TYPE: &str = "msi";

/// Install type for binaries placed by hand or by an install script.
pub const MANUAL_TYPE: &str = "manual";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// How tnr was installed on this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMeta {
    /// Install type, e.g. `msi` or `manual`.
    #[serde(default)]
    pub install_type: String,
    /// Free-form provenance recorded by the installer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Installed version without a `v` prefix.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl InstallMeta {
    /// Creates a metadata record.
    pub fn new(
        install_type: impl Into<String>,
        source: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            install_type: install_type.into(),
            source: source.into(),
            version: strip_v(version.into().trim()).to_string(),
        }
    }

    /// Declared install type, trimmed and lowercased; `None` when blank.
    pub fn declared_type(&self) -> Option<String> {
        let kind = self.install_type.trim().to_lowercase();
        (!kind.is_empty()).then_some(kind)
    }

    /// Parses a metadata document, tolerating a leading byte order mark.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
        Ok(serde_json::from_slice(data)?)
    }

    /// Serializes the record as pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Reads the record at `path`.
    ///
    /// Missing or malformed files yield `None`; metadata only ever refines the
    /// install strategy, so its absence is not an error.
    pub fn read(path: &Path) -> Option<Self> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                debug!("No install metadata at {}: {e}", path.display());
                return None;
            }
        };
        match Self::from_bytes(&data) {
            Ok(meta) => Some(meta),
            Err(e) => {
                debug!("Ignoring malformed install metadata at {}: {e}", path.display());
                None
            }
        }
    }

    /// Atomically writes the record to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        atomic_write(path, &self.to_json()?)?;
        Ok(())
    }

    /// Metadata location next to an executable.
    pub fn path_next_to(exe: &Path) -> PathBuf {
        exe.parent().unwrap_or_else(|| Path::new(".")).join(INSTALL_META_FILE)
    }

    /// Loads the metadata for `exe`: the file next to it first, then `fallback`.
    pub fn load_for(exe: &Path, fallback: &Path) -> Option<Self> {
        Self::read(&Self::path_next_to(exe)).or_else(|| Self::read(fallback))
    }

    /// Record to persist after a platform installer upgraded to `version`.
    ///
    /// Type and source come from the record read before the installer ran
    /// (`preserved`), defaulting to the platform installer. A record the
    /// installer itself wrote afterwards (`reread`) overrides non-empty fields.
    /// The version is always the new one.
    pub fn after_installer(
        preserved: Option<&InstallMeta>,
        reread: Option<&InstallMeta>,
        version: &str,
    ) -> Self {
        let mut meta = match preserved {
            Some(old) => Self::new(old.install_type.clone(), old.source.clone(), version),
            None => Self::new(PLATFORM_INSTALLER_TYPE, PLATFORM_INSTALLER_TYPE, version),
        };
        if let Some(current) = reread {
            if !current.install_type.is_empty() {
                meta.install_type = current.install_type.clone();
            }
            if !current.source.is_empty() {
                meta.source = current.source.clone();
            }
        }
        meta
    }
}
