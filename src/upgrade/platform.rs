//! OS and architecture identifiers used in release asset names.
//!
//! Release assets follow the `tnr_<os>_<arch>.<ext>` convention with Go-style
//! identifiers (`darwin`, `amd64`, `arm64`), so Rust's target names are mapped
//! onto those.

use std::fmt;

/// The platform an update is resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// OS identifier: `linux`, `darwin`, `windows`, ...
    pub os: String,
    /// Architecture identifier: `amd64`, `arm64`, `386`, ...
    pub arch: String,
}

impl Platform {
    /// Platform with explicit identifiers (normalized to lowercase).
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into().to_lowercase(),
            arch: arch.into().to_lowercase(),
        }
    }

    /// Platform of the running binary.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Whether this is a Windows platform.
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Name of the tnr executable on this platform.
    pub fn exe_name(&self) -> &'static str {
        if self.is_windows() { "tnr.exe" } else { "tnr" }
    }

    /// Whether `asset_name` has an archive extension accepted on this platform.
    ///
    /// Windows releases ship `.zip`; everything else ships `.tar.gz` or `.tgz`.
    pub fn accepts_archive(&self, asset_name: &str) -> bool {
        let name = asset_name.to_lowercase();
        if self.is_windows() {
            name.ends_with(".zip")
        } else {
            name.ends_with(".tar.gz") || name.ends_with(".tgz")
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
