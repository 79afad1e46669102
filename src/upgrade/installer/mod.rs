//! Platform installer.
//!
//! [`Installer`] has one variant per platform family and the same
//! `install(exe, new_binary, version, source)` contract for both, so the
//! update flow never branches on the OS. The variant is chosen from the
//! resolved [`Platform`] at runtime; both compile everywhere.
//!
//! | Platform | Install kind       | Strategy                                        |
//! |----------|--------------------|-------------------------------------------------|
//! | Unix     | manual             | temp copy + rename, `sudo` fallback             |
//! | Windows  | manual             | stage next to the exe, finalize on next launch  |
//! | Windows  | platform installer | run the installer package, rewrite metadata     |
//!
//! Package-manager installs never reach this module.

pub mod unix;
pub mod windows;

use std::path::Path;

use crate::core::{Result, Step};
use crate::upgrade::detect::InstallKind;
use crate::upgrade::feed::Release;
use crate::upgrade::{Platform, UpdateConfig, UpdateSource};

pub use unix::UnixInstaller;
pub use windows::WindowsInstaller;

/// What an install step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The executable was replaced in place.
    Replaced,
    /// A replacement was staged and is applied on the next launch.
    Staged {
        /// Whether staging needed the elevated helper
        elevated: bool,
    },
    /// The platform installer package performed the upgrade.
    PlatformInstaller {
        /// Whether the install metadata could be rewritten afterwards
        meta: Step<()>,
    },
}

/// Installs a verified executable using the platform's strategy.
#[derive(Debug)]
pub enum Installer {
    /// Linux, macOS and other Unix-like systems.
    Unix(UnixInstaller),
    /// Windows.
    Windows(WindowsInstaller),
}

impl Installer {
    /// Selects the installer for `platform` and a detected install kind.
    pub fn for_platform(platform: &Platform, config: &UpdateConfig, kind: InstallKind) -> Self {
        if platform.is_windows() {
            Self::Windows(WindowsInstaller::new(config.clone(), kind, platform.arch.clone()))
        } else {
            Self::Unix(UnixInstaller)
        }
    }

    /// Supplies the release the binary came from; the Windows platform
    /// installer path looks up its package there.
    pub fn with_release(self, release: Option<Release>) -> Self {
        match self {
            Self::Windows(installer) => Self::Windows(installer.with_release(release)),
            unix @ Self::Unix(_) => unix,
        }
    }

    /// Installs `new_binary` as `exe` for `version`.
    ///
    /// On any error before the final rename the installed executable is
    /// untouched.
    pub async fn install(
        &self,
        exe: &Path,
        new_binary: &Path,
        version: &str,
        source: &UpdateSource,
    ) -> Result<InstallOutcome> {
        match self {
            Self::Unix(installer) => installer.install(exe, new_binary, version).await,
            Self::Windows(installer) => installer.install(exe, new_binary, version, source).await,
        }
    }
}
