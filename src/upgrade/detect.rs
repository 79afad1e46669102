//! Install-type detection.
//!
//! Decides how the running installation must be upgraded:
//!
//! 1. A path below a known package-manager root is [`InstallKind::PackageManager`]
//!    and is never modified by tnr itself.
//! 2. Otherwise a type declared in [`InstallMeta`] is trusted.
//! 3. Otherwise, on Windows, the install directory recorded by the platform
//!    installer in the registry is compared with the executable's directory.
//! 4. Anything else is a manual install.
//!
//! The package-manager check is a path heuristic. It recognizes the standard
//! layouts and nothing more; unusual prefixes fall through to the next rule.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::{Result, UpdateError};
use crate::upgrade::UpdateConfig;
use crate::upgrade::install_meta::{InstallMeta, PLATFORM_INSTALLER_TYPE};

#[cfg(windows)]
const REGISTRY_KEY: &str = r"Software\Thunder Compute\tnr";
#[cfg(windows)]
const REGISTRY_VALUE: &str = "InstallDir";

/// Package managers that own a tnr installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    /// Homebrew on macOS or Linux.
    Homebrew,
    /// Scoop on Windows.
    Scoop,
    /// winget (Microsoft Store / `WindowsApps`).
    Winget,
}

impl PackageManager {
    /// Identifies the manager owning `path` from well-known install roots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tnr_cli::upgrade::detect::PackageManager;
    /// use std::path::Path;
    ///
    /// let path = Path::new("/opt/homebrew/Cellar/tnr/1.0.0/bin/tnr");
    /// assert_eq!(PackageManager::from_path(path), Some(PackageManager::Homebrew));
    /// assert_eq!(PackageManager::from_path(Path::new("/usr/local/bin/tnr")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        let lowered = path.to_string_lossy().to_lowercase();
        if lowered.contains("/opt/homebrew/") || lowered.contains("/usr/local/cellar/") {
            Some(Self::Homebrew)
        } else if lowered.contains(r"\scoop\apps\") {
            Some(Self::Scoop)
        } else if lowered.contains("windowsapps") {
            Some(Self::Winget)
        } else {
            None
        }
    }

    fn from_install_type(kind: &str) -> Option<Self> {
        match kind {
            "homebrew" | "brew" => Some(Self::Homebrew),
            "scoop" => Some(Self::Scoop),
            "winget" => Some(Self::Winget),
            _ => None,
        }
    }

    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Homebrew => "Homebrew",
            Self::Scoop => "Scoop",
            Self::Winget => "winget",
        }
    }

    /// Command that upgrades tnr through this manager.
    pub const fn upgrade_command(self) -> &'static str {
        match self {
            Self::Homebrew => "brew upgrade tnr",
            Self::Scoop => "scoop update tnr",
            Self::Winget => "winget upgrade Thunder.tnr",
        }
    }
}

/// How the running installation is upgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallKind {
    /// Placed by hand or by an install script; tnr replaces the file itself.
    Manual,
    /// Installed by the platform installer package, which performs upgrades.
    PlatformInstaller,
    /// Owned by a package manager; self-update is refused.
    PackageManager(PackageManager),
}

impl InstallKind {
    /// Maps a declared install type onto a kind. Unknown types are manual.
    pub fn from_declared(kind: &str) -> Self {
        let kind = kind.trim().to_lowercase();
        if kind == PLATFORM_INSTALLER_TYPE {
            return Self::PlatformInstaller;
        }
        PackageManager::from_install_type(&kind).map_or(Self::Manual, Self::PackageManager)
    }

    /// Fails with [`UpdateError::ManagedInstall`] for package-manager installs.
    pub fn ensure_self_updatable(self) -> Result<()> {
        match self {
            Self::PackageManager(manager) => Err(UpdateError::ManagedInstall {
                manager: manager.name().to_string(),
                command: manager.upgrade_command().to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for InstallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::PlatformInstaller => f.write_str("platform installer"),
            Self::PackageManager(manager) => write!(f, "{} package", manager.name()),
        }
    }
}

/// Classifies an installation from already-gathered facts.
///
/// `registry_dir` is the install directory recorded by the platform installer,
/// if any.
pub fn classify(exe: &Path, meta: Option<&InstallMeta>, registry_dir: Option<&Path>) -> InstallKind {
    if let Some(manager) = PackageManager::from_path(exe) {
        return InstallKind::PackageManager(manager);
    }

    if let Some(declared) = meta.and_then(InstallMeta::declared_type) {
        return InstallKind::from_declared(&declared);
    }

    if let Some(recorded) = registry_dir
        && installed_in(exe, recorded)
    {
        return InstallKind::PlatformInstaller;
    }

    InstallKind::Manual
}

/// Detects the install kind of `exe`, reading metadata and probing the registry.
pub fn detect(exe: &Path, config: &UpdateConfig) -> InstallKind {
    if let Some(manager) = PackageManager::from_path(exe) {
        return InstallKind::PackageManager(manager);
    }

    let meta = InstallMeta::load_for(exe, &config.meta_path);
    let registry_dir = if meta.is_none() { registry_install_dir() } else { None };

    let kind = classify(exe, meta.as_ref(), registry_dir.as_deref());
    debug!("Detected {kind} install for {}", exe.display());
    kind
}

/// Whether `exe` sits directly in `dir`, compared case-insensitively and
/// ignoring trailing separators.
fn installed_in(exe: &Path, dir: &Path) -> bool {
    normalize_dir(dir) == exe_dir(exe)
}

fn normalize_dir(path: &Path) -> String {
    let text = path.to_string_lossy().replace('/', "\\").to_lowercase();
    text.trim_end_matches(['\\', ' ']).to_string()
}

// Split on both separators so Windows paths compare correctly on any host.
fn exe_dir(exe: &Path) -> String {
    let text = normalize_dir(exe);
    text.rsplit_once('\\').map(|(dir, _)| dir.to_string()).unwrap_or_default()
}

/// Install directory the platform installer recorded under
/// `HKLM\Software\Thunder Compute\tnr`.
#[cfg(windows)]
fn registry_install_dir() -> Option<PathBuf> {
    use winreg::RegKey;
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ};

    let key = RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey_with_flags(REGISTRY_KEY, KEY_READ)
        .map_err(|e| debug!("Registry key not readable: {e}"))
        .ok()?;
    let dir: String = key.get_value(REGISTRY_VALUE).ok()?;
    let dir = dir.trim();
    (!dir.is_empty()).then(|| PathBuf::from(dir))
}

#[cfg(not(windows))]
fn registry_install_dir() -> Option<PathBuf> {
    None
}
