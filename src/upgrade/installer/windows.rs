//! Windows installation strategies.
//!
//! A running `.exe` cannot be overwritten, so manual installs are staged next
//! to the executable and swapped by the startup finalizer on the next launch.
//! Installs owned by the platform installer are upgraded by running the newer
//! installer package instead of touching its files.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{HELPER_STAGING_DIR, META_READ_ATTEMPTS, META_READ_DELAY};
use crate::core::{Result, Step, UpdateError};
use crate::upgrade::UpdateConfig;
use crate::upgrade::detect::InstallKind;
use crate::upgrade::download::Downloader;
use crate::upgrade::elevation::is_elevated;
use crate::upgrade::feed::Release;
use crate::upgrade::helper::{HelperRequest, run_elevated_helper};
use crate::upgrade::install_meta::InstallMeta;
use crate::upgrade::installer::InstallOutcome;
use crate::upgrade::source::{UpdateSource, strip_v};
use crate::upgrade::staging::{has_staged_update, stage_in_dir};
use crate::utils::fs::{dir_writable, ensure_dir};

/// Installer for Windows hosts.
#[derive(Debug, Clone)]
pub struct WindowsInstaller {
    config: UpdateConfig,
    kind: InstallKind,
    arch: String,
    release: Option<Release>,
}

impl WindowsInstaller {
    /// Creates an installer for a detected install kind and architecture.
    pub fn new(config: UpdateConfig, kind: InstallKind, arch: impl Into<String>) -> Self {
        Self {
            config,
            kind,
            arch: arch.into(),
            release: None,
        }
    }

    /// Release whose assets may contain the installer package.
    pub fn with_release(mut self, release: Option<Release>) -> Self {
        self.release = release;
        self
    }

    /// Stages `new_binary` or runs the platform installer, depending on how
    /// tnr was installed.
    pub async fn install(
        &self,
        exe: &Path,
        new_binary: &Path,
        version: &str,
        source: &UpdateSource,
    ) -> Result<InstallOutcome> {
        match self.kind {
            InstallKind::PlatformInstaller => self.run_platform_installer(version, source).await,
            _ => self.stage(exe, new_binary, version).await,
        }
    }

    async fn stage(&self, exe: &Path, new_binary: &Path, version: &str) -> Result<InstallOutcome> {
        let dir = exe.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        if dir_writable(&dir) || is_elevated() {
            let (target, binary, ver) = (dir.clone(), new_binary.to_path_buf(), version.to_string());
            blocking(move || stage_in_dir(&target, &binary, &ver)).await?;
            println!("Update downloaded; will apply on next run.");
            return Ok(InstallOutcome::Staged {
                elevated: false,
            });
        }

        // The elevated helper reads the binary after this process' scratch
        // directory may be gone, so hand it a copy in a fixed location.
        let handoff_dir = std::env::temp_dir().join(HELPER_STAGING_DIR);
        ensure_dir(&handoff_dir)?;
        let handoff = handoff_dir.join(exe.file_name().unwrap_or_else(|| "tnr.exe".as_ref()));
        std::fs::copy(new_binary, &handoff)?;

        let request = HelperRequest::Stage {
            from: handoff.clone(),
            to: dir.clone(),
            version: version.to_string(),
        };
        let result = blocking(move || run_elevated_helper(request)).await;
        let _ = std::fs::remove_file(&handoff);
        let _ = std::fs::remove_dir(&handoff_dir);
        result?;

        if !has_staged_update(&dir) {
            return Err(UpdateError::other(format!(
                "Elevated helper reported success but nothing was staged in {}",
                dir.display()
            )));
        }
        println!("Update downloaded; will apply on next run after elevation.");
        Ok(InstallOutcome::Staged {
            elevated: true,
        })
    }

    async fn run_platform_installer(&self, version: &str, source: &UpdateSource) -> Result<InstallOutcome> {
        let preserved = InstallMeta::read(&self.config.meta_path);
        let (url, name) = installer_package(
            self.release.as_ref(),
            &self.config,
            version,
            source.release_tag.as_deref(),
            &self.arch,
        )
        .ok_or_else(|| UpdateError::InstallerFailed {
            reason: "unable to determine the installer package for this release".to_string(),
        })?;

        let scratch = tempfile::Builder::new().prefix("tnr-msi-").tempdir()?;
        let package = scratch.path().join(&name);
        Downloader::new(&self.config)?.download(&url, &package, None).await?;

        info!("Running platform installer {name}");
        let status = tokio::process::Command::new("msiexec.exe")
            .arg("/i")
            .arg(&package)
            .args(["/passive", "/norestart"])
            .status()
            .await
            .map_err(|e| UpdateError::InstallerFailed {
                reason: format!("failed to start msiexec: {e}"),
            })?;
        if !status.success() {
            return Err(UpdateError::InstallerFailed {
                reason: format!("msiexec exited with {status}"),
            });
        }

        let meta = self.rewrite_meta(preserved.as_ref(), version).await;
        println!("Platform installer upgrade completed. Please re-run your command.");
        Ok(InstallOutcome::PlatformInstaller {
            meta,
        })
    }

    /// Rewrites install metadata after the installer ran, keeping the original
    /// install type and source.
    async fn rewrite_meta(&self, preserved: Option<&InstallMeta>, version: &str) -> Step<()> {
        let path = self.config.meta_path.clone();

        let mut reread = None;
        for attempt in 0..META_READ_ATTEMPTS {
            reread = InstallMeta::read(&path);
            if reread.is_some() {
                break;
            }
            if attempt + 1 < META_READ_ATTEMPTS {
                tokio::time::sleep(META_READ_DELAY).await;
            }
        }

        let meta = InstallMeta::after_installer(preserved, reread.as_ref(), version);
        match self.write_meta(&meta, path).await {
            Ok(()) => {
                debug!("Install metadata updated to version {}", meta.version);
                Step::Done(())
            }
            Err(e) => {
                warn!("Could not update install metadata: {e}");
                Step::degraded(e.to_string())
            }
        }
    }

    async fn write_meta(&self, meta: &InstallMeta, path: PathBuf) -> Result<()> {
        let dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let _ = ensure_dir(&dir);

        if dir_writable(&dir) || is_elevated() {
            return meta.write(&path);
        }

        let document = tempfile::Builder::new().prefix("tnr-meta-").suffix(".json").tempfile()?;
        std::fs::write(document.path(), meta.to_json()?)?;
        let request = HelperRequest::UpdateMeta {
            from: document.path().to_path_buf(),
            to: path,
        };
        blocking(move || run_elevated_helper(request)).await
    }
}

/// Installer package URL and file name for `version`.
///
/// Prefers a `.msi` asset of the release built for `arch`; otherwise builds the
/// conventional download URL `…/releases/download/<tag>/tnr-<version>-<arch>.msi`.
/// Returns `None` when no version is known.
pub fn installer_package(
    release: Option<&Release>,
    config: &UpdateConfig,
    version: &str,
    tag: Option<&str>,
    arch: &str,
) -> Option<(String, String)> {
    let from_release = release.and_then(|release| {
        release.assets.iter().find(|asset| {
            let name = asset.name.to_lowercase();
            name.ends_with(".msi") && name.contains(arch)
        })
    });
    if let Some(asset) = from_release {
        return Some((asset.download_url.clone(), asset.name.clone()));
    }

    let version = strip_v(version.trim());
    if version.is_empty() {
        return None;
    }
    let tag = tag.map(str::trim).filter(|t| !t.is_empty()).map_or_else(|| format!("v{version}"), str::to_string);
    let name = format!("tnr-{version}-{arch}.msi");
    let url = format!("{}/{}/releases/download/{tag}/{name}", config.download_base_url, config.repo);
    Some((url, name))
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| UpdateError::other(format!("Install task failed: {e}")))?
}
