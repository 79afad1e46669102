//! Update orchestration.
//!
//! [`SelfUpdater::perform_update`] runs one complete attempt:
//!
//! ```text
//! detect install kind -> resolve asset -> download -> verify digest
//!   -> verify against manifest -> extract -> locate executable -> install
//! ```
//!
//! Every failure before the install step leaves the installed executable
//! untouched. [`maybe_start_background_update`] is the per-launch entry point
//! that checks the feed (through the cache) and, when a newer release exists,
//! runs an attempt in a detached task.

use std::path::Path;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::{BACKGROUND_UPDATE_TIMEOUT, STARTUP_CHECK_TIMEOUT};
use crate::core::{Result, Step, UpdateError};
use crate::upgrade::archive::{extract, locate_executable};
use crate::upgrade::detect::{InstallKind, detect};
use crate::upgrade::download::Downloader;
use crate::upgrade::feed::ReleaseFeed;
use crate::upgrade::installer::{InstallOutcome, Installer};
use crate::upgrade::resolver::{AssetResolver, ResolvedAsset};
use crate::upgrade::verification::ChecksumVerifier;
use crate::upgrade::{Platform, UpdateChecker, UpdateConfig, UpdateSource};
use crate::utils::fs::{dir_writable, set_executable};

/// Result of a successful update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Version that was installed or staged (without a `v` prefix).
    pub version: String,
    /// What the installer did.
    pub outcome: InstallOutcome,
    /// Whether the archive was checked against a checksum manifest.
    pub manifest: Step<()>,
}

/// Downloads, verifies and installs tnr releases.
///
/// # Examples
///
/// ```rust,no_run
/// use tnr_cli::upgrade::{SelfUpdater, UpdateConfig, UpdateSource};
///
/// # async fn example() -> tnr_cli::core::Result<()> {
/// let updater = SelfUpdater::new(UpdateConfig::from_env()).with_progress(true);
/// let report = updater.perform_update(&UpdateSource::from_tag("v1.2.3")).await?;
/// println!("installed {}", report.version);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SelfUpdater {
    config: UpdateConfig,
    platform: Platform,
    show_progress: bool,
}

impl SelfUpdater {
    /// Creates an updater for the host platform.
    pub fn new(config: UpdateConfig) -> Self {
        Self {
            config,
            platform: Platform::current(),
            show_progress: false,
        }
    }

    /// Selects assets and the install strategy for another platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Shows a download progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Runs one update attempt for `source`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::ManagedInstall`] for package-manager installs
    /// - [`UpdateError::NoMatchingAsset`] / [`UpdateError::FeedUnavailable`] when
    ///   resolution fails
    /// - [`UpdateError::DownloadFailed`], [`UpdateError::ChecksumMismatch`],
    ///   [`UpdateError::ExtractionFailed`], [`UpdateError::ExecutableNotFound`]
    /// - installer errors ([`UpdateError::PermissionDenied`],
    ///   [`UpdateError::ElevationFailed`], [`UpdateError::InstallerFailed`], ...)
    pub async fn perform_update(&self, source: &UpdateSource) -> Result<UpdateReport> {
        let exe = self.config.current_exe()?;
        let kind = detect(&exe, &self.config);
        debug!("Install kind of {}: {kind}", exe.display());
        kind.ensure_self_updatable()?;

        let feed = ReleaseFeed::new(&self.config)?;
        let resolved = AssetResolver::new(feed, self.platform.clone()).resolve(source).await?;
        info!("Updating {} to {} using {}", exe.display(), display_version(&resolved), resolved.asset_name);

        let scratch = tempfile::Builder::new().prefix("tnr-update-").tempdir()?;
        let archive = scratch.path().join(&resolved.asset_name);
        let downloader = Downloader::new(&self.config)?.with_progress(self.show_progress);
        downloader.download(&resolved.download_url, &archive, resolved.expected_size).await?;

        if let Some(expected) = &resolved.expected_checksum {
            ChecksumVerifier::verify_checksum(&archive, expected).await?;
        }
        let manifest = self.verify_manifest(&downloader, &resolved, &archive, scratch.path()).await?;

        let extract_dir = scratch.path().join("extracted");
        let exe_name = self.platform.exe_name();
        let (archive_path, dest) = (archive.clone(), extract_dir.clone());
        let new_binary = tokio::task::spawn_blocking(move || {
            extract(&archive_path, &dest)?;
            let binary = locate_executable(&dest, exe_name)?;
            set_executable(&binary)?;
            Ok::<_, UpdateError>(binary)
        })
        .await
        .map_err(|e| UpdateError::other(format!("Extraction task failed: {e}")))??;

        let outcome = Installer::for_platform(&self.platform, &self.config, kind)
            .with_release(resolved.release.clone())
            .install(&exe, &new_binary, &resolved.version, source)
            .await?;

        Ok(UpdateReport {
            version: resolved.version,
            outcome,
            manifest,
        })
    }

    /// Checks the archive against the checksum manifest, if one is known.
    ///
    /// An unreachable manifest degrades the attempt; a manifest that does not
    /// list the archive's digest aborts it.
    async fn verify_manifest(
        &self,
        downloader: &Downloader,
        resolved: &ResolvedAsset,
        archive: &Path,
        scratch: &Path,
    ) -> Result<Step<()>> {
        let Some(url) = &resolved.checksums_url else {
            debug!("No checksum manifest for {}", resolved.asset_name);
            return Ok(Step::degraded("no checksum manifest published"));
        };

        let manifest_path = scratch.join("checksums.txt");
        if let Err(e) = downloader.download(url, &manifest_path, None).await {
            warn!("Skipping checksum manifest verification: {e}");
            return Ok(Step::degraded(e.to_string()));
        }

        ChecksumVerifier::verify_against_manifest(archive, &manifest_path).await?;
        Ok(Step::Done(()))
    }
}

/// Checks for a newer release and, if there is one, updates in a detached task.
///
/// Called once per launch for every command except `update`. The check is
/// bounded by a short time-out so it never delays the user's command; the
/// update itself runs in the returned task with its own time-out and all of its
/// errors are logged, never surfaced. Returns `None` when nothing was started.
pub async fn maybe_start_background_update(config: &UpdateConfig) -> Option<JoinHandle<()>> {
    if config.disabled {
        debug!("Background update disabled");
        return None;
    }

    let exe = config.current_exe().ok()?;
    let kind = detect(&exe, config);
    if matches!(kind, InstallKind::PackageManager(_)) {
        debug!("Skipping background update for {kind} install");
        return None;
    }

    let platform = Platform::current();
    let needs_sudo = !platform.is_windows() && exe.parent().is_some_and(|dir| !dir_writable(dir));
    if needs_sudo {
        debug!("Skipping background update: {} is not writable", exe.display());
        return None;
    }

    let checker = UpdateChecker::new(config).ok()?;
    let outcome = match tokio::time::timeout(STARTUP_CHECK_TIMEOUT, checker.check(&config.current_version)).await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            debug!("Update check skipped: {e}");
            return None;
        }
        Err(_) => {
            debug!("Update check timed out");
            return None;
        }
    };
    let latest = outcome.outdated()?.latest_version.clone();

    println!("Updating tnr in background to {latest}…");
    let updater = SelfUpdater::new(config.clone()).with_platform(platform);
    Some(tokio::spawn(async move {
        let source = UpdateSource::from_tag(&latest);
        match tokio::time::timeout(BACKGROUND_UPDATE_TIMEOUT, updater.perform_update(&source)).await {
            Ok(Ok(report)) => debug!("Background update to {} finished: {:?}", report.version, report.outcome),
            Ok(Err(e)) => debug!("Background update failed: {e}"),
            Err(_) => debug!("Background update timed out"),
        }
    }))
}

fn display_version(resolved: &ResolvedAsset) -> &str {
    if resolved.version.is_empty() { "the requested build" } else { &resolved.version }
}
