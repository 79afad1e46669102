//! `tnr update`: check for and install new releases of tnr.
//!
//! # Examples
//!
//! ```bash
//! tnr update              # install the latest release
//! tnr update v1.4.0       # install a specific release
//! tnr update --check      # query the release feed, bypassing the cache
//! tnr update --status     # show current and latest versions (cached)
//!
//! # install an asset from a mirror, verified against a known digest
//! tnr update v1.4.0 --url https://mirror.example/tnr_1.4.0_linux_amd64.tar.gz \
//!     --sha256 3f2a...
//! ```
//!
//! Package-manager installs are refused with the command to run instead.
//! On Windows a manual install is staged and swapped right away when possible,
//! otherwise on the next launch.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::debug;

use crate::constants::EXPLICIT_UPDATE_TIMEOUT;
use crate::core::{Step, UpdateError, release_error_context};
use crate::upgrade::{
    CheckOutcome, InstallOutcome, SelfUpdater, SkipReason, UpdateChecker, UpdateConfig,
    UpdateReport, UpdateSource, try_finalize_now,
};

/// Arguments of `tnr update`.
#[derive(Args, Debug, Default, Clone)]
pub struct UpdateArgs {
    /// Release to install (e.g. `v1.4.0`); defaults to the latest release.
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    /// Check whether an update is available without installing it.
    #[arg(long, conflicts_with = "status")]
    pub check: bool,

    /// Show the current and latest versions.
    #[arg(short, long)]
    pub status: bool,

    /// Download the release archive from this URL instead of the release feed.
    #[arg(long, value_name = "URL", conflicts_with_all = ["check", "status"])]
    pub url: Option<String>,

    /// Release asset to install instead of the one matching this platform.
    #[arg(long, value_name = "NAME", conflicts_with_all = ["check", "status"])]
    pub asset: Option<String>,

    /// Expected SHA-256 of the release archive.
    #[arg(long, value_name = "DIGEST", conflicts_with_all = ["check", "status"])]
    pub sha256: Option<String>,

    /// Checksum manifest to verify the release archive against.
    #[arg(long, value_name = "URL", conflicts_with_all = ["check", "status"])]
    pub checksums_url: Option<String>,

    /// Expected size of the release archive in bytes.
    #[arg(long, value_name = "BYTES", conflicts_with_all = ["check", "status"])]
    pub size: Option<u64>,
}

impl UpdateArgs {
    fn requested_version(&self) -> Option<&str> {
        self.version.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Applies the asset, digest, manifest and size options to `source`.
    fn refine(&self, mut source: UpdateSource) -> UpdateSource {
        if let Some(name) = &self.asset {
            source = source.with_asset_name(name);
        }
        if let Some(digest) = &self.sha256 {
            source = source.with_checksum(digest);
        }
        if let Some(url) = &self.checksums_url {
            source = source.with_checksum_url(url);
        }
        if let Some(size) = self.size {
            source = source.with_expected_size(size);
        }
        source
    }
}

/// Runs `tnr update` with `config`.
pub async fn execute(args: UpdateArgs, config: UpdateConfig) -> Result<()> {
    if config.disabled {
        return Err(UpdateError::Disabled.into());
    }

    let checker = UpdateChecker::new(&config)?;
    if args.status {
        return show_status(&checker, &config).await;
    }
    if args.check {
        return check_for_updates(&checker, &config).await;
    }

    let source = match (args.url.as_deref(), args.requested_version()) {
        (Some(url), version) => {
            let direct = UpdateSource::direct(url);
            match version {
                Some(version) => direct.with_version(version),
                None => direct,
            }
        }
        (None, Some(version)) => UpdateSource::from_tag(version),
        (None, None) => match latest_if_outdated(&checker, &config).await? {
            Some(latest) => UpdateSource::from_tag(latest),
            None => {
                let message = format!("You are on the latest version ({})", config.current_version);
                println!("{}", message.green());
                return Ok(());
            }
        },
    };

    perform_update(&checker, config, &args.refine(source)).await
}

async fn show_status(checker: &UpdateChecker, config: &UpdateConfig) -> Result<()> {
    let latest = match checker.check(&config.current_version).await {
        Ok(CheckOutcome::Checked(result)) if !result.latest_version.is_empty() => {
            Some(result.latest_version)
        }
        Ok(_) => None,
        Err(e) => {
            debug!("Failed to check for updates: {e}");
            None
        }
    };

    println!("{}", UpdateChecker::format_version_info(&config.current_version, latest.as_deref()));
    Ok(())
}

async fn check_for_updates(checker: &UpdateChecker, config: &UpdateConfig) -> Result<()> {
    println!("{}", "Checking for updates...".cyan());

    match latest_if_outdated(checker, config).await? {
        Some(latest) => {
            let message = format!("Update available: {} -> {latest}", config.current_version);
            println!("{}", message.green());
            println!("Run `tnr update` to install the latest version");
        }
        None => {
            let message = format!("You are on the latest version ({})", config.current_version);
            println!("{}", message.green());
        }
    }
    Ok(())
}

/// Live check; `Some(tag)` when a newer release exists.
async fn latest_if_outdated(checker: &UpdateChecker, config: &UpdateConfig) -> Result<Option<String>> {
    match checker.check_now(&config.current_version).await? {
        CheckOutcome::Skipped {
            reason,
        } => {
            debug!("Update check skipped: {}", reason.as_str());
            Err(skip_error(reason, &config.current_version).into())
        }
        CheckOutcome::Checked(result) if result.outdated => Ok(Some(result.latest_version)),
        CheckOutcome::Checked(_) => Ok(None),
    }
}

fn skip_error(reason: SkipReason, current_version: &str) -> UpdateError {
    match reason {
        SkipReason::DevelopmentBuild => UpdateError::DevelopmentBuild,
        SkipReason::InvalidCurrentVersion => UpdateError::UnreleasedVersion {
            version: current_version.to_string(),
        },
    }
}

/// Tag of the release `source` targets; empty when it is not known.
fn target_tag(source: &UpdateSource) -> String {
    match &source.release_tag {
        Some(tag) => tag.clone(),
        None if !source.version.is_empty() => format!("v{}", source.version),
        None => String::new(),
    }
}

async fn perform_update(checker: &UpdateChecker, config: UpdateConfig, source: &UpdateSource) -> Result<()> {
    let tag = target_tag(source);
    let target = if tag.is_empty() { "the latest version" } else { tag.as_str() };
    println!("{}", format!("Updating tnr to {target}...").cyan());

    let release_page = config.release_page_url(&tag);
    let exe = config.current_exe()?;
    let updater = SelfUpdater::new(config).with_progress(true);
    let attempt = match tokio::time::timeout(EXPLICIT_UPDATE_TIMEOUT, updater.perform_update(source)).await {
        Ok(attempt) => attempt,
        Err(_) => Err(UpdateError::Timeout {
            operation: "update".to_string(),
            seconds: EXPLICIT_UPDATE_TIMEOUT.as_secs(),
        }),
    };
    let report = attempt.map_err(|e| release_error_context(e, &release_page))?;

    if let Err(e) = checker.clear_cache().await {
        debug!("Failed to clear update check cache: {e}");
    }
    report_outcome(&report, || try_finalize_now(&exe));
    Ok(())
}

fn report_outcome(report: &UpdateReport, finalize_now: impl FnOnce() -> bool) {
    if let Step::Degraded {
        reason,
    } = &report.manifest
    {
        println!("{}", format!("Checksum manifest not verified: {reason}").yellow());
    }

    match &report.outcome {
        InstallOutcome::Replaced => {
            println!("{}", format!("Updated tnr to {}", report.version).green());
        }
        InstallOutcome::Staged {
            ..
        } => {
            if finalize_now() {
                println!("{}", format!("Updated tnr to {}", report.version).green());
            } else {
                println!("{}", "The update will be applied the next time tnr starts".yellow());
            }
        }
        InstallOutcome::PlatformInstaller {
            meta,
        } => {
            println!("{}", format!("Installed tnr {} with the platform installer", report.version).green());
            if let Step::Degraded {
                reason,
            } = meta
            {
                println!("{}", format!("Install metadata not updated: {reason}").yellow());
            }
        }
    }
}
