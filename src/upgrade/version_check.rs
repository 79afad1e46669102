use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::constants::DEV_VERSION;
use crate::core::{Result, Step};
use crate::upgrade::version::{is_outdated, parse_version};
use crate::upgrade::{ReleaseFeed, UpdateConfig};

/// Persisted result of the last live feed query.
///
/// Stored as `{"checked_at": ..., "latest_version": ...}` in `latest.json` under the
/// cache directory. Overwritten after every successful live query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCheckResult {
    /// UTC timestamp of the live query.
    pub checked_at: DateTime<Utc>,
    /// Tag reported by the feed at that time.
    pub latest_version: String,
}

impl CachedCheckResult {
    /// Create a new cache entry stamped with the current time.
    pub fn new(latest_version: impl Into<String>) -> Self {
        Self {
            checked_at: Utc::now(),
            latest_version: latest_version.into(),
        }
    }

    /// Whether this entry is younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now() - self.checked_at;
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age < ttl,
            Err(_) => true,
        }
    }
}

/// Why a check did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Empty or `dev` version string.
    DevelopmentBuild,
    /// The running version cannot be parsed.
    InvalidCurrentVersion,
}

impl SkipReason {
    /// Stable identifier used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DevelopmentBuild => "development-build",
            Self::InvalidCurrentVersion => "invalid-current-version",
        }
    }
}

/// Result of a completed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Version of the running binary.
    pub current_version: String,
    /// Latest tag known to the feed; empty if the feed reported none.
    pub latest_version: String,
    /// Whether `current_version` is older than `latest_version`.
    pub outdated: bool,
    /// Whether the answer came from the cache.
    pub from_cache: bool,
    /// When the answer was fetched from the feed.
    pub checked_at: DateTime<Utc>,
}

/// Outcome of [`UpdateChecker::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The check did not run; builds like this never self-update.
    Skipped {
        /// Why the check was skipped
        reason: SkipReason,
    },
    /// The check ran (live or from cache).
    Checked(CheckResult),
}

impl CheckOutcome {
    /// The check result if the build is eligible and a newer release exists.
    pub fn outdated(&self) -> Option<&CheckResult> {
        match self {
            Self::Checked(result) if result.outdated => Some(result),
            _ => None,
        }
    }
}

/// Update check with on-disk memoization.
///
/// A live feed query happens at most once per TTL window (24 hours by default);
/// in between, the cached tag is compared against the running version. Cache
/// writes are best-effort: a read-only cache directory only costs an extra
/// request on the next run.
///
/// # Examples
///
/// ```rust,no_run
/// use tnr_cli::upgrade::{UpdateChecker, UpdateConfig};
///
/// # async fn example() -> tnr_cli::core::Result<()> {
/// let config = UpdateConfig::from_env();
/// let checker = UpdateChecker::new(&config)?;
/// if let Some(result) = checker.check(&config.current_version).await?.outdated() {
///     println!("tnr {} is available", result.latest_version);
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpdateChecker {
    cache_path: PathBuf,
    ttl: Duration,
    feed: ReleaseFeed,
}

impl UpdateChecker {
    /// Create a checker backed by the feed and cache location of `config`.
    pub fn new(config: &UpdateConfig) -> Result<Self> {
        Ok(Self {
            cache_path: config.cache_file(),
            ttl: config.check_ttl,
            feed: ReleaseFeed::new(config)?,
        })
    }

    /// Path of the cache file.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Checks whether a newer release exists, consulting the cache first.
    ///
    /// Skips without touching the network when `current_version` is empty, `dev`
    /// (any case) or unparsable.
    ///
    /// # Errors
    ///
    /// [`UpdateError::FeedUnavailable`](crate::core::UpdateError::FeedUnavailable)
    /// when a live query was needed and failed.
    pub async fn check(&self, current_version: &str) -> Result<CheckOutcome> {
        let current = current_version.trim();
        if let Some(reason) = skip_reason(current) {
            debug!("Skipping update check: {}", reason.as_str());
            return Ok(CheckOutcome::Skipped {
                reason,
            });
        }

        if let Some(cached) = self.load_cache().await
            && cached.is_fresh(self.ttl)
        {
            debug!("Using cached update check from {}", cached.checked_at);
            return Ok(CheckOutcome::Checked(CheckResult {
                current_version: current.to_string(),
                outdated: is_outdated(current, &cached.latest_version),
                latest_version: cached.latest_version,
                from_cache: true,
                checked_at: cached.checked_at,
            }));
        }

        self.check_live(current).await
    }

    /// Queries the feed regardless of the cache, then refreshes the cache.
    pub async fn check_now(&self, current_version: &str) -> Result<CheckOutcome> {
        let current = current_version.trim();
        if let Some(reason) = skip_reason(current) {
            return Ok(CheckOutcome::Skipped {
                reason,
            });
        }
        self.check_live(current).await
    }

    async fn check_live(&self, current: &str) -> Result<CheckOutcome> {
        let latest = self.feed.latest_tag().await?.unwrap_or_default();
        let entry = CachedCheckResult::new(latest.clone());

        if !latest.is_empty()
            && let Step::Degraded {
                reason,
            } = self.save_cache(&entry).await
        {
            debug!("Update check cache not written: {reason}");
        }

        Ok(CheckOutcome::Checked(CheckResult {
            current_version: current.to_string(),
            outdated: is_outdated(current, &latest),
            latest_version: latest,
            from_cache: false,
            checked_at: entry.checked_at,
        }))
    }

    /// Loads the cache; a missing or corrupt file reads as "no cache".
    pub async fn load_cache(&self) -> Option<CachedCheckResult> {
        let content = match fs::read_to_string(&self.cache_path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No update check cache at {}: {e}", self.cache_path.display());
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                debug!("Ignoring unreadable update check cache: {e}");
                None
            }
        }
    }

    /// Saves the cache. Failures are reported as a soft failure.
    pub async fn save_cache(&self, cache: &CachedCheckResult) -> Step<()> {
        let content = match serde_json::to_vec(cache) {
            Ok(content) => content,
            Err(e) => return Step::degraded(format!("serialize failed: {e}")),
        };

        let path = self.cache_path.clone();
        let written =
            tokio::task::spawn_blocking(move || crate::utils::fs::atomic_write(&path, &content))
                .await;

        match written {
            Ok(Ok(())) => {
                debug!("Saved update check to cache");
                Step::Done(())
            }
            Ok(Err(e)) => Step::degraded(format!("{}: {e}", self.cache_path.display())),
            Err(e) => Step::degraded(format!("cache writer panicked: {e}")),
        }
    }

    /// Removes the cache file, forcing the next check to go to the feed.
    pub async fn clear_cache(&self) -> Result<()> {
        match fs::remove_file(&self.cache_path).await {
            Ok(()) => {
                debug!("Cleared update check cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Format version information for status display.
    pub fn format_version_info(current: &str, latest: Option<&str>) -> String {
        match latest {
            Some(latest) if is_outdated(current, latest) => {
                format!("Current version: {current}\nLatest version:  {latest} (update available)")
            }
            _ => format!("Current version: {current} (up to date)"),
        }
    }
}

fn skip_reason(current: &str) -> Option<SkipReason> {
    if current.is_empty() || current.eq_ignore_ascii_case(DEV_VERSION) {
        Some(SkipReason::DevelopmentBuild)
    } else if parse_version(current).is_none() {
        Some(SkipReason::InvalidCurrentVersion)
    } else {
        None
    }
}
