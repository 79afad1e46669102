//! Global constants used throughout the tnr codebase.
//!
//! This module contains timeout durations, retry parameters, file names and
//! environment variable names used by the self-update engine. Defining them
//! centrally keeps the on-disk and process-boundary contracts in one place.

use std::time::Duration;

/// GitHub repository that publishes tnr releases (`owner/name`).
pub const RELEASE_REPO: &str = "Thunder-Compute/thunder-cli";

/// Base URL of the release feed API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Base URL used to build direct download links (platform installer packages,
/// manual download pages).
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://github.com";

/// User agent sent with every feed and download request.
pub const USER_AGENT: &str = concat!("tnr-cli/", env!("CARGO_PKG_VERSION"));

/// Version string reported by development builds. These never self-update.
pub const DEV_VERSION: &str = "dev";

/// Set to `1` to disable the background check-and-upgrade task.
pub const ENV_NO_SELFUPDATE: &str = "TNR_NO_SELFUPDATE";

/// Bearer token attached to all feed and download requests.
pub const ENV_GITHUB_TOKEN: &str = "TNR_GITHUB_TOKEN";

/// Relocates the update check cache directory.
pub const ENV_UPDATE_CACHE_DIR: &str = "TNR_UPDATE_CACHE_DIR";

/// Overrides the release feed base URL (mirrors, tests).
pub const ENV_UPDATE_API_URL: &str = "TNR_UPDATE_API_URL";

/// Overrides the install metadata file location.
pub const ENV_INSTALL_META: &str = "TNR_INSTALL_META";

/// Disables progress bars when set to any value.
pub const ENV_NO_PROGRESS: &str = "TNR_NO_PROGRESS";

/// Time-box for a single release feed request (20 seconds).
pub const FEED_TIMEOUT: Duration = Duration::from_secs(20);

/// Time-box for the update check performed at startup (2 seconds).
///
/// The check runs before the user's command is dispatched, so it must stay
/// short even when the network is slow.
pub const STARTUP_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on the whole background download-and-install task (2 minutes).
pub const BACKGROUND_UPDATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Bound on an explicit `tnr update` run (5 minutes).
pub const EXPLICIT_UPDATE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long a cached check result stays fresh (24 hours).
pub const CHECK_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Number of attempts made to delete the backup executable after a swap.
pub const BACKUP_REMOVE_ATTEMPTS: u32 = 3;

/// Starting delay for backup removal retries (100ms, doubled per attempt).
pub const BACKUP_REMOVE_BASE_DELAY_MS: u64 = 100;

/// Maximum delay between backup removal retries.
pub const BACKUP_REMOVE_MAX_DELAY_MS: u64 = 400;

/// Number of times install metadata is re-read after a platform installer run.
pub const META_READ_ATTEMPTS: u32 = 5;

/// Pause between install metadata re-reads.
pub const META_READ_DELAY: Duration = Duration::from_secs(1);

/// File name of the update check cache inside the cache directory.
pub const CHECK_CACHE_FILE: &str = "latest.json";

/// File name of the persisted install metadata.
pub const INSTALL_META_FILE: &str = "install-meta.json";

/// Sibling file holding a staged replacement executable.
pub const STAGED_BINARY_NAME: &str = "tnr.new";

/// Marker file recording the version of a staged update.
pub const STAGED_MARKER_NAME: &str = ".tnr-update";

/// Sibling file holding the previous executable during a swap.
pub const BACKUP_BINARY_NAME: &str = "tnr.old";

/// Probe file used to test whether a directory is writable.
pub const WRITE_PROBE_NAME: &str = ".tnr-write-test";

/// Reserved first argument routing execution into the internal helper.
pub const HELPER_FLAG: &str = "--tnr-internal-update-helper";

/// Directory (under the system temp dir) holding the binary handed to the
/// elevated staging helper.
pub const HELPER_STAGING_DIR: &str = "tnr-update-binary";
