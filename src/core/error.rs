//! Error handling for tnr
//!
//! This module provides the typed errors raised by the self-update engine and the
//! user-friendly rendering used by the CLI. The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can decide whether a failure is skippable,
//!    aborts only the update attempt, or happened mid-swap
//! 2. **User-friendly messages** with actionable suggestions for explicit `tnr update` runs
//!
//! # Error Tiers
//!
//! Update failures fall into four tiers:
//! - **Skippable**: no feed reachable, development build, self-update disabled. The
//!   user's command continues silently ([`UpdateError::is_skippable`]).
//! - **Soft-fail**: optional safeguards that could not run (cache write, checksum
//!   manifest fetch). These never surface as errors; the step reports
//!   [`Step::Degraded`] and the flow continues.
//! - **Fatal-to-update-only**: checksum mismatch, extraction failure, no matching
//!   asset, managed install, elevation declined. The attempt is aborted and the
//!   installed binary is untouched.
//! - **Unrecoverable-mid-swap**: [`UpdateError::SwapFailed`] with `rolled_back: false`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tnr_cli::core::{UpdateError, user_friendly_error};
//!
//! let err = UpdateError::ManagedInstall {
//!     manager: "Homebrew".to_string(),
//!     command: "brew upgrade tnr".to_string(),
//! };
//! user_friendly_error(anyhow::Error::from(err)).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::constants::{DEFAULT_DOWNLOAD_BASE_URL, RELEASE_REPO};

/// Result alias used throughout the update engine.
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Errors raised while checking for, downloading, or installing an update.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The release feed could not be reached or answered with a non-200 status.
    ///
    /// Callers treat this as "skip this check", never as a fatal error.
    #[error("Release feed unavailable: {reason}")]
    FeedUnavailable {
        /// Transport error or HTTP status description
        reason: String,
    },

    /// No release asset matches the current OS, architecture and archive format.
    #[error("No release asset found for {os}/{arch}")]
    NoMatchingAsset {
        /// Operating system identifier (e.g. "linux")
        os: String,
        /// Architecture identifier (e.g. "amd64")
        arch: String,
    },

    /// Downloading an asset failed.
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// URL that was requested
        url: String,
        /// Transport error, HTTP status, or size mismatch
        reason: String,
    },

    /// The downloaded file does not match its published digest.
    #[error("Checksum verification failed for {file}")]
    ChecksumMismatch {
        /// Name of the file that failed verification
        file: String,
        /// Expected digest, or a description of the manifest that was searched
        expected: String,
        /// Digest computed from the downloaded file
        actual: String,
    },

    /// The downloaded archive could not be unpacked.
    #[error("Failed to extract {archive}: {reason}")]
    ExtractionFailed {
        /// Archive file name
        archive: String,
        /// Decoder or filesystem error
        reason: String,
    },

    /// The extracted archive does not contain the tnr executable.
    #[error("Executable '{name}' not found in {dir}")]
    ExecutableNotFound {
        /// Executable file name that was searched for
        name: String,
        /// Directory that was searched
        dir: String,
    },

    /// The installation is owned by a package manager and must be upgraded through it.
    #[error("tnr is managed by {manager}; self-update is disabled for this installation")]
    ManagedInstall {
        /// Package manager name
        manager: String,
        /// Command that upgrades tnr through the package manager
        command: String,
    },

    /// The current user may not replace the executable and elevation was not possible.
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was attempted
        operation: String,
        /// Path that could not be written
        path: String,
    },

    /// The privilege elevation prompt was declined or could not be shown.
    #[error("Elevation failed: {reason}")]
    ElevationFailed {
        /// Why elevation did not happen
        reason: String,
    },

    /// A relaunched helper process exited with a failure status.
    #[error("Update helper failed during {operation} (exit code {exit_code})")]
    HelperFailed {
        /// Helper operation ("stage", "finalize", "update-meta")
        operation: String,
        /// Process exit code
        exit_code: i32,
        /// Tail of the helper's log file, if any
        details: String,
    },

    /// Replacing the executable failed during finalize.
    ///
    /// When `rolled_back` is false the previous executable could not be restored;
    /// this is the single state the engine cannot fully protect against.
    #[error("Failed to swap executable {path}: {reason}")]
    SwapFailed {
        /// Executable path being replaced
        path: String,
        /// Underlying rename error
        reason: String,
        /// Whether the previous executable is in place (untouched or restored)
        rolled_back: bool,
    },

    /// The platform installer package failed.
    #[error("Platform installer failed: {reason}")]
    InstallerFailed {
        /// Installer exit status or launch error
        reason: String,
    },

    /// The internal helper was invoked with arguments it does not understand.
    #[error("Invalid update helper arguments: {reason}")]
    InvalidHelperArgs {
        /// What was wrong with the arguments
        reason: String,
    },

    /// Development builds never self-update.
    #[error("Development builds cannot self-update")]
    DevelopmentBuild,

    /// The running version is not a release version (e.g. `nightly`).
    #[error("tnr {version} is not a release version and cannot self-update")]
    UnreleasedVersion {
        /// Version string of the running binary
        version: String,
    },

    /// Self-update was disabled through the environment.
    #[error("Self-update is disabled (TNR_NO_SELFUPDATE is set)")]
    Disabled,

    /// An update step did not finish within its time box.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Time box in seconds
        seconds: u64,
    },

    /// Filesystem error without more specific context.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other failure.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl Clone for UpdateError {
    fn clone(&self) -> Self {
        match self {
            Self::FeedUnavailable {
                reason,
            } => Self::FeedUnavailable {
                reason: reason.clone(),
            },
            Self::NoMatchingAsset {
                os,
                arch,
            } => Self::NoMatchingAsset {
                os: os.clone(),
                arch: arch.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::ChecksumMismatch {
                file,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                file: file.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::ExtractionFailed {
                archive,
                reason,
            } => Self::ExtractionFailed {
                archive: archive.clone(),
                reason: reason.clone(),
            },
            Self::ExecutableNotFound {
                name,
                dir,
            } => Self::ExecutableNotFound {
                name: name.clone(),
                dir: dir.clone(),
            },
            Self::ManagedInstall {
                manager,
                command,
            } => Self::ManagedInstall {
                manager: manager.clone(),
                command: command.clone(),
            },
            Self::PermissionDenied {
                operation,
                path,
            } => Self::PermissionDenied {
                operation: operation.clone(),
                path: path.clone(),
            },
            Self::ElevationFailed {
                reason,
            } => Self::ElevationFailed {
                reason: reason.clone(),
            },
            Self::HelperFailed {
                operation,
                exit_code,
                details,
            } => Self::HelperFailed {
                operation: operation.clone(),
                exit_code: *exit_code,
                details: details.clone(),
            },
            Self::SwapFailed {
                path,
                reason,
                rolled_back,
            } => Self::SwapFailed {
                path: path.clone(),
                reason: reason.clone(),
                rolled_back: *rolled_back,
            },
            Self::InstallerFailed {
                reason,
            } => Self::InstallerFailed {
                reason: reason.clone(),
            },
            Self::InvalidHelperArgs {
                reason,
            } => Self::InvalidHelperArgs {
                reason: reason.clone(),
            },
            Self::DevelopmentBuild => Self::DevelopmentBuild,
            Self::UnreleasedVersion {
                version,
            } => Self::UnreleasedVersion {
                version: version.clone(),
            },
            Self::Disabled => Self::Disabled,
            Self::Timeout {
                operation,
                seconds,
            } => Self::Timeout {
                operation: operation.clone(),
                seconds: *seconds,
            },
            // io::Error is not Clone; keep the kind and message
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

impl UpdateError {
    /// Returns `true` for failures that should let the user's command continue
    /// silently: no reachable feed, a development or unreleased build, disabled
    /// self-update, or an exhausted time box.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::FeedUnavailable { .. }
                | Self::DevelopmentBuild
                | Self::UnreleasedVersion { .. }
                | Self::Disabled
                | Self::Timeout { .. }
        )
    }

    /// Builds an [`UpdateError::Other`] from any displayable message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other {
            message: format!("Invalid JSON: {err}"),
        }
    }
}

/// Outcome of an update step whose failure must not abort the flow.
///
/// Hard failures are carried by the surrounding [`Result`]; `Step` only separates a
/// completed step from a soft failure that the caller continues past, so soft
/// failures are visible in the type instead of being dropped on the floor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Step<T> {
    /// The step completed.
    Done(T),
    /// The step could not run; the flow continues without its safeguard.
    Degraded {
        /// Why the step was skipped
        reason: String,
    },
}

impl<T> Step<T> {
    /// Creates a [`Step::Degraded`] value.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the step soft-failed.
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Converts into the completed value, discarding the soft-failure reason.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Degraded {
                ..
            } => None,
        }
    }
}

/// Error wrapper that adds user-friendly details and suggestions.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying update error
    pub error: UpdateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error. Displayed in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error. Displayed in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Latest-release page, used when the failing release is not known.
pub fn manual_download_url() -> String {
    format!("{DEFAULT_DOWNLOAD_BASE_URL}/{RELEASE_REPO}/releases/latest")
}

/// Builds the [`ErrorContext`] for a failed attempt to install a known release.
///
/// Manual-download suggestions point at `release_page` instead of the latest
/// release.
pub fn release_error_context(error: UpdateError, release_page: &str) -> ErrorContext {
    create_error_context(error, release_page)
}

/// Convert any error into an [`ErrorContext`] with suggestions.
///
/// An [`ErrorContext`] already attached by the caller is returned as is.
/// [`UpdateError`]s (directly or anywhere in the `anyhow` chain) get tailored
/// suggestions; IO permission errors are mapped to [`UpdateError::PermissionDenied`];
/// everything else is wrapped as [`UpdateError::Other`] with the full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<ErrorContext>() {
        Ok(context) => return context,
        Err(error) => error,
    };

    if let Some(update_error) = error.chain().find_map(|e| e.downcast_ref::<UpdateError>()) {
        return create_error_context(update_error.clone(), &manual_download_url());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpdateError::PermissionDenied {
            operation: "file access".to_string(),
            path: "unknown".to_string(),
        })
        .with_suggestion(
            "Try running with elevated permissions (sudo/Administrator) or check file ownership",
        );
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdateError::Other {
        message,
    })
}

fn create_error_context(error: UpdateError, manual: &str) -> ErrorContext {
    match &error {
        UpdateError::ManagedInstall {
            command,
            ..
        } => {
            let suggestion = format!("Upgrade with your package manager: {command}");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        UpdateError::FeedUnavailable {
            ..
        } => ErrorContext::new(error)
            .with_details("The GitHub releases API could not be reached")
            .with_suggestion(
                "Check your network connection; if you are rate limited, set TNR_GITHUB_TOKEN",
            ),
        UpdateError::ChecksumMismatch {
            expected,
            actual,
            ..
        } => {
            let details = format!("expected {expected}, got {actual}; nothing was installed");
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion(format!("Download the release manually from {manual}"))
        }
        UpdateError::PermissionDenied {
            path,
            ..
        } => {
            let details = format!("{path} is not writable by the current user");
            ErrorContext::new(error).with_details(details).with_suggestion(
                "Re-run the update from an elevated shell (sudo/Administrator)",
            )
        }
        UpdateError::ElevationFailed {
            ..
        } => ErrorContext::new(error)
            .with_details("The existing tnr installation was left untouched")
            .with_suggestion("Accept the elevation prompt, or re-run from an elevated shell"),
        UpdateError::HelperFailed {
            details,
            ..
        } if !details.is_empty() => {
            let details = details.clone();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion(format!("Download the release manually from {manual}"))
        }
        UpdateError::SwapFailed {
            rolled_back: false,
            ..
        } => ErrorContext::new(error)
            .with_details("The previous executable could not be restored")
            .with_suggestion(format!("Reinstall tnr from {manual}")),
        UpdateError::DevelopmentBuild => ErrorContext::new(error)
            .with_suggestion("Install a release build to enable self-update"),
        UpdateError::UnreleasedVersion {
            ..
        } => ErrorContext::new(error)
            .with_details("Only vMAJOR.MINOR.PATCH release builds can be compared against the feed")
            .with_suggestion(format!("Install a release build from {manual}")),
        UpdateError::Disabled => ErrorContext::new(error)
            .with_suggestion("Unset TNR_NO_SELFUPDATE to enable self-update"),
        _ => ErrorContext::new(error)
            .with_suggestion(format!("Download the release manually from {manual}")),
    }
}
