//! Self-update engine for tnr.
//!
//! The engine decides whether a newer release exists, fetches the archive for
//! the current platform, verifies it, and replaces the running executable
//! without ever leaving the installation in a non-executable state.
//!
//! # Entry points
//!
//! The CLI needs exactly two things from this module:
//!
//! - [`finalize_at_startup`]: called first thing on every launch; completes a
//!   staged update (cheap no-op otherwise)
//! - [`maybe_start_background_update`]: called once per launch; checks the
//!   feed through a 24-hour cache and updates in a detached task
//!
//! `tnr update` drives [`SelfUpdater`] and [`UpdateChecker`] directly.
//!
//! # Update flow
//!
//! ```text
//! 1. Check
//!    ├── cached result younger than 24h?  -> use it
//!    └── otherwise query the release feed and refresh the cache
//!
//! 2. Resolve and fetch
//!    ├── pick the archive for this OS/arch (and the checksum manifest)
//!    ├── stream it to a scratch directory
//!    └── verify the SHA-256 digest (fatal on mismatch)
//!
//! 3. Extract and locate the executable
//!
//! 4. Install (by install kind)
//!    ├── package manager    -> refused, user runs brew/scoop/winget
//!    ├── Unix manual        -> copy + rename over the executable (sudo fallback)
//!    ├── Windows manual     -> stage tnr.new, swap on next launch
//!    └── Windows installer  -> run the installer package, rewrite metadata
//! ```
//!
//! # Error tiers
//!
//! - **Skippable**: offline, development build, already current. The user's
//!   command runs as if nothing happened.
//! - **Soft-fail**: cache write or checksum manifest fetch failed; reported as
//!   [`Step::Degraded`](crate::core::Step) and the flow continues.
//! - **Fatal to the update**: checksum mismatch, extraction failure, no matching
//!   asset, managed install, elevation declined. The installed executable is
//!   untouched.
//! - **Mid-swap**: a failed rename during finalize rolls back to the backup.
//!
//! # Privileged helper
//!
//! On Windows, directories under `Program Files` need elevation. The engine
//! relaunches its own executable through UAC with a reserved first argument
//! ([`HELPER_FLAG`](crate::constants::HELPER_FLAG)); [`maybe_run_helper`] routes
//! such invocations to one narrow file operation before normal CLI parsing.

pub mod archive;
pub mod config;
pub mod detect;
pub mod download;
pub mod elevation;
pub mod feed;
pub mod finalize;
pub mod helper;
pub mod install_meta;
pub mod installer;
pub mod platform;
pub mod resolver;
pub mod self_updater;
pub mod source;
pub mod staging;
pub mod verification;
pub mod version;
pub mod version_check;

pub use config::{UpdateConfig, build_version};
pub use detect::{InstallKind, PackageManager, detect};
pub use feed::{Release, ReleaseAsset, ReleaseFeed};
pub use finalize::{finalize_at_startup, finalize_pending_update, try_finalize_now};
pub use helper::maybe_run_helper;
pub use install_meta::InstallMeta;
pub use installer::{InstallOutcome, Installer};
pub use platform::Platform;
pub use self_updater::{SelfUpdater, UpdateReport, maybe_start_background_update};
pub use source::UpdateSource;
pub use staging::FinalizeOutcome;
pub use verification::ChecksumVerifier;
pub use version::{is_outdated, parse_version};
pub use version_check::{CheckOutcome, CheckResult, SkipReason, UpdateChecker};
