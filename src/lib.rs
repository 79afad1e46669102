//! tnr - Thunder Compute CLI
//!
//! This crate holds the self-update engine of the `tnr` binary together with the
//! thin CLI glue that drives it. The engine determines whether a newer release
//! exists, fetches the archive for the current platform, verifies it, and
//! replaces the running executable without leaving the installation broken.
//!
//! # Core Modules
//!
//! - [`upgrade`] - release feed, check cache, asset resolution, download,
//!   verification, extraction, install-type detection and the platform installers
//! - [`cli`] - `tnr update` / `tnr version` and the background update hook
//! - [`core`] - [`UpdateError`](core::UpdateError), [`Step`](core::Step) and
//!   user-facing error formatting
//! - [`utils`] - filesystem helpers, retry backoff and progress bars
//! - [`constants`] - timeouts, file names and environment variables
//!
//! # Embedding
//!
//! A host CLI calls two functions:
//!
//! ```rust,no_run
//! use tnr_cli::upgrade::{UpdateConfig, finalize_at_startup, maybe_start_background_update};
//!
//! # async fn example() {
//! let config = UpdateConfig::from_env();
//! // First thing on every launch (synchronous, never fails).
//! finalize_at_startup(&config);
//! // Once per launch, before running the user's command.
//! let _task = maybe_start_background_update(&config).await;
//! # }
//! ```
//!
//! # Platform Support
//!
//! - **Linux / macOS**: the executable is replaced in place (with a `sudo`
//!   fallback for root-owned directories)
//! - **Windows**: manual installs are staged and swapped on the next launch,
//!   elevating through UAC when needed; installer-managed installs are upgraded
//!   by the platform installer package

pub mod cli;
pub mod constants;
pub mod core;
pub mod upgrade;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
