//! Core types for tnr
//!
//! This module holds the error taxonomy shared by the update engine and the CLI:
//! - [`UpdateError`] - Enumerated failures of the check, download and install flow
//! - [`Step`] - Tagged outcome for steps whose failure is a soft failure
//! - [`ErrorContext`] - User-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to the user-friendly format
//!
//! # Examples
//!
//! ```rust
//! use tnr_cli::core::{Step, UpdateError};
//!
//! fn fetch_manifest() -> Result<Step<String>, UpdateError> {
//!     Ok(Step::degraded("manifest not published"))
//! }
//!
//! let step = fetch_manifest().unwrap();
//! assert!(step.is_degraded());
//! ```

pub mod error;

pub use error::{
    ErrorContext, Result, Step, UpdateError, manual_download_url, release_error_context,
    user_friendly_error,
};
