//! Integration test suite for tnr
//!
//! End-to-end tests of the self-update engine against a local HTTP server
//! standing in for the GitHub releases API, plus binary-level tests of the
//! `tnr` executable.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `tnr` binary (version output, internal helper mode)
//! - **self_update**: resolve, download, verify, extract and install
//! - **staged_swap**: stage-then-finalize on disk
//! - **update_check**: the 24-hour check cache

mod cli;
mod self_update;
mod staged_swap;
mod update_check;
