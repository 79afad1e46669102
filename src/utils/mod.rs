//! Cross-platform utilities
//!
//! - [`fs`] - Atomic writes, writability probes and executable replacement
//! - [`backoff`] - Exponential backoff for retried filesystem operations
//! - [`progress`] - Download progress bars

pub mod backoff;
pub mod fs;
pub mod progress;

pub use fs::{atomic_write, dir_writable, ensure_dir, replace_executable};
pub use progress::ProgressBar;
