//! Progress indicators for update downloads
//!
//! Wraps `indicatif` so that explicit `tnr update` runs show a byte-level
//! download bar while background updates stay silent.
//!
//! # Environment Variables
//!
//! - `TNR_NO_PROGRESS`: Set to any value to disable all progress indicators
//!
//! # Examples
//!
//! ```rust
//! use tnr_cli::utils::progress::ProgressBar;
//!
//! let progress = ProgressBar::for_download(Some(1024), true);
//! progress.set_message("tnr_linux_amd64.tar.gz");
//! progress.inc(512);
//! progress.inc(512);
//! progress.finish_and_clear();
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

use crate::constants::ENV_NO_PROGRESS;

/// Checks if progress bars should be disabled.
///
/// Progress bars are disabled when the `TNR_NO_PROGRESS` environment variable
/// is set to any value.
fn is_progress_disabled() -> bool {
    std::env::var(ENV_NO_PROGRESS).is_ok()
}

/// A progress bar with consistent styling.
///
/// Hidden bars silently ignore every call, so callers never branch on
/// whether progress is being shown.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a progress bar for a download of `len` bytes.
    ///
    /// When the length is unknown a spinner is shown instead. The bar is
    /// hidden when `visible` is false or `TNR_NO_PROGRESS` is set.
    pub fn for_download(len: Option<u64>, visible: bool) -> Self {
        if !visible || is_progress_disabled() {
            return Self::hidden();
        }

        let bar = match len {
            Some(len) => {
                let bar = IndicatifBar::new(len);
                bar.set_style(download_style());
                bar
            }
            None => {
                let bar = IndicatifBar::new_spinner();
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        Self {
            inner: bar,
        }
    }

    /// Creates a bar that draws nothing.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Sets the message displayed alongside the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Advances the bar by `delta` bytes.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Current position in bytes.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Finishes the bar and leaves a final message.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Finishes the bar and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{msg:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {bytes}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
