use futures::StreamExt;
use reqwest::StatusCode;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::{Result, UpdateError};
use crate::upgrade::UpdateConfig;
use crate::upgrade::feed::http_client;
use crate::utils::progress::ProgressBar;

/// Streams release assets to disk.
///
/// Requests carry the same bearer token as the release feed. There is no retry:
/// a failed download aborts the attempt and the caller decides whether to try
/// again later.
pub struct Downloader {
    client: reqwest::Client,
    token: Option<String>,
    show_progress: bool,
}

impl Downloader {
    /// Creates a downloader using the token of `config`.
    ///
    /// No per-request time-out is set; callers bound the whole update attempt.
    pub fn new(config: &UpdateConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(None)?,
            token: config.token.clone(),
            show_progress: false,
        })
    }

    /// Shows a progress bar while downloading.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Downloads `url` to `dest`, returning the number of bytes written.
    ///
    /// A partially written file is removed on failure.
    ///
    /// # Errors
    ///
    /// [`UpdateError::DownloadFailed`] on transport errors, non-200 statuses, or
    /// when `expected_size` is set and the body has a different length.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
    ) -> Result<u64> {
        let result = self.stream_to_file(url, dest, expected_size).await;
        if result.is_err() {
            let _ = fs::remove_file(dest).await;
        }
        result
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
    ) -> Result<u64> {
        debug!("Downloading {url} to {}", dest.display());
        let failed = |reason: String| UpdateError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(failed(format!("server returned {status}")));
        }

        let progress =
            ProgressBar::for_download(response.content_length().or(expected_size), self.show_progress);
        if let Some(name) = dest.file_name() {
            progress.set_message(name.to_string_lossy());
        }

        let mut file = fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await?;
        file.sync_all().await?;
        progress.finish_and_clear();

        if let Some(expected) = expected_size
            && expected != written
        {
            return Err(failed(format!("expected {expected} bytes, received {written}")));
        }

        debug!("Downloaded {written} bytes from {url}");
        Ok(written)
    }
}
