//! Release feed client.
//!
//! Reads release metadata (tag and asset list) from the GitHub releases API or any
//! server that speaks the same JSON shape. Every request carries the configured
//! bearer token and is time-boxed by [`UpdateConfig::feed_timeout`].

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::USER_AGENT;
use crate::core::{Result, UpdateError};
use crate::upgrade::UpdateConfig;

/// A downloadable artifact attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name, e.g. `tnr_linux_amd64.tar.gz`.
    pub name: String,
    /// Direct download URL.
    #[serde(rename = "browser_download_url", alias = "downloadURL")]
    pub download_url: String,
    /// Size in bytes, when the feed reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Release metadata as returned by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release tag, e.g. `v1.2.3`.
    #[serde(rename = "tag_name", alias = "tag")]
    pub tag: String,
    /// Attached assets.
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Finds an asset by exact name.
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// Client for the release feed.
///
/// # Examples
///
/// ```rust,no_run
/// use tnr_cli::upgrade::{ReleaseFeed, UpdateConfig};
///
/// # async fn example() -> tnr_cli::core::Result<()> {
/// let feed = ReleaseFeed::new(&UpdateConfig::from_env())?;
/// let latest = feed.fetch("").await?;
/// println!("latest release: {}", latest.tag);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReleaseFeed {
    client: reqwest::Client,
    api_base_url: String,
    repo: String,
    token: Option<String>,
}

impl ReleaseFeed {
    /// Creates a client using the feed settings of `config`.
    pub fn new(config: &UpdateConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(Some(config.feed_timeout))?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            repo: config.repo.clone(),
            token: config.token.clone(),
        })
    }

    /// Fetches a release.
    ///
    /// An empty `tag` queries the latest release; anything else queries that tag.
    ///
    /// # Errors
    ///
    /// [`UpdateError::FeedUnavailable`] on transport errors, time-outs, non-200
    /// statuses and undecodable bodies.
    pub async fn fetch(&self, tag: &str) -> Result<Release> {
        let tag = tag.trim();
        let url = if tag.is_empty() {
            format!("{}/repos/{}/releases/latest", self.api_base_url, self.repo)
        } else {
            format!("{}/repos/{}/releases/tags/{}", self.api_base_url, self.repo, tag)
        };
        debug!("Fetching release metadata from {url}");

        let mut request = self.client.get(&url).header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| UpdateError::FeedUnavailable {
            reason: format!("request to {url} failed: {e}"),
        })?;

        if let Some(remaining) = response.headers().get("x-ratelimit-remaining")
            && let Ok(remaining) = remaining.to_str()
            && let Ok(remaining) = remaining.parse::<u32>()
            && remaining < 10
        {
            warn!("GitHub rate limit low: {remaining} requests remaining");
        }

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdateError::FeedUnavailable {
                reason: format!("{url} returned {status}"),
            });
        }

        let mut release: Release = response.json().await.map_err(|e| {
            UpdateError::FeedUnavailable {
                reason: format!("invalid release metadata: {e}"),
            }
        })?;
        release.tag = release.tag.trim().to_string();
        debug!("Release {} lists {} assets", release.tag, release.assets.len());
        Ok(release)
    }

    /// Tag of the latest release, or `None` if the feed reports an empty tag.
    pub async fn latest_tag(&self) -> Result<Option<String>> {
        let release = self.fetch("").await?;
        Ok(Some(release.tag).filter(|tag| !tag.is_empty()))
    }
}

/// Builds the HTTP client shared by the feed and the downloader.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| UpdateError::Other {
        message: format!("Failed to build HTTP client: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    fn release_body() -> String {
        json!({
            "tag_name": "v1.2.3",
            "assets": [
                {"name": "tnr_linux_amd64.tar.gz", "browser_download_url": "https://example.com/a.tar.gz", "size": 42},
                {"name": "checksums.txt", "browser_download_url": "https://example.com/checksums.txt"}
            ]
        })
        .to_string()
    }

    fn config_for(server: &mockito::ServerGuard) -> UpdateConfig {
        UpdateConfig::new("1.0.0").with_api_base_url(server.url())
    }

    #[tokio::test]
    async fn test_fetch_latest() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/Thunder-Compute/thunder-cli/releases/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(release_body())
            .create_async()
            .await;

        let feed = ReleaseFeed::new(&config_for(&server)).unwrap();
        let release = feed.fetch("").await.unwrap();

        assert_eq!(release.tag, "v1.2.3");
        assert_eq!(release.assets.len(), 2);
        assert_eq!(release.assets[0].size, Some(42));
        assert_eq!(
            release.asset("checksums.txt").unwrap().download_url,
            "https://example.com/checksums.txt"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_specific_tag_with_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/Thunder-Compute/thunder-cli/releases/tags/v1.2.3")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(release_body())
            .create_async()
            .await;

        let feed = ReleaseFeed::new(&config_for(&server).with_token("test-token")).unwrap();
        let release = feed.fetch("v1.2.3").await.unwrap();
        assert_eq!(release.tag, "v1.2.3");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_200_is_feed_unavailable() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/Thunder-Compute/thunder-cli/releases/latest")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_body(json!({"message": "API rate limit exceeded"}).to_string())
            .create_async()
            .await;

        let feed = ReleaseFeed::new(&config_for(&server)).unwrap();
        let err = feed.fetch("").await.unwrap_err();
        assert!(matches!(err, UpdateError::FeedUnavailable { .. }));
        assert!(err.is_skippable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_feed() {
        let config = UpdateConfig::new("1.0.0").with_api_base_url("http://127.0.0.1:9");
        let feed = ReleaseFeed::new(&config).unwrap();
        let err = feed.fetch("").await.unwrap_err();
        assert!(matches!(err, UpdateError::FeedUnavailable { .. }));
    }

    #[test]
    fn test_generic_feed_shape() {
        let body = r#"{"tag":"v2.0.0","assets":[{"name":"tnr_windows_amd64.zip","downloadURL":"https://mirror/x.zip"}]}"#;
        let release: Release = serde_json::from_str(body).unwrap();
        assert_eq!(release.tag, "v2.0.0");
        assert_eq!(release.assets[0].download_url, "https://mirror/x.zip");
        assert_eq!(release.assets[0].size, None);
    }

    #[tokio::test]
    async fn test_latest_tag_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/Thunder-Compute/thunder-cli/releases/latest")
            .with_status(200)
            .with_body(r#"{"tag_name":"  ","assets":[]}"#)
            .create_async()
            .await;

        let feed = ReleaseFeed::new(&config_for(&server)).unwrap();
        assert_eq!(feed.latest_tag().await.unwrap(), None);
    }
}
