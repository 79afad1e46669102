//! Asset resolution: turns an [`UpdateSource`] into a concrete download.

use tracing::debug;

use crate::core::{Result, UpdateError};
use crate::upgrade::feed::{Release, ReleaseAsset, ReleaseFeed};
use crate::upgrade::platform::Platform;
use crate::upgrade::source::{UpdateSource, strip_v};

/// A concrete artifact to download for one update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// URL of the archive.
    pub download_url: String,
    /// Archive file name.
    pub asset_name: String,
    /// Checksum manifest URL, if one is known.
    pub checksums_url: Option<String>,
    /// Expected digest supplied with the source.
    pub expected_checksum: Option<String>,
    /// Expected size supplied with the source.
    pub expected_size: Option<u64>,
    /// Target version without a `v` prefix (may be empty in direct mode).
    pub version: String,
    /// Release the asset came from (feed mode only).
    pub release: Option<Release>,
}

/// Resolves update sources against the release feed.
pub struct AssetResolver {
    feed: ReleaseFeed,
    platform: Platform,
}

impl AssetResolver {
    /// Creates a resolver for `platform`.
    pub fn new(feed: ReleaseFeed, platform: Platform) -> Self {
        Self {
            feed,
            platform,
        }
    }

    /// Resolves `source` into a download.
    ///
    /// Direct sources are resolved without any network access. Feed sources fetch
    /// the release named by the tag (or the latest release) and take the asset
    /// named by the source, or select the one for the resolver's platform with
    /// [`select_asset`].
    pub async fn resolve(&self, source: &UpdateSource) -> Result<ResolvedAsset> {
        if source.is_direct() {
            return resolve_direct(source);
        }

        let tag = source.release_tag.as_deref().unwrap_or_default();
        let release = self.feed.fetch(tag).await?;
        let (asset, checksums_url) = match source.asset_name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => {
                let asset = release.asset(name).ok_or_else(|| UpdateError::NoMatchingAsset {
                    os: self.platform.os.clone(),
                    arch: self.platform.arch.clone(),
                })?;
                (asset, select_manifest(&release, &self.platform))
            }
            None => select_asset(&release, &self.platform)?,
        };
        debug!("Resolved {} for {} from release {}", asset.name, self.platform, release.tag);

        let version = if source.version.is_empty() {
            strip_v(&release.tag).to_string()
        } else {
            source.version.clone()
        };

        Ok(ResolvedAsset {
            download_url: asset.download_url.clone(),
            asset_name: asset.name.clone(),
            checksums_url: source.checksum_url.clone().or(checksums_url),
            expected_checksum: source.checksum.clone(),
            expected_size: source.expected_size.or(asset.size),
            version,
            release: Some(release.clone()),
        })
    }
}

/// Resolves a direct-mode source.
pub fn resolve_direct(source: &UpdateSource) -> Result<ResolvedAsset> {
    let url = source.asset_url.clone().unwrap_or_default();
    let asset_name = source
        .asset_name
        .clone()
        .filter(|name| !name.is_empty())
        .or_else(|| file_name_from_url(&url))
        .ok_or_else(|| UpdateError::other(format!("Unable to determine asset name from {url}")))?;

    let version = if source.version.is_empty() {
        version_from_asset_name(&asset_name).unwrap_or_default()
    } else {
        source.version.clone()
    };

    Ok(ResolvedAsset {
        download_url: url,
        asset_name,
        checksums_url: source.checksum_url.clone(),
        expected_checksum: source.checksum.clone(),
        expected_size: source.expected_size,
        version,
        release: None,
    })
}

/// Picks the archive for `platform` and the best checksum manifest in `release`.
///
/// The archive name must contain both the OS and architecture identifiers and use
/// the platform's archive extension (`.zip` on Windows, `.tar.gz`/`.tgz`
/// elsewhere). A manifest whose name contains "checksums" and the OS identifier
/// is preferred over a generic "checksums" file.
///
/// # Errors
///
/// [`UpdateError::NoMatchingAsset`] if no asset satisfies the constraints.
pub fn select_asset<'a>(
    release: &'a Release,
    platform: &Platform,
) -> Result<(&'a ReleaseAsset, Option<String>)> {
    let asset = release
        .assets
        .iter()
        .find(|asset| {
            let name = asset.name.to_lowercase();
            name.contains(&platform.os)
                && name.contains(&platform.arch)
                && platform.accepts_archive(&name)
        })
        .ok_or_else(|| UpdateError::NoMatchingAsset {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        })?;

    Ok((asset, select_manifest(release, platform)))
}

/// URL of the checksum manifest for `platform`, preferring an OS-specific one.
fn select_manifest(release: &Release, platform: &Platform) -> Option<String> {
    let manifests: Vec<_> = release
        .assets
        .iter()
        .map(|asset| (asset.name.to_lowercase(), asset))
        .filter(|(name, _)| name.contains("checksums"))
        .collect();
    manifests
        .iter()
        .find(|(name, _)| name.contains(&platform.os))
        .or_else(|| manifests.first())
        .map(|(_, asset)| asset.download_url.clone())
}

/// Last path segment of a URL, ignoring query and fragment.
pub fn file_name_from_url(raw: &str) -> Option<String> {
    let url = reqwest::Url::parse(raw.trim()).ok()?;
    url.path_segments()?.next_back().filter(|segment| !segment.is_empty()).map(str::to_string)
}

/// Version embedded in an asset name of the form `<prefix>_<version>_...`.
///
/// # Examples
///
/// ```rust
/// use tnr_cli::upgrade::resolver::version_from_asset_name;
///
/// assert_eq!(version_from_asset_name("tnr_v1.4.0_linux_amd64.tar.gz").as_deref(), Some("1.4.0"));
/// assert_eq!(version_from_asset_name("tnr.zip"), None);
/// ```
pub fn version_from_asset_name(name: &str) -> Option<String> {
    let mut parts = name.trim().split('_');
    parts.next()?;
    parts.next().map(|version| strip_v(version).to_string()).filter(|v| !v.is_empty())
}
