/// The intent to upgrade: what to install and where to get it.
///
/// Built once per update attempt and never mutated afterwards. Exactly one of
/// two modes applies:
///
/// - **Feed mode** (`asset_url` unset): the asset is looked up in the release
///   identified by `release_tag` (or the latest release if no tag is set).
/// - **Direct mode** (`asset_url` set): the asset is downloaded from that URL.
///
/// # Examples
///
/// ```rust
/// use tnr_cli::upgrade::UpdateSource;
///
/// let source = UpdateSource::from_tag("v1.2.3");
/// assert_eq!(source.version, "1.2.3");
/// assert_eq!(source.release_tag.as_deref(), Some("v1.2.3"));
///
/// let direct = UpdateSource::direct("https://mirror.example/tnr_1.2.3_linux_amd64.tar.gz")
///     .with_checksum("ABCDEF");
/// assert_eq!(direct.checksum.as_deref(), Some("abcdef"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSource {
    /// Target version without a `v` prefix; empty means "derive it".
    pub version: String,
    /// Release tag to resolve assets from.
    pub release_tag: Option<String>,
    /// Direct asset URL.
    pub asset_url: Option<String>,
    /// Asset file name; derived from the URL when unset.
    pub asset_name: Option<String>,
    /// Expected SHA-256 of the asset (lowercase hex).
    pub checksum: Option<String>,
    /// URL of a checksum manifest.
    pub checksum_url: Option<String>,
    /// Expected asset size in bytes.
    pub expected_size: Option<u64>,
}

impl UpdateSource {
    /// The latest published release.
    pub fn latest() -> Self {
        Self::default()
    }

    /// A specific release tag, e.g. `v1.2.3`.
    pub fn from_tag(tag: impl Into<String>) -> Self {
        let tag = tag.into().trim().to_string();
        Self {
            version: strip_v(&tag).to_string(),
            release_tag: Some(tag).filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }

    /// An asset downloaded straight from `url`.
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            asset_url: Some(url.into().trim().to_string()),
            ..Self::default()
        }
    }

    /// Sets the target version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = strip_v(version.into().trim()).to_string();
        self
    }

    /// Sets the asset file name.
    pub fn with_asset_name(mut self, name: impl Into<String>) -> Self {
        self.asset_name = Some(name.into().trim().to_string());
        self
    }

    /// Sets the expected SHA-256 digest (any case).
    pub fn with_checksum(mut self, digest: impl Into<String>) -> Self {
        self.checksum = Some(digest.into().trim().to_lowercase()).filter(|d| !d.is_empty());
        self
    }

    /// Sets the checksum manifest URL.
    pub fn with_checksum_url(mut self, url: impl Into<String>) -> Self {
        self.checksum_url = Some(url.into().trim().to_string()).filter(|u| !u.is_empty());
        self
    }

    /// Sets the expected asset size in bytes.
    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Whether the source names an asset URL directly.
    pub fn is_direct(&self) -> bool {
        self.asset_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Strips a single leading `v` or `V`.
pub fn strip_v(version: &str) -> &str {
    version.strip_prefix(['v', 'V']).unwrap_or(version)
}
