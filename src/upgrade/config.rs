use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CHECK_CACHE_TTL, DEFAULT_API_BASE_URL, DEFAULT_DOWNLOAD_BASE_URL, ENV_GITHUB_TOKEN,
    ENV_INSTALL_META, ENV_NO_SELFUPDATE, ENV_UPDATE_API_URL, ENV_UPDATE_CACHE_DIR, FEED_TIMEOUT,
    INSTALL_META_FILE, RELEASE_REPO,
};
use crate::core::{Result, UpdateError};

/// Version baked into this build.
///
/// Release pipelines set `TNR_BUILD_VERSION` at compile time (e.g. `v1.4.0`);
/// local builds fall back to the crate version.
pub fn build_version() -> &'static str {
    option_env!("TNR_BUILD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Settings threaded into every component of the update engine.
///
/// Nothing in the engine reads process-global state directly: the CLI builds one
/// `UpdateConfig` (normally with [`UpdateConfig::from_env`]) and passes it down.
/// Tests construct it with [`UpdateConfig::new`] and point the paths at temporary
/// directories.
///
/// # Environment
///
/// | Variable               | Effect                                        |
/// |------------------------|-----------------------------------------------|
/// | `TNR_NO_SELFUPDATE=1`  | disables the background check-and-upgrade     |
/// | `TNR_GITHUB_TOKEN`     | bearer token for feed and download requests   |
/// | `TNR_UPDATE_CACHE_DIR` | relocates the update check cache              |
/// | `TNR_UPDATE_API_URL`   | overrides the release feed base URL           |
/// | `TNR_INSTALL_META`     | overrides the install metadata file location  |
///
/// # Examples
///
/// ```rust
/// use tnr_cli::upgrade::UpdateConfig;
///
/// let config = UpdateConfig::new("v1.0.0")
///     .with_cache_dir("/tmp/tnr-cache")
///     .with_api_base_url("http://127.0.0.1:8080");
/// assert_eq!(config.current_version, "v1.0.0");
/// assert!(config.token.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Version of the running binary.
    pub current_version: String,
    /// Release repository as `owner/name`.
    pub repo: String,
    /// Base URL of the release feed API.
    pub api_base_url: String,
    /// Base URL used for direct download links.
    pub download_base_url: String,
    /// Optional bearer token for the feed and downloads.
    pub token: Option<String>,
    /// Directory holding the update check cache.
    pub cache_dir: PathBuf,
    /// Per-machine install metadata file.
    pub meta_path: PathBuf,
    /// Freshness window of the cached check result.
    pub check_ttl: Duration,
    /// Time-box for each feed request.
    pub feed_timeout: Duration,
    /// Whether the background check-and-upgrade is disabled.
    pub disabled: bool,
    /// Executable to update instead of the running one.
    pub executable: Option<PathBuf>,
}

impl UpdateConfig {
    /// Creates a configuration with platform defaults and no environment overrides.
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            repo: RELEASE_REPO.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            token: None,
            cache_dir: default_cache_dir(),
            meta_path: default_meta_path(),
            check_ttl: CHECK_CACHE_TTL,
            feed_timeout: FEED_TIMEOUT,
            disabled: false,
            executable: None,
        }
    }

    /// Creates a configuration for this build, applying environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::new(build_version());

        if let Some(dir) = non_empty_env(ENV_UPDATE_CACHE_DIR) {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(url) = non_empty_env(ENV_UPDATE_API_URL) {
            config.api_base_url = url;
        }
        if let Some(path) = non_empty_env(ENV_INSTALL_META) {
            config.meta_path = PathBuf::from(path);
        }
        config.token = non_empty_env(ENV_GITHUB_TOKEN);
        config.disabled = std::env::var(ENV_NO_SELFUPDATE).is_ok_and(|v| v.trim() == "1");
        config
    }

    /// Relocates the update check cache.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Points the release feed at another server.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Points direct download links at another server.
    pub fn with_download_base_url(mut self, url: impl Into<String>) -> Self {
        self.download_base_url = url.into();
        self
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Relocates the per-machine install metadata file.
    pub fn with_meta_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.meta_path = path.into();
        self
    }

    /// Updates `path` instead of the running executable.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Path of the update check cache file.
    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join(crate::constants::CHECK_CACHE_FILE)
    }

    /// Resolves the executable to update, following symlinks.
    pub fn current_exe(&self) -> Result<PathBuf> {
        let exe = match &self.executable {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(|e| UpdateError::Other {
                message: format!("Cannot determine the running executable: {e}"),
            })?,
        };
        Ok(resolve_symlinks(&exe))
    }

    /// Release page for `tag`, or the latest release when `tag` is empty.
    pub fn release_page_url(&self, tag: &str) -> String {
        if tag.is_empty() {
            format!("{}/{}/releases/latest", self.download_base_url, self.repo)
        } else {
            format!("{}/{}/releases/tag/{}", self.download_base_url, self.repo, tag)
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn resolve_symlinks(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .map(strip_verbatim_prefix)
        .unwrap_or_else(|_| path.to_path_buf())
}

// canonicalize() yields `\\?\C:\...` on Windows, which breaks string comparisons
// against registry and installer paths.
fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    #[cfg(windows)]
    {
        let text = path.to_string_lossy();
        if let Some(stripped) = text.strip_prefix(r"\\?\")
            && !stripped.starts_with("UNC\\")
        {
            return PathBuf::from(stripped);
        }
    }
    path
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("tnr")
}

fn default_meta_path() -> PathBuf {
    if cfg!(windows) {
        let program_data =
            std::env::var("ProgramData").unwrap_or_else(|_| r"C:\ProgramData".to_string());
        PathBuf::from(program_data).join("Thunder-Compute").join("tnr").join(INSTALL_META_FILE)
    } else {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tnr")
            .join(INSTALL_META_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            for name in [
                ENV_UPDATE_CACHE_DIR,
                ENV_UPDATE_API_URL,
                ENV_INSTALL_META,
                ENV_GITHUB_TOKEN,
                ENV_NO_SELFUPDATE,
            ] {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = UpdateConfig::new("1.0.0");
        assert_eq!(config.repo, "Thunder-Compute/thunder-cli");
        assert_eq!(config.api_base_url, "https://api.github.com");
        assert_eq!(config.check_ttl, Duration::from_secs(86400));
        assert_eq!(config.feed_timeout, Duration::from_secs(20));
        assert!(config.cache_dir.ends_with("tnr"));
        assert!(config.meta_path.ends_with("install-meta.json"));
        assert!(!config.disabled);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var(ENV_UPDATE_CACHE_DIR, "/tmp/tnr-test-cache");
            std::env::set_var(ENV_GITHUB_TOKEN, "secret");
            std::env::set_var(ENV_NO_SELFUPDATE, "1");
            std::env::set_var(ENV_UPDATE_API_URL, "http://127.0.0.1:9");
        }

        let config = UpdateConfig::from_env();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/tnr-test-cache"));
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert!(config.disabled);
        assert_eq!(config.api_base_url, "http://127.0.0.1:9");
        assert_eq!(config.current_version, build_version());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_env_values_are_ignored() {
        clear_env();
        unsafe {
            std::env::set_var(ENV_GITHUB_TOKEN, "  ");
            std::env::set_var(ENV_NO_SELFUPDATE, "0");
        }

        let config = UpdateConfig::from_env();
        assert!(config.token.is_none());
        assert!(!config.disabled);

        clear_env();
    }

    #[test]
    fn test_release_page_url() {
        let config = UpdateConfig::new("1.0.0");
        assert_eq!(
            config.release_page_url("v2.0.0"),
            "https://github.com/Thunder-Compute/thunder-cli/releases/tag/v2.0.0"
        );
        assert!(config.release_page_url("").ends_with("/releases/latest"));
    }

    #[test]
    fn test_executable_override() {
        let temp = tempfile::TempDir::new().unwrap();
        let exe = temp.path().join("tnr");
        std::fs::write(&exe, b"bin").unwrap();

        let config = UpdateConfig::new("1.0.0").with_executable(&exe);
        let resolved = config.current_exe().unwrap();
        assert_eq!(resolved.file_name().unwrap(), "tnr");
    }
}
