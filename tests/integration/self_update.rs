//! End-to-end update attempts against a mock release feed.

use mockito::{Server, ServerGuard};
use tempfile::TempDir;
use tnr_cli::core::{Step, UpdateError};
use tnr_cli::test_utils::ReleaseFixture;
use tnr_cli::upgrade::{
    FinalizeOutcome, InstallMeta, InstallOutcome, Platform, SelfUpdater, UpdateConfig, UpdateSource,
    finalize_pending_update,
};

const REPO_PATH: &str = "/repos/Thunder-Compute/thunder-cli/releases";

struct Harness {
    temp: TempDir,
    server: ServerGuard,
    platform: Platform,
    fixture: ReleaseFixture,
}

impl Harness {
    async fn new(platform: Platform) -> Self {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("bin").join(platform.exe_name());
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"old binary").unwrap();

        let fixture = ReleaseFixture::new("v1.2.3", &platform, b"new binary").unwrap();
        Self {
            temp,
            server: Server::new_async().await,
            platform,
            fixture,
        }
    }

    fn exe(&self) -> std::path::PathBuf {
        self.temp.path().join("bin").join(self.platform.exe_name())
    }

    fn config(&self) -> UpdateConfig {
        UpdateConfig::new("1.0.0")
            .with_executable(self.exe())
            .with_api_base_url(self.server.url())
            .with_download_base_url(self.server.url())
            .with_cache_dir(self.temp.path().join("cache"))
            .with_meta_path(self.temp.path().join("install-meta.json"))
    }

    fn updater(&self) -> SelfUpdater {
        SelfUpdater::new(self.config()).with_platform(self.platform.clone())
    }

    async fn serve_release(&mut self) {
        let body = self.fixture.release_json(&self.server.url());
        self.server
            .mock("GET", format!("{REPO_PATH}/tags/v1.2.3").as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let archive_path = format!("/download/{}", self.fixture.archive_name);
        self.server
            .mock("GET", archive_path.as_str())
            .with_status(200)
            .with_body(self.fixture.archive.clone())
            .create_async()
            .await;
    }

    async fn serve_manifest(&mut self, status: usize, body: String) {
        self.server
            .mock("GET", "/download/checksums.txt")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;
    }
}

#[tokio::test]
async fn test_unix_update_replaces_executable() {
    let mut harness = Harness::new(Platform::new("linux", "amd64")).await;
    harness.serve_release().await;
    let manifest = harness.fixture.checksums();
    harness.serve_manifest(200, manifest).await;

    let report = harness.updater().perform_update(&UpdateSource::from_tag("v1.2.3")).await.unwrap();

    assert_eq!(report.version, "1.2.3");
    assert_eq!(report.outcome, InstallOutcome::Replaced);
    assert_eq!(report.manifest, Step::Done(()));
    assert_eq!(std::fs::read(harness.exe()).unwrap(), b"new binary");
}

#[tokio::test]
async fn test_missing_manifest_degrades_but_installs() {
    let mut harness = Harness::new(Platform::new("linux", "amd64")).await;
    harness.serve_release().await;
    harness.serve_manifest(404, String::new()).await;

    let report = harness.updater().perform_update(&UpdateSource::from_tag("v1.2.3")).await.unwrap();

    assert!(matches!(report.manifest, Step::Degraded { .. }));
    assert_eq!(std::fs::read(harness.exe()).unwrap(), b"new binary");
}

#[tokio::test]
async fn test_manifest_without_digest_aborts_install() {
    let mut harness = Harness::new(Platform::new("linux", "amd64")).await;
    harness.serve_release().await;
    let manifest = format!("{}  {}\n", "f".repeat(64), harness.fixture.archive_name);
    harness.serve_manifest(200, manifest).await;

    let err = harness.updater().perform_update(&UpdateSource::from_tag("v1.2.3")).await.unwrap_err();

    assert!(matches!(err, UpdateError::ChecksumMismatch { .. }));
    assert_eq!(std::fs::read(harness.exe()).unwrap(), b"old binary");
}

#[tokio::test]
async fn test_supplied_digest_mismatch_aborts_install() {
    let mut harness = Harness::new(Platform::new("darwin", "arm64")).await;
    harness.serve_release().await;
    let manifest = harness.fixture.checksums();
    harness.serve_manifest(200, manifest).await;

    let source = UpdateSource::from_tag("v1.2.3").with_checksum("a".repeat(64));
    let err = harness.updater().perform_update(&source).await.unwrap_err();

    assert!(matches!(err, UpdateError::ChecksumMismatch { .. }));
    assert_eq!(std::fs::read(harness.exe()).unwrap(), b"old binary");
}

#[tokio::test]
async fn test_missing_platform_asset_is_reported() {
    let mut harness = Harness::new(Platform::new("freebsd", "riscv64")).await;
    let linux = ReleaseFixture::new("v1.2.3", &Platform::new("linux", "amd64"), b"x").unwrap();
    let body = linux.release_json(&harness.server.url());
    harness
        .server
        .mock("GET", format!("{REPO_PATH}/tags/v1.2.3").as_str())
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let err = harness.updater().perform_update(&UpdateSource::from_tag("v1.2.3")).await.unwrap_err();
    assert!(matches!(err, UpdateError::NoMatchingAsset { .. }));
}

#[tokio::test]
async fn test_package_manager_install_is_refused() {
    let harness = Harness::new(Platform::new("linux", "amd64")).await;
    InstallMeta::new("homebrew", "brew", "1.0.0")
        .write(&harness.temp.path().join("install-meta.json"))
        .unwrap();

    let err = harness.updater().perform_update(&UpdateSource::from_tag("v1.2.3")).await.unwrap_err();

    match err {
        UpdateError::ManagedInstall {
            command,
            ..
        } => assert_eq!(command, "brew upgrade tnr"),
        other => panic!("expected ManagedInstall, got {other:?}"),
    }
    assert_eq!(std::fs::read(harness.exe()).unwrap(), b"old binary");
}

#[tokio::test]
async fn test_windows_update_stages_then_finalizes() {
    let mut harness = Harness::new(Platform::new("windows", "amd64")).await;
    harness.serve_release().await;
    let manifest = harness.fixture.checksums();
    harness.serve_manifest(200, manifest).await;

    let report = harness.updater().perform_update(&UpdateSource::from_tag("v1.2.3")).await.unwrap();

    assert_eq!(
        report.outcome,
        InstallOutcome::Staged {
            elevated: false
        }
    );
    let exe = harness.exe();
    assert_eq!(std::fs::read(&exe).unwrap(), b"old binary");

    let outcome = finalize_pending_update(&exe).unwrap();
    assert_eq!(
        outcome,
        FinalizeOutcome::Swapped {
            version: Some("1.2.3".to_string()),
            backup_removed: true,
        }
    );
    assert_eq!(std::fs::read(&exe).unwrap(), b"new binary");
}

#[tokio::test]
async fn test_direct_source_skips_the_feed() {
    let mut harness = Harness::new(Platform::new("linux", "arm64")).await;
    let archive_path = format!("/assets/{}", harness.fixture.archive_name);
    harness
        .server
        .mock("GET", archive_path.as_str())
        .with_status(200)
        .with_body(harness.fixture.archive.clone())
        .create_async()
        .await;
    let feed = harness
        .server
        .mock("GET", mockito::Matcher::Regex(format!("^{REPO_PATH}")))
        .expect(0)
        .create_async()
        .await;

    let source = UpdateSource::direct(format!("{}{archive_path}", harness.server.url()))
        .with_version("1.2.3")
        .with_checksum(harness.fixture.sha256());
    let report = harness.updater().perform_update(&source).await.unwrap();

    assert_eq!(report.version, "1.2.3");
    assert_eq!(std::fs::read(harness.exe()).unwrap(), b"new binary");
    feed.assert_async().await;
}
