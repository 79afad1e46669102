//! Update check cache behaviour across checker instances.

use mockito::Server;
use std::time::Duration;
use tempfile::TempDir;
use tnr_cli::upgrade::{CheckOutcome, SkipReason, UpdateChecker, UpdateConfig};

const LATEST_PATH: &str = "/repos/Thunder-Compute/thunder-cli/releases/latest";

fn config(server_url: &str, temp: &TempDir) -> UpdateConfig {
    UpdateConfig::new("1.0.0").with_api_base_url(server_url).with_cache_dir(temp.path().join("cache"))
}

#[tokio::test]
async fn test_one_live_request_per_ttl_window() {
    let temp = TempDir::new().unwrap();
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", LATEST_PATH)
        .with_status(200)
        .with_body(r#"{"tag_name":"v1.2.3","assets":[]}"#)
        .expect(2)
        .create_async()
        .await;

    let checker = UpdateChecker::new(&config(&server.url(), &temp)).unwrap();
    let first = checker.check("1.0.0").await.unwrap();
    let result = first.outdated().unwrap();
    assert_eq!(result.latest_version, "v1.2.3");
    assert!(!result.from_cache);

    // A fresh checker reads the same cache file.
    let checker = UpdateChecker::new(&config(&server.url(), &temp)).unwrap();
    let second = checker.check("1.0.0").await.unwrap();
    assert!(second.outdated().unwrap().from_cache);

    let mut expired = config(&server.url(), &temp);
    expired.check_ttl = Duration::ZERO;
    let third = UpdateChecker::new(&expired).unwrap().check("1.0.0").await.unwrap();
    assert!(!third.outdated().unwrap().from_cache);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_feed_is_skippable() {
    let temp = TempDir::new().unwrap();
    let checker = UpdateChecker::new(&config("http://127.0.0.1:9", &temp)).unwrap();

    let err = checker.check("1.0.0").await.unwrap_err();
    assert!(err.is_skippable());
}

#[tokio::test]
async fn test_dev_build_never_contacts_feed() {
    let temp = TempDir::new().unwrap();
    let mut server = Server::new_async().await;
    let mock = server.mock("GET", LATEST_PATH).expect(0).create_async().await;

    let checker = UpdateChecker::new(&config(&server.url(), &temp)).unwrap();
    assert_eq!(
        checker.check("dev").await.unwrap(),
        CheckOutcome::Skipped {
            reason: SkipReason::DevelopmentBuild
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_current_release_is_not_outdated() {
    let temp = TempDir::new().unwrap();
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", LATEST_PATH)
        .with_status(200)
        .with_body(r#"{"tag_name":"V1.0.0","assets":[]}"#)
        .create_async()
        .await;

    let checker = UpdateChecker::new(&config(&server.url(), &temp)).unwrap();
    let outcome = checker.check("v1.0.0").await.unwrap();
    assert!(outcome.outdated().is_none());
    assert!(matches!(outcome, CheckOutcome::Checked(ref result) if result.latest_version == "V1.0.0"));
}
