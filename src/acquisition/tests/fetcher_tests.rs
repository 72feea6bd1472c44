//! Single-date fetch behaviour

use super::{date, daily_archive, mount_archive, remote_path, test_config};
use crate::acquisition::{Fetcher, RetryPolicy};
use crate::error::FetchError;
use crate::models::FetchOutcome;
use crate::test_support::{FixtureLine, zip_archive};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_writes_destination() {
    let server = MockServer::start().await;
    mount_archive(&server, 1).await;
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server);
    fs::create_dir_all(&config.data_dir).unwrap();

    let fetcher = Fetcher::new(&config).unwrap();
    let outcome = fetcher.fetch(date(1)).await;

    assert!(matches!(outcome, FetchOutcome::Fetched { attempts: 1, .. }));
    let content = fs::read_to_string(fetcher.destination(date(1))).unwrap();
    assert!(content.contains("TESLA"));
}

#[tokio::test]
async fn test_existing_file_is_not_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(daily_archive(1)))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server);
    fs::create_dir_all(&config.data_dir).unwrap();
    let fetcher = Fetcher::new(&config).unwrap();
    fs::write(fetcher.destination(date(1)), b"local copy").unwrap();

    let outcome = fetcher.fetch(date(1)).await;

    assert!(matches!(outcome, FetchOutcome::AlreadyPresent));
    assert_eq!(fs::read(fetcher.destination(date(1))).unwrap(), b"local copy");
}

#[tokio::test]
async fn test_force_refetches_existing_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(remote_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(daily_archive(1)))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server).with_force(true);
    fs::create_dir_all(&config.data_dir).unwrap();
    let fetcher = Fetcher::new(&config).unwrap();
    fs::write(fetcher.destination(date(1)), b"stale").unwrap();

    let outcome = fetcher.fetch(date(1)).await;

    assert!(matches!(outcome, FetchOutcome::Fetched { .. }));
    assert_ne!(fs::read(fetcher.destination(date(1))).unwrap(), b"stale");
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(remote_path(1)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_archive(&server, 1).await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server);
    fs::create_dir_all(&config.data_dir).unwrap();

    let outcome = Fetcher::new(&config).unwrap().fetch(date(1)).await;

    assert!(matches!(outcome, FetchOutcome::Fetched { attempts: 2, .. }));
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server).with_retry_count(2);
    fs::create_dir_all(&config.data_dir).unwrap();
    let fetcher = Fetcher::new(&config).unwrap();

    let outcome = fetcher.fetch(date(1)).await;

    match outcome {
        FetchOutcome::Failed { error, attempts } => {
            assert!(matches!(error, FetchError::ServerStatus { status: 500, .. }));
            assert_eq!(attempts, 3);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!fetcher.destination(date(1)).exists());
}

#[tokio::test]
async fn test_missing_file_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server);
    fs::create_dir_all(&config.data_dir).unwrap();

    let outcome = Fetcher::new(&config).unwrap().fetch(date(2)).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Failed {
            error: FetchError::NotFound { .. },
            attempts: 1
        }
    ));
}

#[tokio::test]
async fn test_non_archive_body_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server);
    fs::create_dir_all(&config.data_dir).unwrap();
    let fetcher = Fetcher::new(&config).unwrap();

    let outcome = fetcher.fetch(date(1)).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Failed {
            error: FetchError::InvalidArchive { .. },
            ..
        }
    ));
    assert!(!fetcher.destination(date(1)).exists());
    let leftovers: Vec<_> = fs::read_dir(&config.data_dir).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_injected_policy_bounds_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    // Config alone would allow 6 attempts
    let config = test_config(temp_dir.path(), &server).with_retry_count(5);
    fs::create_dir_all(&config.data_dir).unwrap();
    let fetcher =
        Fetcher::new(&config).unwrap().with_policy(RetryPolicy::fixed(2, Duration::from_millis(1)));

    let outcome = fetcher.fetch(date(1)).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Failed {
            error: FetchError::ServerStatus { status: 502, .. },
            attempts: 2
        }
    ));
}

#[tokio::test]
async fn test_uppercase_entry_name_is_accepted() {
    let server = MockServer::start().await;
    let line = FixtureLine::new("KIA", "EV6", "KNAC381A5N5000005", "BEV").render();
    Mock::given(method("GET"))
        .and(path(remote_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_archive(
            "EXPORT_MAT_20250201.TXT",
            format!("{}\n", line).as_bytes(),
        )))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), &server);
    fs::create_dir_all(&config.data_dir).unwrap();
    let fetcher = Fetcher::new(&config).unwrap();

    let outcome = fetcher.fetch(date(1)).await;

    assert!(matches!(outcome, FetchOutcome::Fetched { .. }));
    let content = fs::read_to_string(fetcher.destination(date(1))).unwrap();
    assert!(content.contains("KIA"));
}
