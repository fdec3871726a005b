//! Integration test: asset retrieval, staging files and credential refresh.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::mock_server::{MockServer, Reply, Running};
use common::{fast_http, files_under};
use indicatif::ProgressBar;
use recfetch_core::{FetchError, ShutdownFlag};
use recfetch_recordings::naming::part_path;
use recfetch_recordings::{CredentialBroker, Retriever, TokenPlacement, TokenSource};
use tempfile::TempDir;

/// Hands out `tok-1`, `tok-2`, ... without a network round trip
struct SequentialTokens(Arc<AtomicUsize>);

impl TokenSource for SequentialTokens {
    fn fetch_token(&self) -> Result<String, FetchError> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("tok-{n}"))
    }
}

struct Fixture {
    retriever: Retriever,
    broker: Arc<CredentialBroker>,
    issued: Arc<AtomicUsize>,
    dir: TempDir,
}

fn fixture(placement: TokenPlacement, max_retries: u32, shutdown: ShutdownFlag) -> Fixture {
    let issued = Arc::new(AtomicUsize::new(0));
    let broker = Arc::new(CredentialBroker::new(SequentialTokens(Arc::clone(&issued))));
    Fixture {
        retriever: Retriever::new(
            Arc::clone(&broker),
            fast_http(max_retries),
            placement,
            shutdown,
        ),
        broker,
        issued,
        dir: TempDir::new().unwrap(),
    }
}

impl Fixture {
    fn fetch(&self, server: &Running, path: &str, dest: &Path) -> Result<u64, FetchError> {
        let credential = self.broker.acquire()?;
        self.retriever
            .fetch(&server.url(path), dest, &credential, &ProgressBar::hidden())
    }
}

#[test]
fn commits_complete_body() {
    let body: Vec<u8> = (0u8..=255).cycle().take(200 * 1024).collect();
    let expected = body.clone();
    let server = MockServer::bind().serve(move |_| Reply::bytes(body.clone()));
    let fx = fixture(TokenPlacement::Query, 0, ShutdownFlag::new());
    let dest = fx.dir.path().join("audio_only.m4a");

    let written = fx.fetch(&server, "/rec/download/a1", &dest).unwrap();

    assert_eq!(written, expected.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), expected);
    assert!(!part_path(&dest).exists());
}

#[test]
fn query_placement_preserves_existing_parameters() {
    let server = MockServer::bind().serve(|_| Reply::bytes(b"data".to_vec()));
    let fx = fixture(TokenPlacement::Query, 0, ShutdownFlag::new());
    let dest = fx.dir.path().join("a.m4a");

    fx.fetch(&server, "/rec/download/a1?type=play", &dest).unwrap();

    let req = &server.requests()[0];
    assert_eq!(req.query_param("type"), Some("play"));
    assert_eq!(req.query_param("access_token"), Some("tok-1"));
    assert_eq!(req.header("authorization"), None);
}

#[test]
fn header_placement_uses_bearer() {
    let server = MockServer::bind().serve(|_| Reply::bytes(b"data".to_vec()));
    let fx = fixture(TokenPlacement::Header, 0, ShutdownFlag::new());
    let dest = fx.dir.path().join("a.m4a");

    fx.fetch(&server, "/rec/download/a1", &dest).unwrap();

    let req = &server.requests()[0];
    assert_eq!(req.header("authorization"), Some("Bearer tok-1"));
    assert_eq!(req.query_param("access_token"), None);
}

#[test]
fn zero_bytes_is_empty_download_and_leaves_nothing() {
    let server = MockServer::bind().serve(|_| Reply::bytes(Vec::new()));
    let fx = fixture(TokenPlacement::Query, 3, ShutdownFlag::new());
    let dest = fx.dir.path().join("shared_screen.mp4");

    let err = fx.fetch(&server, "/rec/download/v1", &dest).unwrap_err();

    assert!(matches!(err, FetchError::EmptyDownload { .. }));
    assert!(files_under(fx.dir.path()).is_empty());
    // not retried
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn mid_stream_cut_leaves_final_path_absent() {
    let body = vec![7u8; 64 * 1024];
    let server = MockServer::bind().serve(move |_| Reply::cut(body.clone(), 1000));
    let fx = fixture(TokenPlacement::Query, 0, ShutdownFlag::new());
    let dest = fx.dir.path().join("audio_only.m4a");

    let err = fx.fetch(&server, "/rec/download/a1", &dest).unwrap_err();

    assert!(err.is_retryable(), "unexpected error: {err}");
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
}

#[test]
fn cut_transfer_retried_to_completion() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let body = vec![9u8; 32 * 1024];
    let expected = body.clone();
    let server = MockServer::bind().serve(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Reply::cut(body.clone(), 100)
        } else {
            Reply::bytes(body.clone())
        }
    });
    let fx = fixture(TokenPlacement::Query, 2, ShutdownFlag::new());
    let dest = fx.dir.path().join("audio_only.m4a");

    let written = fx.fetch(&server, "/rec/download/a1", &dest).unwrap();

    assert_eq!(written, expected.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn single_401_refreshes_once() {
    let server = MockServer::bind().serve(|req| {
        if req.token() == Some("tok-1") {
            Reply::status(401)
        } else {
            Reply::bytes(b"fresh".to_vec())
        }
    });
    let fx = fixture(TokenPlacement::Query, 0, ShutdownFlag::new());
    let dest = fx.dir.path().join("audio_only.m4a");

    let written = fx.fetch(&server, "/rec/download/a1", &dest).unwrap();

    assert_eq!(written, 5);
    assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    assert_eq!(fx.issued.load(Ordering::SeqCst), 2);
    assert_eq!(server.requests().len(), 2);
}

#[test]
fn second_401_is_auth_error_without_further_retry() {
    let server = MockServer::bind().serve(|_| Reply::status(401));
    let fx = fixture(TokenPlacement::Query, 3, ShutdownFlag::new());
    let dest = fx.dir.path().join("audio_only.m4a");

    let err = fx.fetch(&server, "/rec/download/a1", &dest).unwrap_err();

    assert!(matches!(err, FetchError::Auth { .. }));
    assert_eq!(fx.issued.load(Ordering::SeqCst), 2);
    assert_eq!(server.requests().len(), 2);
    assert!(files_under(fx.dir.path()).is_empty());
}

#[test]
fn refresh_budget_survives_transient_retries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let server = MockServer::bind().serve(move |_| match seen.fetch_add(1, Ordering::SeqCst) {
        0 => Reply::status(401),
        1 => Reply::status(503),
        2 => Reply::status(401),
        _ => Reply::bytes(b"late".to_vec()),
    });
    let fx = fixture(TokenPlacement::Query, 3, ShutdownFlag::new());
    let dest = fx.dir.path().join("audio_only.m4a");

    let err = fx.fetch(&server, "/rec/download/a1", &dest).unwrap_err();

    assert!(matches!(err, FetchError::Auth { .. }), "unexpected error: {err}");
    assert_eq!(fx.issued.load(Ordering::SeqCst), 2);
    let tokens: Vec<_> = server
        .requests()
        .iter()
        .map(|r| r.token().map(str::to_string))
        .collect();
    assert_eq!(
        tokens,
        vec![
            Some("tok-1".to_string()),
            Some("tok-2".to_string()),
            Some("tok-2".to_string())
        ]
    );
    assert!(files_under(fx.dir.path()).is_empty());
}

#[test]
fn not_found_is_remote_error() {
    let server = MockServer::bind().serve(|_| Reply::status(404));
    let fx = fixture(TokenPlacement::Query, 3, ShutdownFlag::new());
    let dest = fx.dir.path().join("audio_only.m4a");

    let err = fx.fetch(&server, "/rec/download/gone", &dest).unwrap_err();

    assert!(matches!(
        err,
        FetchError::Remote {
            status: Some(404),
            ..
        }
    ));
    assert_eq!(server.requests().len(), 1);
    assert!(files_under(fx.dir.path()).is_empty());
}

#[test]
fn shutdown_aborts_transfer_and_discards_part() {
    let shutdown = ShutdownFlag::new();
    let trigger = shutdown.clone();
    let body = vec![1u8; 256 * 1024];
    let server = MockServer::bind().serve(move |_| {
        trigger.request();
        Reply::bytes(body.clone())
    });
    let fx = fixture(TokenPlacement::Query, 3, shutdown);
    let dest = fx.dir.path().join("audio_only.m4a");

    let err = fx.fetch(&server, "/rec/download/a1", &dest).unwrap_err();

    assert!(err.is_cancelled());
    assert!(files_under(fx.dir.path()).is_empty());
}

#[test]
fn invalid_url_is_rejected_without_request() {
    let fx = fixture(TokenPlacement::Query, 3, ShutdownFlag::new());
    let dest = fx.dir.path().join("a.m4a");
    let credential = fx.broker.acquire().unwrap();

    let err = fx
        .retriever
        .fetch("not a url", &dest, &credential, &ProgressBar::hidden())
        .unwrap_err();

    assert!(format!("{err}").contains("invalid download URL"));
    assert!(files_under(fx.dir.path()).is_empty());
}
