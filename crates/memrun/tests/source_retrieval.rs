//! Integration tests for downloading binaries over HTTP.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{TestServer, closed_port_url};
use memrun::{Config, Error, Session, resolve, resolve_async};

#[test]
fn download_returns_full_body_with_one_request() {
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let server = TestServer::ok(body.clone());

    let bytes = resolve(&Config::from_url(server.url.clone())).unwrap();

    assert_eq!(bytes, body);
    assert_eq!(server.connections(), 1);
}

#[test]
fn embedded_bytes_skip_the_download() {
    let server = TestServer::ok(b"remote".to_vec());
    let config = Config::builder()
        .binary(b"local".to_vec())
        .source_url(server.url.clone())
        .build();

    assert_eq!(resolve(&config).unwrap(), b"local");
    assert_eq!(server.connections(), 0);
}

#[test]
fn error_status_body_is_still_returned() {
    let server = TestServer::start("404 Not Found", b"missing".to_vec());

    let bytes = resolve(&Config::from_url(server.url.clone())).unwrap();

    assert_eq!(bytes, b"missing");
}

#[test]
fn error_status_body_fails_to_load() {
    let server = TestServer::start("404 Not Found", b"<html>not found</html>".to_vec());

    let err = Session::new(Config::from_url(server.url.clone())).unwrap_err();

    assert!(matches!(err, Error::Load(_)), "{err:?}");
}

#[test]
fn closed_port_fails_session_construction() {
    let err = Session::new(Config::from_url(closed_port_url())).unwrap_err();
    assert!(matches!(err, Error::Retrieval { .. }), "{err:?}");
}

#[test]
fn truncated_body_is_a_retrieval_error() {
    let server = TestServer::truncated(1000, b"short".to_vec());

    let err = resolve(&Config::from_url(server.url.clone())).unwrap_err();

    match err {
        Error::Retrieval { url, .. } => assert_eq!(url, server.url),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn async_truncated_body_is_a_retrieval_error() {
    let server = TestServer::truncated(1000, b"short".to_vec());

    let err = resolve_async(&Config::from_url(server.url.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Retrieval { .. }), "{err:?}");
}

#[tokio::test]
async fn blocking_resolve_works_inside_a_runtime() {
    let server = TestServer::ok(b"from a worker".to_vec());

    let bytes = resolve(&Config::from_url(server.url.clone())).unwrap();

    assert_eq!(bytes, b"from a worker");
    assert_eq!(server.connections(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_constructor_inside_a_runtime_returns_errors() {
    let server = TestServer::start("404 Not Found", b"missing".to_vec());
    let err = Session::new(Config::from_url(server.url.clone())).unwrap_err();
    assert!(matches!(err, Error::Load(_)), "{err:?}");

    let err = Session::new(Config::from_url(closed_port_url())).unwrap_err();
    assert!(matches!(err, Error::Retrieval { .. }), "{err:?}");
}

#[tokio::test]
async fn async_download_returns_full_body() {
    let server = TestServer::ok(b"async body".to_vec());

    let bytes = resolve_async(&Config::from_url(server.url.clone()))
        .await
        .unwrap();

    assert_eq!(bytes, b"async body");
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn async_closed_port_fails_session_construction() {
    let err = Session::new_async(Config::from_url(closed_port_url()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Retrieval { .. }), "{err:?}");
}

#[cfg(target_os = "linux")]
#[test]
fn downloaded_binary_runs() {
    let server = TestServer::ok(common::sh_bytes());
    let config = Config::builder()
        .source_url(server.url.clone())
        .arg0("sh")
        .build();

    let session = Session::new(config).unwrap();
    let output = session.run(["-c", "printf downloaded"]).unwrap();

    assert_eq!(output.stdout, b"downloaded");
    assert_eq!(server.connections(), 1);
    session.close().unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn blocking_constructor_inside_a_runtime_loads_the_binary() {
    let server = TestServer::ok(common::sh_bytes());
    let config = Config::builder()
        .source_url(server.url.clone())
        .arg0("sh")
        .build();

    let session = Session::new(config).unwrap();
    let output = session.execute(["-c", "printf loaded"]).await.unwrap();

    assert_eq!(output.stdout, b"loaded");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn downloaded_binary_runs_async() {
    let server = TestServer::ok(common::sh_bytes());
    let config = Config::builder()
        .source_url(server.url.clone())
        .arg0("sh")
        .build();

    let session = Session::new_async(config).await.unwrap();
    let output = session.execute(["-c", "printf async"]).await.unwrap();

    assert_eq!(output.stdout, b"async");
}
