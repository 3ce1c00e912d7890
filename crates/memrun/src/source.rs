//! Binary source resolution.
//!
//! Turns a [`Config`] into the bytes to execute. Embedded bytes are
//! returned as-is without touching the network. Otherwise the binary is
//! downloaded with a single HTTP GET and the whole body is returned.
//!
//! There is no retry and no status-code check: a non-success response is
//! logged and its body returned, which the loader will then reject if it
//! is not an executable.

use std::time::Duration;

use crate::config::Config;
use crate::error::Error;

/// Where the bytes for a configuration come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source<'a> {
    Embedded(&'a [u8]),
    Remote(&'a str),
}

impl<'a> Source<'a> {
    fn of(config: &'a Config) -> Result<Self, Error> {
        if let Some(binary) = config.binary().filter(|b| !b.is_empty()) {
            return Ok(Self::Embedded(binary));
        }
        if let Some(url) = config.source_url().filter(|u| !u.is_empty()) {
            return Ok(Self::Remote(url));
        }
        Err(Error::Configuration(
            "no binary source specified: set either the binary bytes or a source URL".to_string(),
        ))
    }
}

/// Resolve the bytes to execute, blocking on the download if one is needed.
///
/// Inside an async runtime the download runs on a separate thread and the
/// calling worker is blocked until it finishes. Prefer [`resolve_async`]
/// there.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the configuration has no source and
/// [`Error::Retrieval`] if the download fails.
pub fn resolve(config: &Config) -> Result<Vec<u8>, Error> {
    match Source::of(config)? {
        Source::Embedded(binary) => Ok(binary.to_vec()),
        Source::Remote(url) => fetch_blocking_anywhere(url, config.fetch_timeout()),
    }
}

/// Resolve the bytes to execute without blocking the async runtime.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the configuration has no source and
/// [`Error::Retrieval`] if the download fails.
pub async fn resolve_async(config: &Config) -> Result<Vec<u8>, Error> {
    match Source::of(config)? {
        Source::Embedded(binary) => Ok(binary.to_vec()),
        Source::Remote(url) => fetch(url, config.fetch_timeout()).await,
    }
}

fn retrieval(url: &str) -> impl FnOnce(reqwest::Error) -> Error + '_ {
    move |source| Error::Retrieval {
        url: url.to_string(),
        source,
    }
}

fn log_status(url: &str, status: reqwest::StatusCode) {
    if !status.is_success() {
        tracing::warn!(
            url,
            status = status.as_u16(),
            "binary download returned non-success status"
        );
    }
}

/// The blocking client owns a runtime, which may not be created or dropped
/// on a thread that is driving another runtime.
fn fetch_blocking_anywhere(url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, Error> {
    if tokio::runtime::Handle::try_current().is_err() {
        return fetch_blocking(url, timeout);
    }

    tracing::debug!(url, "blocking download inside a runtime, using a helper thread");
    let joined = std::thread::scope(|scope| scope.spawn(|| fetch_blocking(url, timeout)).join());
    match joined {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn fetch_blocking(url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, Error> {
    tracing::info!(url, "downloading binary");

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(retrieval(url))?;

    let response = client.get(url).send().map_err(retrieval(url))?;
    log_status(url, response.status());

    let body = response.bytes().map_err(retrieval(url))?;
    tracing::info!(url, size = body.len(), "binary downloaded");
    Ok(body.to_vec())
}

async fn fetch(url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, Error> {
    tracing::info!(url, "downloading binary");

    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build().map_err(retrieval(url))?;

    let response = client.get(url).send().await.map_err(retrieval(url))?;
    log_status(url, response.status());

    let body = response.bytes().await.map_err(retrieval(url))?;
    tracing::info!(url, size = body.len(), "binary downloaded");
    Ok(body.to_vec())
}
