//! Remote text and binary downloads with an on-disk cache.

use crate::error::PipelineError;
use crate::persistence::atomic_write;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Capability for fetching remote resources.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch a newline-delimited text resource as individual lines.
    async fn fetch_text(&self, url: &str) -> Result<Vec<String>, PipelineError>;

    /// Fetch a binary resource.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

/// [`RemoteSource`] backed by `reqwest`.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("wildsnap/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, PipelineError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::network(format!("GET {url} returned {status}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch_text(&self, url: &str) -> Result<Vec<String>, PipelineError> {
        let bytes = self.get(url).await?.bytes().await?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| PipelineError::network(format!("{url} is not UTF-8 text: {e}")))?;
        Ok(parse_lines(text))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let bytes = self.get(url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Split text into lines, dropping trailing blank lines.
///
/// Trailing blanks would not survive a newline-join round trip, so keeping
/// them would make the written line count disagree with the label count.
pub fn parse_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines
}

/// Where a fetched resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    Remote,
    Cache,
}

/// Fetch a line list, reusing `cache_path` when it already holds one.
///
/// `normalize` is applied to cached and fresh lists alike; a list that
/// normalizes to nothing is malformed. A cached copy in that state is ignored
/// and a fresh one is never written back.
pub async fn fetch_lines_cached(
    source: &dyn RemoteSource,
    url: &str,
    cache_path: &Path,
    normalize: fn(Vec<String>) -> Vec<String>,
) -> Result<(Vec<String>, FetchOrigin), PipelineError> {
    if let Ok(cached) = tokio::fs::read_to_string(cache_path).await {
        let lines = normalize(parse_lines(&cached));
        if !lines.is_empty() {
            tracing::debug!(path = %cache_path.display(), "Using cached copy");
            return Ok((lines, FetchOrigin::Cache));
        }
        tracing::warn!(path = %cache_path.display(), "Ignoring empty cached copy");
    }

    let raw = parse_lines(&source.fetch_text(url).await?.join("\n"));
    let lines = normalize(raw.clone());
    if lines.is_empty() {
        return Err(PipelineError::network(format!("{url} returned an empty list")));
    }

    if let Err(e) = atomic_write(cache_path, raw.join("\n").as_bytes()) {
        tracing::warn!(error = %e, path = %cache_path.display(), "Could not cache download");
    }
    Ok((lines, FetchOrigin::Remote))
}

/// Download a binary file into `cache_path` unless it is already there.
pub async fn download_cached(
    source: &dyn RemoteSource,
    url: &str,
    cache_path: &Path,
) -> Result<(PathBuf, FetchOrigin), PipelineError> {
    if tokio::fs::metadata(cache_path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
    {
        tracing::debug!(path = %cache_path.display(), "Using cached download");
        return Ok((cache_path.to_path_buf(), FetchOrigin::Cache));
    }

    tracing::info!(url, "Downloading");
    let bytes = source.fetch_bytes(url).await?;
    if bytes.is_empty() {
        return Err(PipelineError::network(format!("{url} returned an empty body")));
    }
    atomic_write(cache_path, &bytes)?;
    Ok((cache_path.to_path_buf(), FetchOrigin::Remote))
}
