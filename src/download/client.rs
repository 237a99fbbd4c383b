//! HTTP client wrapper for downloading files.
//!
//! This module provides the `HttpClient` struct which streams a response body
//! to a temporary sibling file and commits it with an atomic rename, so that
//! a reader never observes a truncated file at the final path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use super::error::DownloadError;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("evidencias-downloader/", env!("CARGO_PKG_VERSION"));

/// Suffix appended to the final path while a download is in flight.
pub const TEMP_SUFFIX: &str = ".tmp";

/// HTTP client for downloading files with streaming support.
///
/// This client is designed to be created once and shared by all workers,
/// taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use evidencias_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let bytes = client
///     .download_to_path("https://example.com/foto.jpg", Path::new("./out/foto.jpg"))
///     .await?;
/// println!("Downloaded {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 10 seconds
    /// - Request timeout: 30 seconds
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
        .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be initialized.
    pub fn with_timeouts(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Downloads `url` and commits it at `final_path`.
    ///
    /// The body is streamed to `<final_path>.tmp`; only when the stream has
    /// completed and at least one byte was written is the temp file renamed to
    /// `final_path`. On any failure the temp file is removed and nothing is
    /// left at `final_path`.
    ///
    /// # Returns
    ///
    /// The number of bytes committed.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns a non-success status
    /// - The body is empty or interrupted
    /// - Writing or renaming on disk fails
    #[instrument(skip(self), fields(url = %url, path = %final_path.display()))]
    pub async fn download_to_path(&self, url: &str, final_path: &Path) -> Result<u64, DownloadError> {
        debug!("starting download");

        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.send_request(url).await?;

        let temp_path = temp_path_for(final_path);
        let stream_result = stream_to_temp(response, url, &temp_path).await;

        let bytes_written = match stream_result {
            Ok(0) => {
                remove_temp(&temp_path).await;
                return Err(DownloadError::empty_body(url));
            }
            Ok(bytes) => bytes,
            Err(error) => {
                remove_temp(&temp_path).await;
                return Err(error);
            }
        };

        if let Err(e) = tokio::fs::rename(&temp_path, final_path).await {
            remove_temp(&temp_path).await;
            return Err(DownloadError::io(final_path, e));
        }

        debug!(bytes = bytes_written, "download committed");
        Ok(bytes_written)
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        if !response.status().is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                response.status().as_u16(),
                retry_after,
            ));
        }

        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Returns the in-flight sibling path for `final_path` (`<final>.tmp`).
#[must_use]
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

async fn remove_temp(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(path = %temp_path.display(), "removed partial temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %temp_path.display(), error = %e, "could not remove temp file"),
    }
}

/// Streams response body to the temp file, returning bytes written.
async fn stream_to_temp(
    response: reqwest::Response,
    url: &str,
    temp_path: &Path,
) -> Result<u64, DownloadError> {
    let file = File::create(temp_path)
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;

    Ok(bytes_written)
}
