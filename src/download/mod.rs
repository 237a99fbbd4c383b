//! Resilient HTTP downloads for manifest tasks.
//!
//! # Features
//!
//! - Streaming downloads to `<final>.tmp` with an atomic rename on success
//! - Filesystem-safe names derived from free-text manifest labels
//! - Explicit retry contract (attempt cap, retryable statuses, backoff, Retry-After)
//! - Idempotent [`Fetcher`] that skips work already on disk
//!
//! # Example
//!
//! ```no_run
//! use evidencias_core::download::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let bytes = client
//!     .download_to_path("https://example.com/lista.pdf", Path::new("./out/S1_asistencia.pdf"))
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod fetcher;
mod filename;
mod retry;

pub use client::{HttpClient, TEMP_SUFFIX, USER_AGENT, temp_path_for};
pub use constants::{CONNECT_TIMEOUT_SECS, MAX_RETRY_AFTER, REQUEST_TIMEOUT_SECS};
pub use error::DownloadError;
pub use fetcher::Fetcher;
pub(crate) use filename::lowercase_extension;
pub use filename::{
    MAX_EXTENSION_CHARS, MAX_LABEL_CHARS, UNNAMED_FILE, extension_from_url, file_stem_component,
    sanitize_label,
};
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, FailureType, RETRYABLE_STATUSES, RetryDecision,
    RetryPolicy, classify_error, parse_retry_after,
};
