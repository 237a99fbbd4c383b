//! Pipeline configuration.

use std::time::Duration;

use serde::Serialize;

use crate::download::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, REQUEST_TIMEOUT_SECS,
};

/// Output folder used when none is given.
pub const DEFAULT_OUTPUT_DIR: &str = "Evidencias_Descargadas";

/// Default worker pool width.
pub const DEFAULT_WORKERS: usize = 6;

/// Smallest accepted worker pool width.
pub const MIN_WORKERS: usize = 1;

/// Largest accepted worker pool width.
pub const MAX_WORKERS: usize = 64;

/// Settings fixed at [`Pipeline`](super::Pipeline) construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    /// Number of tasks processed in parallel.
    pub workers: usize,
    /// Timeout for each HTTP request, body included.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following one.
    pub backoff_base: Duration,
    /// Whether conversion to JPEG was requested.
    pub convert_files: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BASE_DELAY,
            convert_files: true,
        }
    }
}
