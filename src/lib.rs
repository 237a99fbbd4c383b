//! Evidencias Core Library
//!
//! This library turns tabular manifests (CSV or spreadsheet rows naming remote
//! evidence files by URL) into a populated local directory tree, converting
//! camera-native photos and PDF documents to JPEG along the way.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Filename sanitization, streaming HTTP client, retry policy, fetcher
//! - [`manifest`] - Manifest decoding and download task derivation
//! - [`normalize`] - Post-download conversion to the canonical JPEG format
//! - [`pipeline`] - Concurrent orchestration, outcomes, and run statistics
//! - [`server`] - HTTP upload service that returns a zipped result tree

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod manifest;
pub mod normalize;
pub mod pipeline;
pub mod server;
#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, FailureType, Fetcher, HttpClient, RetryDecision,
    RetryPolicy, classify_error, extension_from_url, sanitize_label,
};
pub use manifest::{
    DownloadTask, Manifest, ManifestError, ManifestRow, TaskKind, derive_tasks, read_manifest,
};
pub use normalize::{
    CANONICAL_EXTENSION, ConversionSupport, FormatConverter, NormalizeError, NormalizeResult,
    Normalizer,
};
pub use pipeline::{
    DEFAULT_WORKERS, DownloadOutcome, OutcomeStatus, Pipeline, PipelineConfig, PipelineError,
    PipelineStats, RunReport, StatsAggregator,
};
pub use server::{ServerError, ServiceConfig, create_router, start_server};
