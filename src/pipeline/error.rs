//! Run-level errors. Per-task failures never surface here.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a pipeline before any task is dispatched.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Worker count outside the accepted range.
    #[error("invalid worker count {value}: must be between {min} and {max}")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// The input folder exists but cannot be listed.
    #[error("cannot read input folder {path}: {source}")]
    InputUnreadable {
        /// The input folder.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The output folder cannot be created.
    #[error("cannot create output folder {path}: {source}")]
    OutputUnavailable {
        /// The output folder.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The shared HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
