//! Error types for post-download normalization.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while converting a downloaded file to JPEG.
///
/// None of these escalate to a failed task: the original file is kept and the
/// outcome is reported as a conversion failure.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The source file could not be decoded.
    #[error("failed to decode {path}: {detail}")]
    Decode {
        /// The file that failed to decode.
        path: PathBuf,
        /// Decoder-specific description.
        detail: String,
    },

    /// The decoded image could not be encoded as JPEG.
    #[error("failed to encode {path}: {source}")]
    Encode {
        /// The output path being written.
        path: PathBuf,
        /// The underlying encoder error.
        #[source]
        source: image::ImageError,
    },

    /// A paginated document could not be rendered.
    #[error("failed to render {path}: {detail}")]
    Render {
        /// The document that failed to render.
        path: PathBuf,
        /// Renderer-specific description.
        detail: String,
    },

    /// The converter for this format is not available in this build or host.
    #[error("{format} conversion unavailable: {reason}")]
    Unsupported {
        /// Format name (e.g. `heic`, `pdf`).
        format: &'static str,
        /// Why the converter cannot run.
        reason: String,
    },

    /// File system error while reading, writing or renaming.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl NormalizeError {
    /// Creates a decode error.
    pub fn decode(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }

    /// Creates a render error.
    pub fn render(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Render {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Creates an unsupported-converter error.
    pub fn unsupported(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            format,
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
