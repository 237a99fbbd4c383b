//! Error types for manifest decoding.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading a manifest file.
///
/// A manifest that fails to read is skipped by the pipeline; the run goes on
/// with the remaining manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The file could not be read from disk.
    #[error("cannot read manifest {path}: {source}")]
    Io {
        /// The manifest path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not a supported tabular format.
    #[error("unsupported manifest format: {path}")]
    UnsupportedFormat {
        /// The manifest path.
        path: PathBuf,
    },

    /// No delimiter/encoding combination produced more than one column.
    #[error("could not detect delimiter or encoding for {path}")]
    NoDelimiterMatched {
        /// The manifest path.
        path: PathBuf,
    },

    /// The delimited text could not be parsed.
    #[error("malformed CSV in {path}: {source}")]
    Csv {
        /// The manifest path.
        path: PathBuf,
        /// The underlying parser error.
        #[source]
        source: csv::Error,
    },

    /// The spreadsheet could not be opened or read.
    #[error("cannot read spreadsheet {path}: {source}")]
    Spreadsheet {
        /// The manifest path.
        path: PathBuf,
        /// The underlying workbook error.
        #[source]
        source: calamine::Error,
    },

    /// The workbook has no sheet, or its first sheet has no header row.
    #[error("spreadsheet {path} has no data")]
    EmptySheet {
        /// The manifest path.
        path: PathBuf,
    },
}

impl ManifestError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a CSV error.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Creates a spreadsheet error.
    pub fn spreadsheet(path: impl Into<PathBuf>, source: calamine::Error) -> Self {
        Self::Spreadsheet {
            path: path.into(),
            source,
        }
    }
}
