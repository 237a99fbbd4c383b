//! Manifest decoding and download task derivation.
//!
//! A manifest is a CSV or spreadsheet file whose rows describe one session's
//! evidence: a group code, a session label and up to three file URLs.
//!
//! # Example
//!
//! ```no_run
//! use evidencias_core::manifest::{derive_tasks, read_manifest};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = read_manifest(Path::new("input/curso_a.csv"))?;
//! let root = Path::new("out").join(manifest.base_name());
//! for row in &manifest.rows {
//!     for task in derive_tasks(row, &root) {
//!         println!("{} -> {}", task.url, task.final_path().display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod reader;
mod task;

pub use error::ManifestError;
pub use reader::{
    CSV_DELIMITERS, Manifest, ManifestRow, SUPPORTED_EXTENSIONS, TextEncoding,
    is_supported_manifest, read_manifest,
};
pub use task::{
    DEFAULT_GROUP, DownloadTask, GROUP_COLUMN, SESSION_COLUMN, TaskKind, derive_tasks,
};
