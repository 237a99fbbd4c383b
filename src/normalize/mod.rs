//! Post-download normalization to the canonical JPEG format.
//!
//! Dispatch is purely on file extension. Camera-native stills (HEIC/HEIF) are
//! re-encoded, PDF documents have their first page rendered, and everything
//! else passes through untouched. A failed conversion never fails the task:
//! the original file stays in place and the outcome says so.
//!
//! # Example
//!
//! ```no_run
//! use evidencias_core::normalize::Normalizer;
//! use std::path::Path;
//!
//! let normalizer = Normalizer::new(true);
//! let result = normalizer.normalize(Path::new("./out/Grupo A/S1_foto_inicial.heic"));
//! println!("final file: {}", result.final_path.display());
//! ```

mod error;
mod heic;
mod jpeg;
mod pdf;

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

pub use error::NormalizeError;
pub use heic::HeicConverter;
pub use jpeg::{JPEG_QUALITY, write_canonical_jpeg};
pub use pdf::{PDF_RENDER_DPI, PdfConverter};

use crate::download::lowercase_extension;
use crate::pipeline::OutcomeStatus;

/// Extension (without dot) of every converted file.
pub const CANONICAL_EXTENSION: &str = "jpg";

/// A converter from one family of source formats to the canonical JPEG.
///
/// Implementations must write `target` atomically (or not at all) and must
/// leave `source` untouched; the [`Normalizer`] owns deleting the original.
pub trait FormatConverter: Send + Sync + Debug {
    /// Short name used in logs (`heic`, `pdf`).
    fn name(&self) -> &'static str;

    /// Lowercase extensions (without dot) this converter accepts.
    fn extensions(&self) -> &'static [&'static str];

    /// Converts `source` into a JPEG at `target`.
    ///
    /// # Errors
    ///
    /// Returns a [`NormalizeError`] when the source cannot be decoded or
    /// rendered or the JPEG cannot be written.
    fn convert(&self, source: &Path, target: &Path) -> Result<(), NormalizeError>;
}

/// What the normalizer did with one committed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeResult {
    /// Path of the file that remains on disk.
    pub final_path: PathBuf,
    /// Whether a new canonical file replaced the original.
    pub converted: bool,
    /// `Downloaded` for pass-through, `Converted` or `ConversionFailed` otherwise.
    pub status: OutcomeStatus,
}

impl NormalizeResult {
    fn pass_through(path: &Path) -> Self {
        Self {
            final_path: path.to_path_buf(),
            converted: false,
            status: OutcomeStatus::Downloaded,
        }
    }
}

/// Which converters can actually run in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSupport {
    /// HEIC decoding was compiled in.
    pub heic: bool,
    /// A pdfium library could be bound.
    pub pdf: bool,
}

impl ConversionSupport {
    /// Probes the build and the host for converter availability.
    #[must_use]
    pub fn probe() -> Self {
        let support = Self {
            heic: HeicConverter::is_available(),
            pdf: PdfConverter::is_available(),
        };
        debug!(heic = support.heic, pdf = support.pdf, "probed conversion support");
        support
    }

    /// True when every converter is usable.
    #[must_use]
    pub fn all_available(&self) -> bool {
        self.heic && self.pdf
    }

    /// Decides whether conversion runs, given what the user asked for.
    ///
    /// Conversion is all-or-nothing: if any converter is missing a warning is
    /// logged and every file passes through unchanged.
    #[must_use]
    pub fn resolve(&self, requested: bool) -> bool {
        if !requested {
            info!("file conversion disabled by configuration");
            return false;
        }
        if !self.heic {
            warn!("HEIC support not built in (enable the `heic` feature); file conversion disabled");
        }
        if !self.pdf {
            warn!("pdfium library not found; file conversion disabled");
        }
        self.all_available()
    }
}

/// Converts committed downloads to the canonical format when required.
///
/// Cheap to clone; converters are shared behind `Arc`.
#[derive(Debug, Clone)]
pub struct Normalizer {
    enabled: bool,
    converters: Vec<Arc<dyn FormatConverter>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Normalizer {
    /// Creates a normalizer with the HEIC and PDF converters.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self::with_converters(
            enabled,
            vec![Arc::new(HeicConverter), Arc::new(PdfConverter)],
        )
    }

    /// Creates a normalizer that passes every file through.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Creates a normalizer with an explicit converter set.
    #[must_use]
    pub fn with_converters(enabled: bool, converters: Vec<Arc<dyn FormatConverter>>) -> Self {
        Self {
            enabled,
            converters,
        }
    }

    /// Returns this normalizer with conversion switched on or off, keeping
    /// its converters.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether conversion is attempted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn converter_for(&self, path: &Path) -> Option<&Arc<dyn FormatConverter>> {
        if !self.enabled {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        let ext = lowercase_extension(name)?;
        self.converters
            .iter()
            .find(|c| c.extensions().contains(&ext.as_str()))
    }

    /// Returns the canonical path `path` would be converted to, or `None` if
    /// the file would pass through unchanged.
    #[must_use]
    pub fn normalized_path(&self, path: &Path) -> Option<PathBuf> {
        self.converter_for(path)
            .map(|_| path.with_extension(CANONICAL_EXTENSION))
    }

    /// Normalizes one committed file.
    ///
    /// On success the original is deleted and the canonical file remains. On
    /// failure the original is kept and no canonical file is left behind.
    #[must_use]
    pub fn normalize(&self, path: &Path) -> NormalizeResult {
        let Some(converter) = self.converter_for(path) else {
            return NormalizeResult::pass_through(path);
        };
        let target = path.with_extension(CANONICAL_EXTENSION);

        match converter.convert(path, &target) {
            Ok(()) => {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "converted but could not remove original"
                    );
                }
                NormalizeResult {
                    final_path: target,
                    converted: true,
                    status: OutcomeStatus::Converted,
                }
            }
            Err(e) => {
                warn!(
                    converter = converter.name(),
                    path = %path.display(),
                    error = %e,
                    "conversion failed, keeping original"
                );
                if target.exists()
                    && let Err(e) = std::fs::remove_file(&target)
                {
                    debug!(
                        path = %target.display(),
                        error = %e,
                        "could not remove partial conversion"
                    );
                }
                NormalizeResult {
                    final_path: path.to_path_buf(),
                    converted: false,
                    status: OutcomeStatus::ConversionFailed,
                }
            }
        }
    }

    /// Runs [`Normalizer::normalize`] on the blocking thread pool.
    pub async fn normalize_async(&self, path: PathBuf) -> NormalizeResult {
        if self.converter_for(&path).is_none() {
            return NormalizeResult::pass_through(&path);
        }
        let normalizer = self.clone();
        let fallback = path.clone();
        match tokio::task::spawn_blocking(move || normalizer.normalize(&path)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %fallback.display(), error = %e, "conversion task panicked");
                NormalizeResult {
                    final_path: fallback,
                    converted: false,
                    status: OutcomeStatus::ConversionFailed,
                }
            }
        }
    }
}
