//! PDF first-page rasterisation via pdfium.
//!
//! pdfium is loaded at run time: a library next to the working directory is
//! preferred, then the system library. All pdfium calls are serialized through
//! a process-wide lock because library init/teardown is global state.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

use super::jpeg::write_canonical_jpeg;
use super::{FormatConverter, NormalizeError};

/// Render resolution for the first page.
pub const PDF_RENDER_DPI: f32 = 200.0;

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Converts the first page of a PDF document to the canonical JPEG.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfConverter;

impl PdfConverter {
    /// Whether a pdfium library can be bound on this host.
    #[must_use]
    pub fn is_available() -> bool {
        let _guard = PDFIUM_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match bind_pdfium() {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "pdfium library not available");
                false
            }
        }
    }
}

impl FormatConverter for PdfConverter {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), NormalizeError> {
        let image = {
            let _guard = PDFIUM_LOCK
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            render_first_page(source)?
        };
        write_canonical_jpeg(&image, target)?;
        info!(
            source = %source.display(),
            target = %target.display(),
            "converted PDF first page to JPEG"
        );
        Ok(())
    }
}

fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
}

/// Pixel width for a page `width_points` wide at [`PDF_RENDER_DPI`].
#[allow(clippy::cast_possible_truncation)]
fn target_width_px(width_points: f32) -> i32 {
    ((width_points * PDF_RENDER_DPI / POINTS_PER_INCH).round() as i32).max(1)
}

fn render_first_page(source: &Path) -> Result<DynamicImage, NormalizeError> {
    let pdfium = bind_pdfium().map_err(|e| NormalizeError::unsupported("pdf", format!("{e:?}")))?;

    let document = pdfium
        .load_pdf_from_file(source, None)
        .map_err(|e| NormalizeError::render(source, format!("{e:?}")))?;

    let pages = document.pages();
    if pages.is_empty() {
        return Err(NormalizeError::render(source, "document has no pages"));
    }

    let page = pages
        .get(0)
        .map_err(|e| NormalizeError::render(source, format!("{e:?}")))?;

    let width_px = target_width_px(page.width().value);
    let render_config = PdfRenderConfig::new().set_target_width(width_px);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| NormalizeError::render(source, format!("{e:?}")))?;

    let image = bitmap.as_image();
    debug!(
        width = image.width(),
        height = image.height(),
        "rendered first PDF page"
    );
    Ok(image)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_width_for_a4_at_200_dpi() {
        // A4 is 595 points wide: 595 * 200 / 72 = 1652.8
        assert_eq!(target_width_px(595.0), 1653);
    }

    #[test]
    fn test_target_width_for_letter_at_200_dpi() {
        assert_eq!(target_width_px(612.0), 1700);
    }

    #[test]
    fn test_target_width_never_zero() {
        assert_eq!(target_width_px(0.0), 1);
    }

    #[test]
    fn test_pdf_converter_rejects_garbage_and_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("asistencia.pdf");
        std::fs::write(&source, b"not a pdf at all").unwrap();
        let target = temp_dir.path().join("asistencia.jpg");

        let result = PdfConverter.convert(&source, &target);

        assert!(result.is_err());
        assert!(!target.exists());
        assert!(source.exists());
    }
}
