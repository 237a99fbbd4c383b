//! HEIC/HEIF photo conversion.
//!
//! Decoding goes through libheif and is only compiled with the `heic` cargo
//! feature. Builds without it report the converter as unavailable.

use std::path::Path;

use tracing::info;

use super::jpeg::write_canonical_jpeg;
use super::{FormatConverter, NormalizeError};

/// Converts camera-native HEIC/HEIF stills to the canonical JPEG.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeicConverter;

impl HeicConverter {
    /// Whether HEIC decoding was compiled into this build.
    #[must_use]
    pub fn is_available() -> bool {
        cfg!(feature = "heic")
    }
}

impl FormatConverter for HeicConverter {
    fn name(&self) -> &'static str {
        "heic"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["heic", "heif"]
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), NormalizeError> {
        let image = decode_heic(source)?;
        write_canonical_jpeg(&image, target)?;
        info!(
            source = %source.display(),
            target = %target.display(),
            "converted HEIC to JPEG"
        );
        Ok(())
    }
}

#[cfg(feature = "heic")]
fn decode_heic(source: &Path) -> Result<image::DynamicImage, NormalizeError> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let path_str = source
        .to_str()
        .ok_or_else(|| NormalizeError::decode(source, "path is not valid UTF-8"))?;

    let lib_heif = LibHeif::new();
    let context = HeifContext::read_from_file(path_str)
        .map_err(|e| NormalizeError::decode(source, e.to_string()))?;
    let handle = context
        .primary_image_handle()
        .map_err(|e| NormalizeError::decode(source, e.to_string()))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| NormalizeError::decode(source, e.to_string()))?;

    let planes = decoded.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| NormalizeError::decode(source, "no interleaved RGB plane"))?;

    let width = interleaved.width;
    let height = interleaved.height;
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in interleaved.data.chunks(interleaved.stride).take(height as usize) {
        let row = row
            .get(..row_bytes)
            .ok_or_else(|| NormalizeError::decode(source, "truncated pixel row"))?;
        pixels.extend_from_slice(row);
    }

    let rgb = image::RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| NormalizeError::decode(source, "pixel buffer size mismatch"))?;
    Ok(image::DynamicImage::ImageRgb8(rgb))
}

#[cfg(not(feature = "heic"))]
fn decode_heic(_source: &Path) -> Result<image::DynamicImage, NormalizeError> {
    Err(NormalizeError::unsupported(
        "heic",
        "built without the `heic` feature",
    ))
}
