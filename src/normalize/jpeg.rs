//! Canonical JPEG writer shared by every converter.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use super::NormalizeError;
use crate::download::temp_path_for;

/// JPEG quality used for every converted file.
pub const JPEG_QUALITY: u8 = 90;

/// Encodes `image` as a 3-channel RGB JPEG at `target`.
///
/// The encoded bytes go to `<target>.tmp` first and are renamed into place
/// once complete; a failed encode leaves neither file behind.
///
/// # Errors
///
/// Returns [`NormalizeError::Encode`] when encoding fails and
/// [`NormalizeError::Io`] for file system failures.
pub fn write_canonical_jpeg(image: &DynamicImage, target: &Path) -> Result<(), NormalizeError> {
    let rgb = image.to_rgb8();
    let temp_path = temp_path_for(target);

    let result = encode_to(&rgb, &temp_path, target);
    if result.is_err() {
        remove_temp(&temp_path);
        return result;
    }

    std::fs::rename(&temp_path, target).map_err(|e| {
        remove_temp(&temp_path);
        NormalizeError::io(target, e)
    })?;

    debug!(
        path = %target.display(),
        width = rgb.width(),
        height = rgb.height(),
        "wrote canonical jpeg"
    );
    Ok(())
}

fn remove_temp(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "could not remove temp jpeg");
    }
}

fn encode_to(rgb: &image::RgbImage, temp_path: &Path, target: &Path) -> Result<(), NormalizeError> {
    let file = File::create(temp_path).map_err(|e| NormalizeError::io(temp_path, e))?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| NormalizeError::encode(target, e))?;
    writer.flush().map_err(|e| NormalizeError::io(temp_path, e))?;
    Ok(())
}
