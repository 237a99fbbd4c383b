//! Zip packaging of a result tree.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ServerError;

/// Writes every regular file under `source` into a deflated zip at `archive`.
///
/// Entry names are relative to `source` and use `/` separators. Returns the
/// number of files written.
///
/// # Errors
///
/// Returns [`ServerError::Io`] when walking or reading fails and
/// [`ServerError::Archive`] when the zip cannot be written.
pub fn zip_directory(source: &Path, archive: &Path) -> Result<usize, ServerError> {
    let file = File::create(archive).map_err(|e| ServerError::io("creating archive", e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| ServerError::io("walking output folder", e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name, options)?;
        let mut input =
            File::open(entry.path()).map_err(|e| ServerError::io("reading result file", e))?;
        std::io::copy(&mut input, &mut zip).map_err(|e| ServerError::io("writing archive", e))?;
        count += 1;
    }

    zip.finish()?;
    debug!(files = count, archive = %archive.display(), "archive written");
    Ok(count)
}
