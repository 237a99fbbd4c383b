//! Tabular manifest decoding.
//!
//! Delimited text is sniffed: each delimiter in [`CSV_DELIMITERS`] is tried
//! with each encoding in [`TextEncoding::ALL`], and the first combination whose
//! header has more than one column wins. Spreadsheets are read through
//! `calamine` (first worksheet, first row as header).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use tracing::{debug, instrument};

use super::ManifestError;
use crate::download::lowercase_extension;

/// Manifest extensions picked up from the input folder (lowercase, no dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls", "xlsm", "ods"];

/// Delimiters tried, in order, for delimited text.
pub const CSV_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Character encodings tried for delimited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Strict UTF-8; a leading BOM is stripped.
    Utf8,
    /// Latin-1, one byte per code point.
    Latin1,
    /// ISO-8859-1 (same mapping as Latin-1).
    Iso88591,
    /// Windows code page 1252.
    Cp1252,
}

impl TextEncoding {
    /// Encodings in the order they are tried.
    pub const ALL: [Self; 4] = [Self::Utf8, Self::Latin1, Self::Iso88591, Self::Cp1252];

    /// Human-readable encoding name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
            Self::Iso88591 => "iso-8859-1",
            Self::Cp1252 => "cp1252",
        }
    }

    /// Decodes `bytes`, or `None` if they are not valid in this encoding.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(bytes).ok().map(str::to_owned)
            }
            Self::Latin1 | Self::Iso88591 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Cp1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(std::borrow::Cow::into_owned),
        }
    }
}

/// One data row of a manifest, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRow {
    /// Zero-based position among the manifest's data rows.
    pub index: usize,
    cells: HashMap<String, String>,
}

impl ManifestRow {
    /// Builds a row from `(header, value)` pairs. Values are trimmed; for
    /// duplicated headers the first occurrence wins.
    pub fn from_pairs<I, K, V>(index: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut cells = HashMap::new();
        for (key, value) in pairs {
            cells
                .entry(key.into())
                .or_insert_with(|| value.as_ref().trim().to_string());
        }
        Self { index, cells }
    }

    /// Returns the trimmed cell under `column`, or `None` when the column is
    /// missing or the cell is empty.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn is_blank(&self) -> bool {
        self.cells.values().all(String::is_empty)
    }
}

/// A decoded manifest file.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Where the manifest was read from.
    pub path: PathBuf,
    /// Header row, trimmed.
    pub headers: Vec<String>,
    /// Non-blank data rows in file order.
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    /// The manifest's file stem, used as its output sub-folder name.
    #[must_use]
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Whether `path` has a supported manifest extension (case-insensitive).
#[must_use]
pub fn is_supported_manifest(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(lowercase_extension)
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reads a manifest file, dispatching on its extension.
///
/// # Errors
///
/// Returns [`ManifestError`] when the file is unreadable, has an unsupported
/// extension, or cannot be decoded.
#[instrument(fields(path = %path.display()))]
pub fn read_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let ext = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(lowercase_extension);

    let (headers, rows) = match ext.as_deref() {
        Some("csv") => read_delimited(path)?,
        Some("xlsx" | "xls" | "xlsm" | "ods") => read_spreadsheet(path)?,
        _ => {
            return Err(ManifestError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };

    let rows = build_rows(&headers, rows);
    debug!(columns = headers.len(), rows = rows.len(), "manifest decoded");

    Ok(Manifest {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

fn build_rows(headers: &[String], raw_rows: Vec<Vec<String>>) -> Vec<ManifestRow> {
    raw_rows
        .into_iter()
        .map(|cells| headers.iter().cloned().zip(cells))
        .map(|pairs| ManifestRow::from_pairs(0, pairs))
        .filter(|row| !row.is_blank())
        .enumerate()
        .map(|(index, row)| ManifestRow { index, ..row })
        .collect()
}

type Table = (Vec<String>, Vec<Vec<String>>);

fn read_delimited(path: &Path) -> Result<Table, ManifestError> {
    let bytes = std::fs::read(path).map_err(|e| ManifestError::io(path, e))?;

    for delimiter in CSV_DELIMITERS {
        for encoding in TextEncoding::ALL {
            let Some(text) = encoding.decode(&bytes) else {
                continue;
            };
            if let Some(table) = parse_delimited(path, &text, delimiter)? {
                debug!(
                    delimiter = %char::from(delimiter).escape_default(),
                    encoding = encoding.label(),
                    "detected CSV dialect"
                );
                return Ok(table);
            }
        }
    }

    Err(ManifestError::NoDelimiterMatched {
        path: path.to_path_buf(),
    })
}

/// Parses `text`; `Ok(None)` when the header has one column or fewer.
fn parse_delimited(path: &Path, text: &str, delimiter: u8) -> Result<Option<Table>, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ManifestError::csv(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.len() <= 1 {
        return Ok(None);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ManifestError::csv(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Some((headers, rows)))
}

fn read_spreadsheet(path: &Path) -> Result<Table, ManifestError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ManifestError::spreadsheet(path, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ManifestError::EmptySheet {
            path: path.to_path_buf(),
        })?
        .map_err(|e| ManifestError::spreadsheet(path, e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| ManifestError::EmptySheet {
            path: path.to_path_buf(),
        })?
        .iter()
        .map(|cell| cell_to_string(cell).trim().to_string())
        .collect();

    let data = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    Ok((headers, data))
}

/// Renders a spreadsheet cell as text; whole floats lose their `.0`.
#[allow(clippy::cast_possible_truncation)]
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
