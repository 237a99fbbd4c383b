//! Filename sanitization and extension derivation for manifest-driven downloads.
//!
//! Labels coming from manifests (group codes, session names) are free text typed
//! by people, so they are transliterated and scrubbed before becoming folder or
//! file names.

use url::Url;

/// Placeholder returned for empty labels.
pub const UNNAMED_FILE: &str = "unnamed_file";

/// Maximum length (in characters) of a sanitized label.
pub const MAX_LABEL_CHARS: usize = 200;

/// Maximum length of a URL-derived extension, including the leading dot.
pub const MAX_EXTENSION_CHARS: usize = 10;

/// Accented characters and their ASCII replacements.
const TRANSLITERATIONS: &[(char, char)] = &[
    ('á', 'a'),
    ('é', 'e'),
    ('í', 'i'),
    ('ó', 'o'),
    ('ú', 'u'),
    ('ñ', 'n'),
    ('ü', 'u'),
    ('Á', 'A'),
    ('É', 'E'),
    ('Í', 'I'),
    ('Ó', 'O'),
    ('Ú', 'U'),
    ('Ñ', 'N'),
    ('Ü', 'U'),
];

/// Sanitizes a free-text label into a filesystem-safe name.
///
/// - Accented characters from a fixed table are replaced with ASCII
/// - `< > : " / \ | ? *` become `_`
/// - The result is truncated to 200 characters
/// - Empty input yields [`UNNAMED_FILE`]
///
/// This is a total function: it never fails and never returns an empty string.
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    if label.is_empty() {
        return UNNAMED_FILE.to_string();
    }

    let sanitized: String = label
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => TRANSLITERATIONS
                .iter()
                .find(|(accented, _)| *accented == c)
                .map_or(c, |(_, ascii)| *ascii),
        })
        .take(MAX_LABEL_CHARS)
        .collect();

    if sanitized.is_empty() {
        UNNAMED_FILE.to_string()
    } else {
        sanitized
    }
}

/// Turns a sanitized label into a file-name component by replacing whitespace
/// runs with a single `_`.
///
/// Folder names keep their spaces (`Grupo N1`); file names do not
/// (`Sesion_3_foto_inicial.jpg`).
#[must_use]
pub fn file_stem_component(label: &str) -> String {
    let joined = label.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        UNNAMED_FILE.to_string()
    } else {
        joined
    }
}

/// Derives a lowercase file extension (with leading dot) from a URL path.
///
/// Only the last path segment is considered, after percent-decoding. Suffixes
/// longer than [`MAX_EXTENSION_CHARS`] (typically query-string or identifier
/// artifacts) are dropped entirely and `None` is returned.
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last_segment).ok()?;
    let dot_index = decoded.rfind('.')?;
    let ext = &decoded[dot_index..];
    if ext.chars().count() <= 1 || ext.chars().count() > MAX_EXTENSION_CHARS {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Returns the lowercase extension of a file name without the leading dot.
pub(crate) fn lowercase_extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}
