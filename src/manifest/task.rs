//! Download task derivation from manifest rows.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ManifestRow;
use crate::download::{extension_from_url, file_stem_component, sanitize_label};

/// Header of the group code column.
pub const GROUP_COLUMN: &str = "Código del grupo";

/// Header of the session column.
pub const SESSION_COLUMN: &str = "Sesión";

/// Folder used when a row has no group code.
pub const DEFAULT_GROUP: &str = "no_group";

/// The evidence slot a task fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Attendance sheet.
    Attendance,
    /// Photo taken at the start of the session.
    PhotoStart,
    /// Photo taken at the end of the session.
    PhotoEnd,
}

impl TaskKind {
    /// All kinds in the order tasks are emitted for a row.
    pub const ALL: [Self; 3] = [Self::Attendance, Self::PhotoStart, Self::PhotoEnd];

    /// Label used in file names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Attendance => "asistencia",
            Self::PhotoStart => "foto_inicial",
            Self::PhotoEnd => "foto_final",
        }
    }

    /// Manifest header holding this slot's URL.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Attendance => "Archivo asistencia",
            Self::PhotoStart => "Archivo foto inicial",
            Self::PhotoEnd => "Archivo foto final",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One file to fetch. Immutable once derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTask {
    /// Remote URL, trimmed.
    pub url: String,
    /// `<session>_<kind><ext>`.
    pub filename: String,
    /// Folder the file lands in.
    pub target_folder: PathBuf,
    /// Sanitized group label.
    pub group: String,
    /// Sanitized session label.
    pub session: String,
    /// Which slot of the row this came from.
    pub kind: TaskKind,
}

impl DownloadTask {
    /// Path the download is committed to before normalization.
    #[must_use]
    pub fn final_path(&self) -> PathBuf {
        self.target_folder.join(&self.filename)
    }

    /// Extension-less output location. Tasks for the same group, session and
    /// kind share it even when their URLs carry different extensions, since
    /// the original and its converted JPEG both land there.
    #[must_use]
    pub fn slot(&self) -> PathBuf {
        self.target_folder.join(format!(
            "{}_{}",
            file_stem_component(&self.session),
            self.kind.label()
        ))
    }
}

/// Derives zero to three download tasks from one manifest row.
///
/// Group and session default to [`DEFAULT_GROUP`] and `session_<index + 1>`
/// and are sanitized. Files land in `output_root/<group>/`; the file name joins
/// whitespace in the session label with `_`. Missing or empty URL cells yield
/// no task for that slot.
#[must_use]
pub fn derive_tasks(row: &ManifestRow, output_root: &Path) -> Vec<DownloadTask> {
    let group = sanitize_label(row.get(GROUP_COLUMN).unwrap_or(DEFAULT_GROUP));
    let session = match row.get(SESSION_COLUMN) {
        Some(session) => sanitize_label(session),
        None => format!("session_{}", row.index + 1),
    };
    let target_folder = output_root.join(&group);
    let stem = file_stem_component(&session);

    TaskKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let url = row.get(kind.column())?;
            let ext = extension_from_url(url).unwrap_or_default();
            Some(DownloadTask {
                url: url.to_string(),
                filename: format!("{stem}_{}{ext}", kind.label()),
                target_folder: target_folder.clone(),
                group: group.clone(),
                session: session.clone(),
                kind,
            })
        })
        .collect()
}
