//! Terminal classification of one download task.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::manifest::DownloadTask;

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Fetched and kept as-is.
    Downloaded,
    /// The target already existed; no request was made.
    SkippedExisting,
    /// The fetch failed; nothing was committed.
    Failed,
    /// Fetched and converted to the canonical format.
    Converted,
    /// Fetched, but conversion failed; the original file was kept.
    ConversionFailed,
}

impl OutcomeStatus {
    /// Whether a usable file exists for this task after a fresh fetch.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::Downloaded | Self::Converted | Self::ConversionFailed
        )
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Downloaded => "downloaded",
            Self::SkippedExisting => "skipped_existing",
            Self::Failed => "failed",
            Self::Converted => "converted",
            Self::ConversionFailed => "conversion_failed",
        };
        f.write_str(s)
    }
}

/// Result of one task. Produced once by the fetcher, then only read.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    /// The task this outcome belongs to.
    pub task: DownloadTask,
    /// Terminal status.
    pub status: OutcomeStatus,
    /// File left on disk, if any.
    pub final_path: Option<PathBuf>,
    /// Bytes committed by the download (0 when skipped or failed).
    pub bytes: u64,
    /// HTTP attempts made (0 when skipped).
    pub attempts: u32,
    /// Last error, for failed tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadOutcome {
    /// Outcome for a target that was already on disk.
    #[must_use]
    pub fn skipped(task: DownloadTask, existing: PathBuf) -> Self {
        Self {
            task,
            status: OutcomeStatus::SkippedExisting,
            final_path: Some(existing),
            bytes: 0,
            attempts: 0,
            error: None,
        }
    }

    /// Outcome for a task that could not be fetched.
    #[must_use]
    pub fn failed(task: DownloadTask, attempts: u32, error: impl fmt::Display) -> Self {
        Self {
            task,
            status: OutcomeStatus::Failed,
            final_path: None,
            bytes: 0,
            attempts,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status_success_classes() {
        assert!(OutcomeStatus::Downloaded.is_success());
        assert!(OutcomeStatus::Converted.is_success());
        assert!(OutcomeStatus::ConversionFailed.is_success());
        assert!(!OutcomeStatus::SkippedExisting.is_success());
        assert!(!OutcomeStatus::Failed.is_success());
    }

    #[test]
    fn test_outcome_status_display_matches_serde() {
        for status in [
            OutcomeStatus::Downloaded,
            OutcomeStatus::SkippedExisting,
            OutcomeStatus::Failed,
            OutcomeStatus::Converted,
            OutcomeStatus::ConversionFailed,
        ] {
            let json = serde_json::to_string(&status).unwrap_or_default();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
