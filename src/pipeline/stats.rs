//! Thread-safe run statistics.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::{DownloadOutcome, OutcomeStatus};

/// Aggregate counters for one pipeline run.
///
/// At completion `total == successful + failed + skipped`; `converted` and
/// `conversion_failed` sub-classify `successful`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Tasks derived from all manifests.
    pub total: u64,
    /// Tasks that ended with a fresh file on disk.
    pub successful: u64,
    /// Tasks that could not be fetched.
    pub failed: u64,
    /// Tasks whose target already existed.
    pub skipped: u64,
    /// Successful tasks that were converted.
    pub converted: u64,
    /// Successful tasks whose conversion failed.
    pub conversion_failed: u64,
}

impl PipelineStats {
    /// `successful / total` as a percentage, or `None` when nothing ran.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.successful as f64 / self.total as f64 * 100.0)
    }

    /// Number of tasks with a terminal status recorded.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.successful + self.failed + self.skipped
    }
}

/// Shares [`PipelineStats`] between workers.
///
/// The lock is held only for a counter update; no I/O happens under it.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<PipelineStats>,
}

impl StatsAggregator {
    /// Creates a zeroed aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PipelineStats> {
        // counters stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `count` derived tasks to `total`.
    pub fn record_planned(&self, count: usize) {
        self.lock().total += count as u64;
    }

    /// Folds one terminal outcome into the counters.
    pub fn record(&self, outcome: &DownloadOutcome) {
        self.record_status(outcome.status);
    }

    /// Folds one terminal status into the counters.
    pub fn record_status(&self, status: OutcomeStatus) {
        let mut stats = self.lock();
        match status {
            OutcomeStatus::Downloaded => stats.successful += 1,
            OutcomeStatus::Converted => {
                stats.successful += 1;
                stats.converted += 1;
            }
            OutcomeStatus::ConversionFailed => {
                stats.successful += 1;
                stats.conversion_failed += 1;
            }
            OutcomeStatus::SkippedExisting => stats.skipped += 1,
            OutcomeStatus::Failed => stats.failed += 1,
        }
    }

    /// Returns a consistent copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> PipelineStats {
        *self.lock()
    }
}
