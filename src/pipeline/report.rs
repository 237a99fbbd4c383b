//! End-of-run summary.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::{DownloadOutcome, PipelineStats};

/// Everything a caller needs to know about a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identifier shared by every log line of the run.
    pub run_id: String,
    /// Final counters.
    pub stats: PipelineStats,
    /// Wall-clock duration.
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Root of the produced tree.
    pub output_dir: PathBuf,
    /// Manifests decoded successfully.
    pub manifests_read: usize,
    /// Manifests skipped because they could not be decoded.
    pub manifests_skipped: usize,
    /// Whether conversion was active for this run.
    pub conversion_enabled: bool,
    /// One outcome per task, in task order.
    pub outcomes: Vec<DownloadOutcome>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl RunReport {
    /// An empty report for runs that found nothing to do.
    #[must_use]
    pub fn empty(run_id: String, output_dir: PathBuf, conversion_enabled: bool) -> Self {
        Self {
            run_id,
            stats: PipelineStats::default(),
            elapsed: Duration::ZERO,
            output_dir,
            manifests_read: 0,
            manifests_skipped: 0,
            conversion_enabled,
            outcomes: Vec::new(),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "Run finished in {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Output folder:      {}", self.output_dir.display())?;
        writeln!(
            f,
            "Manifests:          {} read, {} skipped",
            self.manifests_read, self.manifests_skipped
        )?;
        writeln!(f, "Total files:        {}", s.total)?;
        writeln!(f, "Successful:         {}", s.successful)?;
        writeln!(f, "Skipped (existing): {}", s.skipped)?;
        write!(f, "Failed:             {}", s.failed)?;
        if self.conversion_enabled {
            write!(f, "\nConverted:          {}", s.converted)?;
            write!(f, "\nConversion failed:  {}", s.conversion_failed)?;
        }
        if let Some(rate) = s.success_rate() {
            write!(f, "\nSuccess rate:       {rate:.1}%")?;
        }
        Ok(())
    }
}
