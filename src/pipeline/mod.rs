//! Concurrent fetch-and-normalize orchestration.
//!
//! A [`Pipeline`] discovers manifests in an input folder, derives download
//! tasks from every row, runs them on a bounded worker pool, and returns a
//! [`RunReport`] once every task has a terminal outcome.
//!
//! # Example
//!
//! ```no_run
//! use evidencias_core::normalize::Normalizer;
//! use evidencias_core::pipeline::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineConfig::default(), Normalizer::new(true))?;
//! let report = pipeline.run(Path::new("input"), Path::new("Evidencias_Descargadas")).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod outcome;
mod report;
mod stats;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{Instrument, Span, debug, info, info_span, instrument, warn};
use uuid::Uuid;

pub use config::{DEFAULT_OUTPUT_DIR, DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS, PipelineConfig};
pub use error::PipelineError;
pub use outcome::{DownloadOutcome, OutcomeStatus};
pub use report::RunReport;
pub use stats::{PipelineStats, StatsAggregator};

use crate::download::{Fetcher, HttpClient, RetryPolicy};
use crate::manifest::{DownloadTask, derive_tasks, is_supported_manifest, read_manifest};
use crate::normalize::Normalizer;

/// One configured pipeline run.
///
/// Owns the `pipeline` tracing span (with a unique `run_id`) that every
/// worker is instrumented with, so concurrent runs in one process keep their
/// log lines apart.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Fetcher,
    run_id: Uuid,
    span: Span,
}

/// Tasks derived from every manifest, plus what happened while reading them.
#[derive(Debug, Default)]
struct Plan {
    tasks: Vec<DownloadTask>,
    manifests_read: usize,
    manifests_skipped: usize,
    duplicates: usize,
}

impl Pipeline {
    /// Validates `config` and builds the shared client and fetcher.
    ///
    /// Conversion runs only when both `config.convert_files` and the
    /// normalizer allow it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidWorkers`] for a worker count outside
    /// `1..=64` and [`PipelineError::Client`] if the HTTP client cannot be built.
    pub fn new(config: PipelineConfig, normalizer: Normalizer) -> Result<Self, PipelineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&config.workers) {
            return Err(PipelineError::InvalidWorkers {
                value: config.workers,
                min: MIN_WORKERS,
                max: MAX_WORKERS,
            });
        }

        let client = HttpClient::with_timeouts(config.connect_timeout, config.request_timeout)?;
        let retry_policy =
            RetryPolicy::with_max_retries(config.max_retries).with_base_delay(config.backoff_base);
        let convert = normalizer.is_enabled() && config.convert_files;
        let fetcher = Fetcher::new(client, retry_policy, normalizer.with_enabled(convert));

        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id);

        debug!(
            parent: &span,
            workers = config.workers,
            max_attempts = fetcher.retry_policy().max_attempts(),
            conversion = fetcher.normalizer().is_enabled(),
            "pipeline configured"
        );

        Ok(Self {
            config,
            fetcher,
            run_id,
            span,
        })
    }

    /// The identifier attached to this run's log lines.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The configuration this pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes every manifest directly inside `input` into `output`.
    ///
    /// Per-task failures are reported through the returned [`RunReport`];
    /// a manifest that cannot be decoded is logged and skipped. A missing
    /// input folder, or one without manifests, yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InputUnreadable`] if `input` exists but
    /// cannot be listed and [`PipelineError::OutputUnavailable`] if `output`
    /// cannot be created.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<RunReport, PipelineError> {
        self.run_inner(input, output)
            .instrument(self.span.clone())
            .await
    }

    async fn run_inner(&self, input: &Path, output: &Path) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let conversion_enabled = self.fetcher.normalizer().is_enabled();
        let mut report =
            RunReport::empty(self.run_id.to_string(), output.to_path_buf(), conversion_enabled);

        if !input.exists() {
            warn!(input = %input.display(), "input folder does not exist, nothing to do");
            return Ok(report);
        }

        let manifests = discover_manifests(input)?;
        if manifests.is_empty() {
            warn!(input = %input.display(), "no supported manifest files found");
            return Ok(report);
        }
        info!(count = manifests.len(), "found manifest files");

        tokio::fs::create_dir_all(output)
            .await
            .map_err(|source| PipelineError::OutputUnavailable {
                path: output.to_path_buf(),
                source,
            })?;

        let stats = Arc::new(StatsAggregator::new());
        let plan = plan_tasks(&manifests, output);
        stats.record_planned(plan.tasks.len());
        info!(
            tasks = plan.tasks.len(),
            duplicates = plan.duplicates,
            workers = self.config.workers,
            "dispatching tasks"
        );

        report.outcomes = self.dispatch(plan.tasks, &stats).await;
        report.manifests_read = plan.manifests_read;
        report.manifests_skipped = plan.manifests_skipped;
        report.stats = stats.snapshot();
        report.elapsed = started.elapsed();

        let s = report.stats;
        info!(
            total = s.total,
            successful = s.successful,
            skipped = s.skipped,
            failed = s.failed,
            converted = s.converted,
            conversion_failed = s.conversion_failed,
            elapsed_ms = report.elapsed.as_millis(),
            "run complete"
        );
        Ok(report)
    }

    /// Runs every task on the worker pool and waits for all of them.
    async fn dispatch(
        &self,
        tasks: Vec<DownloadTask>,
        stats: &Arc<StatsAggregator>,
    ) -> Vec<DownloadOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = self.fetcher.clone();
            let stats = Arc::clone(stats);
            let worker_task = task.clone();

            let handle = tokio::spawn(
                async move {
                    // Permit is released when the worker returns
                    let _permit = semaphore.acquire_owned().await.ok();
                    let outcome = fetcher.fetch(&worker_task).await;
                    stats.record(&outcome);
                    outcome
                }
                .instrument(self.span.clone()),
            );
            handles.push((task, handle));
        }

        debug!(task_count = handles.len(), "waiting for workers to finish");

        let mut outcomes = Vec::with_capacity(handles.len());
        for (task, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(url = %task.url, error = %e, "worker task panicked");
                    let outcome = DownloadOutcome::failed(task, 0, format!("worker panicked: {e}"));
                    stats.record(&outcome);
                    outcomes.push(outcome);
                }
            }
        }
        outcomes
    }
}

/// Lists supported manifest files directly inside `input`, in lexical order.
#[instrument(fields(input = %input.display()))]
fn discover_manifests(input: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let unreadable = |source: std::io::Error| PipelineError::InputUnreadable {
        path: input.to_path_buf(),
        source,
    };

    let mut manifests = Vec::new();
    for entry in std::fs::read_dir(input).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && is_supported_manifest(&path) {
            manifests.push(path);
        }
    }
    manifests.sort();
    Ok(manifests)
}

/// Reads each manifest and derives its tasks under `output/<manifest stem>`.
///
/// Tasks are unique per output slot: the first row naming a group, session
/// and kind wins, in manifest order.
fn plan_tasks(manifests: &[PathBuf], output: &Path) -> Plan {
    let mut plan = Plan::default();
    let mut slots = HashSet::new();

    for path in manifests {
        let manifest = match read_manifest(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(manifest = %path.display(), error = %e, "skipping unreadable manifest");
                plan.manifests_skipped += 1;
                continue;
            }
        };

        let root = output.join(manifest.base_name());
        let before = plan.tasks.len();
        for row in &manifest.rows {
            for task in derive_tasks(row, &root) {
                // first row per output slot wins
                if slots.insert(task.slot()) {
                    plan.tasks.push(task);
                } else {
                    warn!(
                        manifest = %path.display(),
                        row = row.index + 1,
                        file = %task.final_path().display(),
                        url = %task.url,
                        "duplicate task for an output already planned, ignoring"
                    );
                    plan.duplicates += 1;
                }
            }
        }
        plan.manifests_read += 1;

        info!(
            manifest = %path.display(),
            rows = manifest.rows.len(),
            tasks = plan.tasks.len() - before,
            "prepared download tasks"
        );
    }
    plan
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_rejects_zero_workers() {
        let config = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(config, Normalizer::disabled());
        assert!(matches!(
            result,
            Err(PipelineError::InvalidWorkers { value: 0, .. })
        ));
    }

    #[test]
    fn test_pipeline_rejects_too_many_workers() {
        let config = PipelineConfig {
            workers: 65,
            ..PipelineConfig::default()
        };
        assert!(Pipeline::new(config, Normalizer::disabled()).is_err());
    }

    #[test]
    fn test_pipeline_convert_files_false_disables_normalizer() {
        let config = PipelineConfig {
            convert_files: false,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config, Normalizer::new(true)).unwrap();
        assert!(!pipeline.fetcher.normalizer().is_enabled());

        let pipeline = Pipeline::new(PipelineConfig::default(), Normalizer::disabled()).unwrap();
        assert!(!pipeline.fetcher.normalizer().is_enabled());

        let pipeline = Pipeline::new(PipelineConfig::default(), Normalizer::new(true)).unwrap();
        assert!(pipeline.fetcher.normalizer().is_enabled());
    }

    #[test]
    fn test_pipeline_runs_have_distinct_ids() {
        let a = Pipeline::new(PipelineConfig::default(), Normalizer::disabled()).unwrap();
        let b = Pipeline::new(PipelineConfig::default(), Normalizer::disabled()).unwrap();
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.config().workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_discover_manifests_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.xlsx", "a.csv", "notes.txt", "c.ODS"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let found = discover_manifests(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.csv", "b.xlsx", "c.ODS"]);
    }

    #[test]
    fn test_discover_manifests_on_a_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.csv");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(
            discover_manifests(&file),
            Err(PipelineError::InputUnreadable { .. })
        ));
    }

    #[test]
    fn test_plan_tasks_skips_bad_manifest_and_uses_stem_folder() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("curso_a.csv");
        std::fs::write(
            &good,
            "Código del grupo;Sesión;Archivo asistencia\nG1;S1;https://h/a.pdf\nG2;S2;https://h/b.pdf\n",
        )
        .unwrap();
        let bad = dir.path().join("roto.csv");
        std::fs::write(&bad, b"sin columnas\n").unwrap();

        let out = dir.path().join("out");
        let plan = plan_tasks(&[good, bad], &out);

        assert_eq!(plan.manifests_read, 1);
        assert_eq!(plan.manifests_skipped, 1);
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].target_folder, out.join("curso_a").join("G2"));
    }

    #[test]
    fn test_plan_tasks_keeps_first_task_per_slot() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("curso.csv");
        std::fs::write(
            &manifest,
            "Código del grupo;Sesión;Archivo foto inicial;Archivo foto final\n\
             G1;S1;https://h/primera.heic;https://h/fin.jpg\n\
             G1;S1;https://h/segunda.jpg;\n\
             G1;S2;https://h/otra.png;\n",
        )
        .unwrap();

        let plan = plan_tasks(&[manifest], &dir.path().join("out"));

        assert_eq!(plan.duplicates, 1);
        let urls: Vec<_> = plan.tasks.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://h/primera.heic", "https://h/fin.jpg", "https://h/otra.png"]
        );
    }

    #[tokio::test]
    async fn test_run_missing_input_is_empty_report() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(PipelineConfig::default(), Normalizer::disabled()).unwrap();

        let report = pipeline
            .run(&dir.path().join("does-not-exist"), &dir.path().join("out"))
            .await
            .unwrap();

        assert_eq!(report.stats, PipelineStats::default());
        assert!(report.outcomes.is_empty());
        assert!(!dir.path().join("out").exists());
    }
}
