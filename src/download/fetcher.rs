//! Idempotent, retrying fetch of one download task.
//!
//! A [`Fetcher`] turns a [`DownloadTask`] into exactly one [`DownloadOutcome`]:
//! it skips targets already on disk, downloads with retry/backoff, and hands
//! the committed file to the [`Normalizer`]. Errors never escape as `Err`;
//! they become `failed` outcomes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::client::HttpClient;
use super::error::DownloadError;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error, parse_retry_after};
use crate::manifest::DownloadTask;
use crate::normalize::Normalizer;
use crate::pipeline::{DownloadOutcome, OutcomeStatus};

/// Fetches tasks with a shared client, retry policy and normalizer.
///
/// Cheap to clone; one instance is shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: HttpClient,
    retry_policy: RetryPolicy,
    normalizer: Normalizer,
}

impl Fetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(client: HttpClient, retry_policy: RetryPolicy, normalizer: Normalizer) -> Self {
        Self {
            client,
            retry_policy,
            normalizer,
        }
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns the normalizer in use.
    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Runs one task to its terminal outcome.
    ///
    /// 1. If the canonical target (or, for files that need no conversion, the
    ///    original target) already exists with non-zero size, the task is
    ///    skipped without any request.
    /// 2. The target folder is created.
    /// 3. The URL is downloaded with retries to `<final>.tmp` and renamed.
    /// 4. The committed file is normalized.
    #[instrument(skip(self, task), fields(url = %task.url, file = %task.filename))]
    pub async fn fetch(&self, task: &DownloadTask) -> DownloadOutcome {
        let original = task.final_path();

        if let Some(existing) = self.existing_target(&original).await {
            info!(path = %existing.display(), "already present, skipping");
            return DownloadOutcome::skipped(task.clone(), existing);
        }

        if let Err(e) = ensure_folder(&task.target_folder).await {
            warn!(error = %e, "cannot create target folder");
            return DownloadOutcome::failed(task.clone(), 0, e);
        }

        let (bytes, attempts) = match self.download_with_retry(&task.url, &original).await {
            Ok(done) => done,
            Err((e, attempts)) => {
                warn!(attempts, error = %e, "download failed");
                return DownloadOutcome::failed(task.clone(), attempts, e);
            }
        };

        let normalized = self.normalizer.normalize_async(original).await;
        match normalized.status {
            OutcomeStatus::Converted => {
                info!(path = %normalized.final_path.display(), bytes, "downloaded and converted");
            }
            OutcomeStatus::ConversionFailed => {
                warn!(path = %normalized.final_path.display(), bytes, "downloaded, conversion failed");
            }
            _ => info!(path = %normalized.final_path.display(), bytes, "downloaded"),
        }

        DownloadOutcome {
            task: task.clone(),
            status: normalized.status,
            final_path: Some(normalized.final_path),
            bytes,
            attempts,
            error: None,
        }
    }

    /// The converted target is checked first; the original only counts when
    /// it would not be converted.
    async fn existing_target(&self, original: &Path) -> Option<PathBuf> {
        match self.normalizer.normalized_path(original) {
            Some(converted) => is_non_empty_file(&converted).await.then_some(converted),
            None => is_non_empty_file(original)
                .await
                .then(|| original.to_path_buf()),
        }
    }

    async fn download_with_retry(
        &self,
        url: &str,
        final_path: &Path,
    ) -> Result<(u64, u32), (DownloadError, u32)> {
        let policy = &self.retry_policy;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting download");

            match self.client.download_to_path(url, final_path).await {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(e) => {
                    let failure_type = classify_error(&e);
                    let retry_after_delay = if failure_type == FailureType::Permanent {
                        None
                    } else {
                        retry_after_delay(&e)
                    };

                    match policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay: backoff_delay,
                            attempt: next_attempt,
                        } => {
                            let delay = retry_after_delay.unwrap_or(backoff_delay);
                            info!(
                                url,
                                attempt = next_attempt,
                                max_attempts = policy.max_attempts(),
                                delay_ms = delay.as_millis(),
                                using_retry_after = retry_after_delay.is_some(),
                                error = %e,
                                "retrying download"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(url, %reason, "not retrying download");
                            return Err((e, attempt));
                        }
                    }
                }
            }
        }
    }
}

/// Server-requested delay for 429/503 responses.
fn retry_after_delay(error: &DownloadError) -> Option<Duration> {
    match error {
        DownloadError::HttpStatus {
            status: 429 | 503,
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
}

/// Creates `folder`; concurrent creation by another worker is fine.
async fn ensure_folder(folder: &Path) -> Result<(), DownloadError> {
    match tokio::fs::create_dir_all(folder).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && folder.is_dir() => Ok(()),
        Err(e) => Err(DownloadError::io(folder, e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::manifest::TaskKind;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn task(url: &str, folder: &Path, filename: &str) -> DownloadTask {
        DownloadTask {
            url: url.to_string(),
            filename: filename.to_string(),
            target_folder: folder.to_path_buf(),
            group: "G1".to_string(),
            session: "S1".to_string(),
            kind: TaskKind::PhotoStart,
        }
    }

    fn fast_fetcher(max_retries: u32, normalizer: Normalizer) -> Fetcher {
        Fetcher::new(
            HttpClient::new(),
            RetryPolicy::with_max_retries(max_retries).with_base_delay(Duration::from_millis(5)),
            normalizer,
        )
    }

    #[tokio::test]
    async fn test_fetch_skips_existing_original_without_request() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("S1_foto_inicial.png");
        std::fs::write(&existing, b"png").unwrap();

        // nothing listens on the discard port; a request would fail
        let t = task("http://127.0.0.1:9/p.png", temp_dir.path(), "S1_foto_inicial.png");
        let outcome = fast_fetcher(0, Normalizer::new(true)).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::SkippedExisting);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.final_path, Some(existing));
    }

    #[tokio::test]
    async fn test_fetch_skips_when_converted_target_exists() {
        let temp_dir = TempDir::new().unwrap();
        let converted = temp_dir.path().join("S1_foto_inicial.jpg");
        std::fs::write(&converted, b"jpeg").unwrap();

        let t = task("http://127.0.0.1:9/p.heic", temp_dir.path(), "S1_foto_inicial.heic");
        let outcome = fast_fetcher(0, Normalizer::new(true)).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::SkippedExisting);
        assert_eq!(outcome.final_path, Some(converted));
    }

    #[tokio::test]
    async fn test_fetch_does_not_skip_unconverted_original() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("S1_foto_inicial.heic"), b"heic").unwrap();

        let t = task("http://127.0.0.1:9/p.heic", temp_dir.path(), "S1_foto_inicial.heic");
        let outcome = fast_fetcher(0, Normalizer::new(true)).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_fetch_zero_byte_existing_file_is_refetched() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("S1_asistencia.pdf"), b"").unwrap();

        Mock::given(method("GET"))
            .and(path("/lista.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/lista.pdf", mock_server.uri());
        let t = task(&url, temp_dir.path(), "S1_asistencia.pdf");
        let outcome = fast_fetcher(0, Normalizer::disabled()).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::Downloaded);
        assert_eq!(outcome.bytes, 8);
    }

    #[tokio::test]
    async fn test_fetch_creates_nested_folder() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/f.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg"))
            .mount(&mock_server)
            .await;

        let folder = temp_dir.path().join("curso").join("Grupo A");
        let url = format!("{}/f.jpg", mock_server.uri());
        let t = task(&url, &folder, "S1_foto_final.jpg");
        let outcome = fast_fetcher(0, Normalizer::new(true)).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::Downloaded);
        assert!(folder.join("S1_foto_final.jpg").exists());
    }

    #[tokio::test]
    async fn test_fetch_retries_transient_then_succeeds() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/flaky.png"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png bytes"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/flaky.png", mock_server.uri());
        let t = task(&url, temp_dir.path(), "S1_foto_inicial.png");
        let outcome = fast_fetcher(3, Normalizer::disabled()).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::Downloaded);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_attempt_cap() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let url = format!("{}/down.png", mock_server.uri());
        let t = task(&url, temp_dir.path(), "S1_foto_inicial.png");
        let outcome = fast_fetcher(2, Normalizer::disabled()).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.error.as_deref().unwrap().contains("500"));
        assert!(!temp_dir.path().join("S1_foto_inicial.png").exists());
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_not_retried() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/missing.pdf", mock_server.uri());
        let t = task(&url, temp_dir.path(), "S1_asistencia.pdf");
        let outcome = fast_fetcher(3, Normalizer::disabled()).fetch(&t).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn test_retry_after_delay_only_for_429_and_503() {
        let e = DownloadError::http_status_with_retry_after("u", 429, Some("2".to_string()));
        assert_eq!(retry_after_delay(&e), Some(Duration::from_secs(2)));

        let e = DownloadError::http_status_with_retry_after("u", 503, Some("1".to_string()));
        assert_eq!(retry_after_delay(&e), Some(Duration::from_secs(1)));

        let e = DownloadError::http_status_with_retry_after("u", 500, Some("1".to_string()));
        assert_eq!(retry_after_delay(&e), None);

        let e = DownloadError::http_status("u", 429);
        assert_eq!(retry_after_delay(&e), None);
    }
}
