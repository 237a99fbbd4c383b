//! HTTP upload service.
//!
//! Accepts manifest files over multipart upload, runs the pipeline against a
//! fresh temporary input/output pair, and streams back the output tree as a
//! zip archive. The temporary folders and the archive are removed once the
//! response body has been sent or dropped.
//!
//! # Endpoints
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/` | health payload |
//! | POST | `/process` | multipart manifests → `resultados.zip` |
//! | POST | `/process-folder` | same as `/process` |

mod archive;
mod error;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use archive::zip_directory;
pub use error::ServerError;

use crate::download::sanitize_label;
use crate::normalize::Normalizer;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Name the archive is offered under.
pub const ARCHIVE_DOWNLOAD_NAME: &str = "resultados.zip";

/// Upper bound for one upload request body.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Settings for the upload service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Pipeline settings used for every request.
    pub pipeline: PipelineConfig,
    /// Whether conversion is active (already combined with availability).
    pub conversion_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            pipeline: PipelineConfig::default(),
            conversion_enabled: false,
        }
    }
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<PipelineConfig>,
    normalizer: Normalizer,
}

/// Builds the router with the standard converters.
pub fn create_router(config: &ServiceConfig) -> Router {
    create_router_with_normalizer(config, Normalizer::new(config.conversion_enabled))
}

/// Builds the router with an explicit normalizer.
pub fn create_router_with_normalizer(config: &ServiceConfig, normalizer: Normalizer) -> Router {
    let state = AppState {
        pipeline: Arc::new(config.pipeline.clone()),
        normalizer,
    };

    Router::new()
        .route("/", get(health))
        .route("/process", post(process_upload))
        .route("/process-folder", post(process_upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .with_state(state)
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Binds `config.bind` and serves until the process is stopped.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if the address cannot be bound or serving fails.
pub async fn start_server(config: ServiceConfig) -> Result<(), ServerError> {
    let app = create_router(&config);

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|e| ServerError::io(format!("binding {}", config.bind), e))?;

    info!(
        address = %config.bind,
        conversion = config.conversion_enabled,
        "upload service listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::io("serving", e))
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "API para descarga y conversión de evidencias lista" }))
}

/// Temporary files for one request, removed on drop.
struct RequestScratch {
    input: TempDir,
    output: TempDir,
    archive: Option<PathBuf>,
}

impl Drop for RequestScratch {
    fn drop(&mut self) {
        if let Some(archive) = self.archive.take()
            && let Err(e) = std::fs::remove_file(&archive)
        {
            warn!(path = %archive.display(), error = %e, "could not remove archive");
        }
        debug!(
            input = %self.input.path().display(),
            output = %self.output.path().display(),
            "cleaning up request folders"
        );
    }
}

async fn process_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let request_id = Uuid::new_v4().simple().to_string();
    let mut scratch = RequestScratch {
        input: scratch_dir("input", &request_id)?,
        output: scratch_dir("output", &request_id)?,
        archive: None,
    };

    let uploaded = save_uploads(&mut multipart, scratch.input.path()).await?;
    if uploaded == 0 {
        return Err(ServerError::NoFiles);
    }
    info!(request_id = %request_id, files = uploaded, "received manifests");

    let pipeline = Pipeline::new((*state.pipeline).clone(), state.normalizer.clone())?;
    let report = pipeline
        .run(scratch.input.path(), scratch.output.path())
        .await?;
    info!(
        request_id = %request_id,
        run_id = %pipeline.run_id(),
        total = report.stats.total,
        successful = report.stats.successful,
        failed = report.stats.failed,
        "request processed"
    );

    let archive = std::env::temp_dir().join(format!("resultados_{request_id}.zip"));
    scratch.archive = Some(archive.clone());
    let output = scratch.output.path().to_path_buf();
    let zip_target = archive.clone();
    tokio::task::spawn_blocking(move || zip_directory(&output, &zip_target)).await??;

    let file = tokio::fs::File::open(&archive)
        .await
        .map_err(|e| ServerError::io("opening archive", e))?;

    // scratch lives as long as the body stream
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _scratch = &scratch;
        chunk
    });

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{ARCHIVE_DOWNLOAD_NAME}\""),
        ),
    ];
    Ok((headers, Body::from_stream(stream)).into_response())
}

fn scratch_dir(kind: &str, request_id: &str) -> Result<TempDir, ServerError> {
    tempfile::Builder::new()
        .prefix(&format!("{kind}_{request_id}_"))
        .tempdir()
        .map_err(|e| ServerError::io(format!("creating {kind} folder"), e))
}

/// Stores every file field under `input`, returning how many were saved.
async fn save_uploads(multipart: &mut Multipart, input: &Path) -> Result<usize, ServerError> {
    let mut saved = 0;
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.file_name().map(sanitize_label) else {
            debug!(field = ?field.name(), "ignoring non-file field");
            continue;
        };
        let Some(file_name) = Path::new(&name).file_name().map(ToOwned::to_owned) else {
            warn!(name = %name, "ignoring upload with unusable file name");
            continue;
        };

        let bytes = field.bytes().await?;
        let target = input.join(file_name);
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| ServerError::io("saving upload", e))?;
        debug!(path = %target.display(), bytes = bytes.len(), "saved upload");
        saved += 1;
    }
    Ok(saved)
}
