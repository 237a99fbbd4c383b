//! Errors returned by the upload service, rendered as JSON responses.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;

/// Errors that end an upload request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The multipart body could not be read.
    #[error("invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    /// The request carried no file fields.
    #[error("no files were uploaded")]
    NoFiles,

    /// File system or socket failure.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The result archive could not be written.
    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The pipeline refused to run.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A blocking job panicked or was cancelled.
    #[error("background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Creates an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoFiles => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
