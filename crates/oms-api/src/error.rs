//! Mapping from component errors to HTTP responses.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oms_deploy::DeployError;
use oms_health::ProbeError;
use oms_process::ProcessError;
use oms_state::StateError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request: bad path, query, body or multipart stream.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Deploy(e) => deploy_status(e),
            ApiError::Process(e) => process_status(e),
            ApiError::Probe(ProbeError::ConfigMissing(_) | ProbeError::ConfigMalformed { .. }) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Probe(ProbeError::Lookup(e)) => state_status(e),
        }
    }
}

fn deploy_status(e: &DeployError) -> StatusCode {
    match e {
        DeployError::Validation(_)
        | DeployError::ConfigMissing(_)
        | DeployError::DirectoryStateInvalid { .. } => StatusCode::BAD_REQUEST,
        DeployError::NotFound(_) => StatusCode::NOT_FOUND,
        DeployError::State(e) => state_status(e),
        DeployError::Process(e) => process_status(e),
        DeployError::Io { .. } | DeployError::Archive(_) | DeployError::Join(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn process_status(e: &ProcessError) -> StatusCode {
    match e {
        ProcessError::UnsupportedPlatform(_) | ProcessError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        ProcessError::ExecutionFailed { .. } => StatusCode::BAD_GATEWAY,
        ProcessError::Spawn { .. } | ProcessError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn state_status(e: &StateError) -> StatusCode {
    match e {
        StateError::RecordNotFound(_) | StateError::FileNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(%status, error = %message, "request failed");
        } else {
            warn!(%status, error = %message, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}
