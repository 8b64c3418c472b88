//! The one error currency returned by fallible internal functions, and the
//! single site (`IntoResponse`) that maps it to the HTTP shapes in
//! `SPEC_FULL.md` §4.7 / §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::response::ErrorEnvelope;
use crate::admission::BusyError;
use crate::audio::AudioError;
use crate::engine::EngineError;
use crate::provisioner::ProvisionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing required file")]
    MissingFile,
    #[error("invalid base64 payload")]
    InvalidBase64,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("unknown model id: {0}")]
    UnknownModel(String),
    #[error("no such model: {0}")]
    ModelRouteNotFound(String),
    #[error("payload exceeds the configured size cap")]
    FileTooLarge,
    #[error("unsupported audio format")]
    UnsupportedMediaType,
    #[error("audio could not be processed: {0}")]
    AudioProcessingFailed(String),
    #[error("no admission slot available")]
    RateLimited,
    #[error("request deadline exceeded")]
    Timeout,
    #[error("model is not ready: {0}")]
    ModelNotReady(String),
    #[error("upstream URL fetch failed with status {status}")]
    UrlFetchFailed { status: StatusCode, message: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BusyError> for AppError {
    fn from(_: BusyError) -> Self {
        AppError::RateLimited
    }
}

impl From<AudioError> for AppError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::UnsupportedExtension(_) => AppError::UnsupportedMediaType,
            AudioError::DecodeFailed(msg) | AudioError::WriteFailed(msg) => {
                AppError::AudioProcessingFailed(msg)
            }
        }
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ModelNotReady(path) => AppError::ModelNotReady(path.display().to_string()),
            EngineError::Timeout => AppError::Timeout,
            EngineError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ProvisionError> for AppError {
    fn from(e: ProvisionError) -> Self {
        AppError::ModelNotReady(e.to_string())
    }
}

impl AppError {
    fn shape(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            AppError::MissingFile => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("missing_file")),
            AppError::InvalidBase64 => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_base64")),
            AppError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_request_error"))
            }
            AppError::UnknownModel(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", Some("model_not_found"))
            }
            AppError::ModelRouteNotFound(_) => {
                (StatusCode::NOT_FOUND, "invalid_request_error", Some("model_not_found"))
            }
            AppError::FileTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "invalid_request_error", Some("file_too_large")),
            AppError::UnsupportedMediaType => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "invalid_request_error", Some("unsupported_media_type"))
            }
            AppError::AudioProcessingFailed(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "invalid_request_error", Some("audio_processing_failed"))
            }
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded", Some("concurrency_limit")),
            AppError::Timeout => (StatusCode::REQUEST_TIMEOUT, "request_timeout", Some("timeout")),
            AppError::ModelNotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "server_error", Some("model_not_ready")),
            AppError::UrlFetchFailed { status, .. } => (*status, "invalid_request_error", Some("url_fetch_failed")),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, code) = self.shape();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        } else {
            tracing::info!(error = %self, status = %status, "request failed");
        }

        let message = match &self {
            AppError::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorEnvelope::new(message, kind, code))).into_response()
    }
}
