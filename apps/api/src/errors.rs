use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::{AnalysisFailure, ModelAttempt, EXHAUSTED_MESSAGE};
use crate::pipeline::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{message}")]
    LlmExhausted {
        message: String,
        attempts: Vec<ModelAttempt>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Analysis(AnalysisFailure::Configuration) => {
                AppError::Configuration(AnalysisFailure::Configuration.to_string())
            }
            PipelineError::Analysis(AnalysisFailure::Exhausted { attempts }) => {
                AppError::LlmExhausted {
                    message: EXHAUSTED_MESSAGE.to_string(),
                    attempts,
                }
            }
            PipelineError::Task(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CONFIGURATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::LlmExhausted { message, attempts } => {
                tracing::error!("LLM exhausted after {} attempts", attempts.len());
                (StatusCode::BAD_GATEWAY, "LLM_EXHAUSTED", message.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
