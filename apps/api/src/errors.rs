use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::interview::engine::EngineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// `thread_id` is set when the failed call left a checkpoint the client can retry.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        thread_id: Option<String>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Gateway { .. } => AppError::Llm {
                message: err.to_string(),
                thread_id: None,
            },
            EngineError::UnknownThread(thread_id) => {
                AppError::NotFound(format!("Interview {thread_id} not found"))
            }
            EngineError::InterviewComplete(_) | EngineError::NotAwaitingResponse { .. } => {
                AppError::Conflict(err.to_string())
            }
            EngineError::Prompt(_) | EngineError::Checkpoint(_) => {
                AppError::Internal(anyhow::Error::new(err))
            }
        }
    }
}

impl AppError {
    /// Tags a gateway failure with the interview it happened on.
    pub fn for_thread(self, thread_id: &str) -> Self {
        match self {
            AppError::Llm { message, .. } => AppError::Llm {
                message,
                thread_id: Some(thread_id.to_string()),
            },
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let thread_id = match &self {
            AppError::Llm { thread_id, .. } => thread_id.clone(),
            _ => None,
        };
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Llm { message, .. } => {
                tracing::error!("LLM error: {message}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The interviewer could not get a response from the language model. Please retry."
                        .to_string(),
                )
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

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(thread_id) = thread_id {
            error["thread_id"] = json!(thread_id);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
