//! HTTP-facing errors.

use crate::game::{ErrorCategory, GameError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Game(#[from] GameError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Game(err) => match err {
                GameError::RoomNotFound | GameError::GameNotFound | GameError::NotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                _ => match err.category() {
                    ErrorCategory::ResourceExhaustion => StatusCode::CONFLICT,
                    ErrorCategory::ExternalDependency => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCategory::Configuration | ErrorCategory::Protocol => {
                        StatusCode::BAD_REQUEST
                    }
                },
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Don't leak internals to clients
        let message = match &self {
            AppError::Game(e) if e.category() == ErrorCategory::Internal => {
                tracing::error!(error = %e, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
