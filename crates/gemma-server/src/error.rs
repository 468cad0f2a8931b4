//! HTTP error handling and response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::registry::DuplicateSession;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("generation {0} is already active")]
    DuplicateGeneration(String),

    #[error("generation {0} not found")]
    GenerationNotFound(String),
}

impl From<DuplicateSession> for ServerError {
    fn from(err: DuplicateSession) -> Self {
        ServerError::DuplicateGeneration(err.0)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ServerError::DuplicateGeneration(_) => (StatusCode::CONFLICT, "conflict"),
            ServerError::GenerationNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}
