//! Cancellation handler.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{error::ServerError, models::CancelRequest, state::AppState};

/// Handle `POST /cancel`.
///
/// Signals the session's cancellation token through the registry. Unknown
/// or already-finished ids are a 404, never an error inside the server —
/// cancel racing a natural completion is expected behavior.
pub async fn handle_cancel(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, ServerError> {
    if state.registry.signal(&request.generation_id).await {
        tracing::info!(generation_id = %request.generation_id, "generation cancelled");
        Ok(Json(json!({
            "message": format!("Generation {} cancelled.", request.generation_id),
        })))
    } else {
        Err(ServerError::GenerationNotFound(request.generation_id))
    }
}
