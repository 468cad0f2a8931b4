//! Health check handler.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Handle health check requests. Includes running-session count.
pub async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": {
            "active": state.registry.active_count().await,
        }
    }))
}
