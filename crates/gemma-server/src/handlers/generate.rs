//! Generation handler: starts a session and streams its events over SSE.

use axum::{extract::State, response::IntoResponse, Json};

use crate::{error::ServerError, models::GenerateRequest, session, sse, state::AppState};

/// Handle `POST /generate`.
///
/// Returns 409 if the caller reuses a generation id that is still running.
/// Everything after registration — including input preparation failures —
/// is reported on the event stream, so the client always gets either
/// Updates followed by one Complete, or one Error.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<axum::response::Response, ServerError> {
    let events = session::run_generation(state, request).await?;
    Ok(sse::sse_response(events).into_response())
}
