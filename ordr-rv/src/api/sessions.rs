//! Session status and cancellation endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::validation_session::SessionSnapshot;
use crate::AppState;

/// Cancellation outcome
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub session_id: Uuid,
    /// `false` when the session had already finished
    pub cancelled: bool,
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state
        .service
        .session_snapshot(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Validation session not found: {}", session_id)))?;

    tracing::debug!(session_id = %session_id, state = snapshot.state.as_str(), percent = snapshot.percent, "Status query");
    Ok(Json(snapshot))
}

/// POST /sessions/:session_id/cancel
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    if state.service.session(session_id).await.is_none() {
        return Err(ApiError::NotFound(format!("Validation session not found: {}", session_id)));
    }

    let cancelled = state.service.cancel(session_id).await;
    Ok(Json(CancelResponse { session_id, cancelled }))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:session_id", get(get_session))
        .route("/sessions/:session_id/cancel", post(cancel_session))
}
