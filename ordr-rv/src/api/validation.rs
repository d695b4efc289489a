//! Validation endpoints
//!
//! A run can be started in the background (`202`, poll the session) or
//! executed inline, in which case the response is the report itself or a
//! typed error naming the failure reason.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::annotation::{ReconciliationStatus, RowAnnotation};
use crate::models::document::DocumentId;
use crate::models::remote::CampaignContext;
use crate::models::report::{get_row_status, ReconciliationReport};
use crate::models::validation_session::SessionState;
use crate::AppState;

/// Campaign window to validate against
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationRequest {
    pub campaign_id: String,
    #[serde(alias = "from")]
    pub from_date: NaiveDate,
    #[serde(alias = "to")]
    pub to_date: NaiveDate,
}

impl From<ValidationRequest> for CampaignContext {
    fn from(request: ValidationRequest) -> Self {
        CampaignContext::new(request.campaign_id, request.from_date, request.to_date)
    }
}

/// Background run accepted
#[derive(Debug, Serialize, Deserialize)]
pub struct StartValidationResponse {
    pub session_id: Uuid,
    pub document_id: DocumentId,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
}

/// One row of the latest report
#[derive(Debug, Serialize, Deserialize)]
pub struct RowStatusResponse {
    pub document_id: DocumentId,
    pub row_index: usize,
    pub status: Option<ReconciliationStatus>,
    pub locked: bool,
    pub annotation: Option<RowAnnotation>,
}

/// POST /validations/:document_id
pub async fn start_validation(
    State(state): State<AppState>,
    Path(document_id): Path<u64>,
    Json(request): Json<ValidationRequest>,
) -> ApiResult<(StatusCode, Json<StartValidationResponse>)> {
    let handle = state
        .service
        .start_validation(DocumentId(document_id), request.into())
        .await?;
    let snapshot = handle.snapshot();

    Ok((
        StatusCode::ACCEPTED,
        Json(StartValidationResponse {
            session_id: handle.session_id,
            document_id: handle.document_id,
            state: snapshot.state,
            started_at: snapshot.started_at,
        }),
    ))
}

/// POST /validations/:document_id/run
pub async fn run_validation(
    State(state): State<AppState>,
    Path(document_id): Path<u64>,
    Json(request): Json<ValidationRequest>,
) -> ApiResult<Json<ReconciliationReport>> {
    let report = state
        .service
        .run_validation(DocumentId(document_id), request.into())
        .await?;
    Ok(Json(report))
}

/// GET /validations/:document_id/report
pub async fn get_report(
    State(state): State<AppState>,
    Path(document_id): Path<u64>,
) -> ApiResult<Json<ReconciliationReport>> {
    let report = state
        .service
        .latest_report(DocumentId(document_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No report for document {}", document_id)))?;
    Ok(Json(report))
}

/// DELETE /validations/:document_id/report
pub async fn delete_report(State(state): State<AppState>, Path(document_id): Path<u64>) -> ApiResult<StatusCode> {
    state.service.remove_report(DocumentId(document_id)).await?;
    tracing::info!(document_id, "Report removed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /validations/:document_id/rows/:row_index
///
/// `row_index` is the document row index: the header is row 0.
pub async fn get_row(
    State(state): State<AppState>,
    Path((document_id, row_index)): Path<(u64, usize)>,
) -> ApiResult<Json<RowStatusResponse>> {
    let report = state
        .service
        .latest_report(DocumentId(document_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No report for document {}", document_id)))?;

    if row_index == 0 || row_index > report.rows.len() {
        return Err(ApiError::NotFound(format!(
            "Row {} not in report for document {}",
            row_index, document_id
        )));
    }

    let annotation = report.row(row_index).cloned();
    Ok(Json(RowStatusResponse {
        document_id: report.document_id,
        row_index,
        status: get_row_status(&report, row_index),
        locked: annotation.as_ref().is_some_and(RowAnnotation::is_locked),
        annotation,
    }))
}

/// Build validation routes
pub fn validation_routes() -> Router<AppState> {
    Router::new()
        .route("/validations/:document_id", post(start_validation))
        .route("/validations/:document_id/run", post(run_validation))
        .route("/validations/:document_id/report", get(get_report).delete(delete_report))
        .route("/validations/:document_id/rows/:row_index", get(get_row))
}
