//! Check submission, status, and cancellation endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::ApiError;
use crate::domains::checks::models::{Check, CheckInputType, CheckStatus, Violation};
use crate::domains::checks::worker::{CheckInput, CheckPayload};
use crate::domains::dictionary::worker::EmbeddingBatchPayload;
use crate::kernel::dispatch::JobSnapshot;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitCheckRequest {
    pub organization_id: Uuid,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitCheckResponse {
    pub check_id: Uuid,
    pub job_id: Uuid,
    pub status: CheckStatus,
}

/// POST /api/checks
///
/// Accepts a submission and returns the assigned ids synchronously while
/// processing continues in the background.
pub async fn submit_check(
    State(state): State<AppState>,
    Json(request): Json<SubmitCheckRequest>,
) -> Result<(StatusCode, Json<SubmitCheckResponse>), ApiError> {
    let (input_type, original_text, image_url, input) = match (request.text, request.image_url) {
        (Some(text), None) => {
            if text.trim().is_empty() {
                return Err(ApiError::UnprocessableEntity("text must not be empty".into()));
            }
            (
                CheckInputType::Text,
                Some(text.clone()),
                None,
                CheckInput::Text(text),
            )
        }
        (None, Some(url)) => {
            if url.trim().is_empty() {
                return Err(ApiError::UnprocessableEntity(
                    "image_url must not be empty".into(),
                ));
            }
            (
                CheckInputType::Image,
                None,
                Some(url.clone()),
                CheckInput::Image(url),
            )
        }
        _ => {
            return Err(ApiError::UnprocessableEntity(
                "exactly one of text or image_url is required".into(),
            ))
        }
    };

    let check = state
        .store
        .create_check(request.organization_id, input_type, original_text, image_url)
        .await?;

    let job_id = state
        .check_dispatcher
        .enqueue(CheckPayload {
            check_id: check.id,
            organization_id: check.organization_id,
            input,
        })
        .map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitCheckResponse {
            check_id: check.id,
            job_id,
            status: check.status,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct CheckStatusResponse {
    #[serde(flatten)]
    pub check: Check,
    pub violations: Vec<Violation>,
}

/// GET /api/checks/:id
pub async fn check_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckStatusResponse>, ApiError> {
    let check = state.store.find_check(id).await?.ok_or(ApiError::NotFound)?;
    let violations = state.store.list_violations(id).await?;

    Ok(Json(CheckStatusResponse { check, violations }))
}

/// GET /api/checks/jobs/:job_id
///
/// Late status polls work until the retention window evicts the job.
pub async fn check_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, ApiError> {
    state
        .check_dispatcher
        .status(job_id)
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// POST /api/checks/jobs/:job_id/cancel
///
/// Returns `cancelled: false` for unknown or already-terminal jobs.
pub async fn cancel_check_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Json<Value> {
    let cancelled = state.check_dispatcher.cancel(job_id);
    Json(json!({ "job_id": job_id, "cancelled": cancelled }))
}

#[derive(Debug, Deserialize)]
pub struct ReembedRequest {
    pub entry_ids: Vec<Uuid>,
}

/// POST /api/dictionary/reembed
///
/// Queue an embedding regeneration batch on the embedding dispatcher.
pub async fn reembed_entries(
    State(state): State<AppState>,
    Json(request): Json<ReembedRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let job_id = state
        .embedding_dispatcher
        .enqueue(EmbeddingBatchPayload {
            entry_ids: request.entry_ids,
        })
        .map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "job_id": job_id }))))
}
