//! Check job payload and processing state machine.
//!
//! One handler instance is shared by the check dispatcher. The persisted
//! check row mirrors the job state: the `processing` claim is written
//! synchronously before any external call, and `completed` is written only
//! after violations AND the modified text are both persisted. Failure hooks
//! write a categorized, human-readable `error_message` so the UI never sees
//! a raw exception.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::models::{CheckStatus, NewViolation};
use super::pipeline::FilterPipeline;
use super::store::{CheckStore, StatusFields};
use crate::kernel::dispatch::{JobError, JobHandler};
use crate::kernel::progress::envelope;
use crate::kernel::stream_hub::{check_topic, StreamHub};

/// Categorized failure summary for inference-gateway outages.
pub const AI_UNAVAILABLE_MESSAGE: &str = "AI service unavailable";
/// Categorized failure summary for repository write failures.
pub const PERSISTENCE_FAILED_MESSAGE: &str = "could not save results";

/// What was submitted for screening.
#[derive(Debug, Clone)]
pub enum CheckInput {
    Text(String),
    Image(String),
}

/// Payload of one check job.
#[derive(Debug, Clone)]
pub struct CheckPayload {
    pub check_id: Uuid,
    pub organization_id: Uuid,
    pub input: CheckInput,
}

/// Job handler driving a check through the filter pipeline.
pub struct CheckJobHandler {
    store: Arc<dyn CheckStore>,
    pipeline: Arc<FilterPipeline>,
    hub: StreamHub,
}

impl CheckJobHandler {
    pub fn new(store: Arc<dyn CheckStore>, pipeline: Arc<FilterPipeline>, hub: StreamHub) -> Self {
        Self {
            store,
            pipeline,
            hub,
        }
    }

    async fn publish_progress(&self, payload: &CheckPayload, status: CheckStatus) {
        let message = envelope(
            "check_progress",
            json!({
                "check_id": payload.check_id,
                "status": status,
            }),
        );
        self.hub
            .publish(&check_topic(payload.organization_id), message)
            .await;
    }
}

#[async_trait]
impl JobHandler for CheckJobHandler {
    type Payload = CheckPayload;

    fn validate(&self, payload: &CheckPayload) -> Result<(), String> {
        match &payload.input {
            CheckInput::Text(text) if text.trim().is_empty() => {
                Err("check text must not be empty".into())
            }
            CheckInput::Image(url) if url.trim().is_empty() => {
                Err("image url must not be empty".into())
            }
            _ => Ok(()),
        }
    }

    async fn execute(
        &self,
        job_id: Uuid,
        payload: CheckPayload,
        cancel: CancellationToken,
    ) -> Result<Value, JobError> {
        if cancel.is_cancelled() {
            return Ok(Value::Null);
        }

        // Persist the claim synchronously so concurrent status polls observe
        // the processing transition.
        self.store
            .update_check_status(
                payload.check_id,
                CheckStatus::Processing,
                StatusFields::default(),
            )
            .await
            .map_err(|e| {
                error!(check_id = %payload.check_id, error = %e, "failed to mark check processing");
                JobError::transient(PERSISTENCE_FAILED_MESSAGE)
            })?;
        self.publish_progress(&payload, CheckStatus::Processing).await;

        let outcome = match &payload.input {
            CheckInput::Text(text) => self.pipeline.run_text(text, payload.organization_id).await,
            CheckInput::Image(url) => self.pipeline.run_image(url, payload.organization_id).await,
        }
        .map_err(|e| {
            error!(check_id = %payload.check_id, error = %e, "rule engine call failed");
            if e.is_transient() {
                JobError::transient(AI_UNAVAILABLE_MESSAGE)
            } else {
                JobError::permanent(AI_UNAVAILABLE_MESSAGE)
            }
        })?;

        // A cancel that landed during the AI call wins; its result is
        // discarded and nothing is persisted.
        if cancel.is_cancelled() {
            debug!(check_id = %payload.check_id, "check cancelled mid-flight, skipping persistence");
            return Ok(Value::Null);
        }

        let rows: Vec<NewViolation> = outcome
            .violations
            .iter()
            .map(|span| NewViolation {
                start_pos: span.start as i32,
                end_pos: span.end as i32,
                reason: span.reason.clone(),
                dictionary_entry_id: span.dictionary_entry_id,
            })
            .collect();

        // Violations and the completed status are one unit: if the insert
        // fails the check fails even though the AI call succeeded, and the
        // modified text stays unset.
        self.store
            .insert_violations(payload.check_id, &rows)
            .await
            .map_err(|e| {
                error!(check_id = %payload.check_id, error = %e, "failed to persist violations");
                JobError::permanent(PERSISTENCE_FAILED_MESSAGE)
            })?;

        self.store
            .update_check_status(
                payload.check_id,
                CheckStatus::Completed,
                StatusFields {
                    modified_text: Some(outcome.modified.clone()),
                    error_message: None,
                },
            )
            .await
            .map_err(|e| {
                error!(check_id = %payload.check_id, error = %e, "failed to mark check completed");
                JobError::permanent(PERSISTENCE_FAILED_MESSAGE)
            })?;

        self.publish_progress(&payload, CheckStatus::Completed).await;
        info!(
            job_id = %job_id,
            check_id = %payload.check_id,
            violations = rows.len(),
            "check completed"
        );

        Ok(json!({
            "check_id": payload.check_id,
            "violation_count": rows.len(),
        }))
    }

    async fn on_failure(&self, job_id: Uuid, payload: CheckPayload, reason: &str) {
        if let Err(e) = self
            .store
            .update_check_status(
                payload.check_id,
                CheckStatus::Failed,
                StatusFields {
                    modified_text: None,
                    error_message: Some(reason.to_string()),
                },
            )
            .await
        {
            error!(job_id = %job_id, check_id = %payload.check_id, error = %e, "failed to mark check failed");
        }
        self.publish_progress(&payload, CheckStatus::Failed).await;
    }

    async fn on_cancel(&self, job_id: Uuid, payload: CheckPayload) {
        if let Err(e) = self
            .store
            .update_check_status(
                payload.check_id,
                CheckStatus::Cancelled,
                StatusFields::default(),
            )
            .await
        {
            error!(job_id = %job_id, check_id = %payload.check_id, error = %e, "failed to mark check cancelled");
        }
        self.publish_progress(&payload, CheckStatus::Cancelled).await;
    }
}
