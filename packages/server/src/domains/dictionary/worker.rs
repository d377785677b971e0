//! Embedding-batch job: regenerate vectors for dictionary entries.
//!
//! Runs on its own dispatcher instance, separate from check jobs, so a slow
//! re-embedding sweep cannot starve check processing.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domains::checks::store::CheckStore;
use crate::kernel::dispatch::{JobError, JobHandler};
use crate::kernel::traits::BaseEmbeddingService;

/// Payload of one embedding-batch job: the entries to re-embed.
#[derive(Debug, Clone)]
pub struct EmbeddingBatchPayload {
    pub entry_ids: Vec<Uuid>,
}

/// Job handler regenerating embeddings for a batch of dictionary entries.
pub struct EmbeddingBatchHandler {
    store: Arc<dyn CheckStore>,
    embeddings: Arc<dyn BaseEmbeddingService>,
}

impl EmbeddingBatchHandler {
    pub fn new(store: Arc<dyn CheckStore>, embeddings: Arc<dyn BaseEmbeddingService>) -> Self {
        Self { store, embeddings }
    }
}

#[async_trait]
impl JobHandler for EmbeddingBatchHandler {
    type Payload = EmbeddingBatchPayload;

    fn validate(&self, payload: &EmbeddingBatchPayload) -> Result<(), String> {
        if payload.entry_ids.is_empty() {
            return Err("entry id list must not be empty".into());
        }
        Ok(())
    }

    async fn execute(
        &self,
        job_id: Uuid,
        payload: EmbeddingBatchPayload,
        cancel: CancellationToken,
    ) -> Result<Value, JobError> {
        let entries = self
            .store
            .fetch_dictionary_entries(&payload.entry_ids)
            .await
            .map_err(|e| JobError::transient(format!("could not load dictionary entries: {}", e)))?;

        if entries.len() < payload.entry_ids.len() {
            warn!(
                job_id = %job_id,
                requested = payload.entry_ids.len(),
                found = entries.len(),
                "some dictionary entries no longer exist"
            );
        }

        let mut embedded = 0usize;
        for entry in &entries {
            if cancel.is_cancelled() {
                debug!(job_id = %job_id, embedded, "embedding batch cancelled mid-sweep");
                return Ok(Value::Null);
            }

            let vector = self.embeddings.generate(&entry.phrase).await.map_err(|e| {
                if e.is_transient() {
                    JobError::transient(format!("embedding failed: {}", e))
                } else {
                    JobError::permanent(format!("embedding failed: {}", e))
                }
            })?;

            if cancel.is_cancelled() {
                return Ok(Value::Null);
            }

            self.store
                .update_entry_embedding(entry.id, &vector)
                .await
                .map_err(|e| JobError::transient(format!("could not store embedding: {}", e)))?;
            embedded += 1;
        }

        info!(job_id = %job_id, embedded, "embedding batch completed");
        Ok(json!({ "embedded": embedded }))
    }
}
