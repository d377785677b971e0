//! In-memory fakes for the repository and inference traits, used by the
//! pipeline and worker tests.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use inference_client::{ChatMessage, CompletionOutput, FunctionSpec, InferenceError};
use tokio::sync::watch;
use uuid::Uuid;

use super::models::{Check, CheckInputType, CheckStatus, NewViolation, Violation};
use super::store::{ActiveCheckCounts, CheckStore, StatusFields};
use crate::domains::dictionary::models::DictionaryEntry;
use crate::kernel::traits::{BaseCompletionService, BaseEmbeddingService};

/// Fabricate a dictionary entry for one organization.
pub fn entry(organization_id: Uuid, phrase: &str) -> DictionaryEntry {
    DictionaryEntry {
        id: Uuid::new_v4(),
        organization_id,
        phrase: phrase.to_string(),
        guidance: None,
        embedding: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Poll a condition until it holds (virtual time friendly).
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// MockStore
// ============================================================================

#[derive(Default)]
pub struct MockStoreState {
    pub lexical: Vec<DictionaryEntry>,
    pub semantic: Vec<DictionaryEntry>,
    pub entries: Vec<DictionaryEntry>,
    pub counts: ActiveCheckCounts,

    pub fail_lexical: bool,
    pub fail_vector: bool,
    pub fail_insert_violations: bool,

    pub inserted_violations: Vec<(Uuid, Vec<NewViolation>)>,
    pub status_updates: Vec<(Uuid, CheckStatus, StatusFields)>,
    pub embedding_updates: Vec<Uuid>,
}

#[derive(Default)]
pub struct MockStore {
    pub state: Mutex<MockStoreState>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent status written for a check.
    pub fn last_status(&self, check_id: Uuid) -> Option<CheckStatus> {
        self.state
            .lock()
            .unwrap()
            .status_updates
            .iter()
            .rev()
            .find(|(id, _, _)| *id == check_id)
            .map(|(_, status, _)| *status)
    }

    /// Whether any status update ever carried a modified text.
    pub fn modified_text(&self, check_id: Uuid) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .status_updates
            .iter()
            .filter(|(id, _, _)| *id == check_id)
            .find_map(|(_, _, fields)| fields.modified_text.clone())
    }

    /// The most recent error message written for a check.
    pub fn error_message(&self, check_id: Uuid) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .status_updates
            .iter()
            .rev()
            .find(|(id, _, _)| *id == check_id)
            .and_then(|(_, _, fields)| fields.error_message.clone())
    }

    pub fn violations_inserted(&self, check_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .inserted_violations
            .iter()
            .filter(|(id, _)| *id == check_id)
            .map(|(_, rows)| rows.len())
            .sum()
    }
}

#[async_trait]
impl CheckStore for MockStore {
    async fn create_check(
        &self,
        organization_id: Uuid,
        input_type: CheckInputType,
        original_text: Option<String>,
        image_url: Option<String>,
    ) -> Result<Check> {
        Ok(Check {
            id: Uuid::new_v4(),
            organization_id,
            input_type,
            original_text,
            image_url,
            status: CheckStatus::Pending,
            modified_text: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        })
    }

    async fn find_check(&self, _id: Uuid) -> Result<Option<Check>> {
        Ok(None)
    }

    async fn update_check_status(
        &self,
        id: Uuid,
        status: CheckStatus,
        fields: StatusFields,
    ) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .status_updates
            .push((id, status, fields));
        Ok(())
    }

    async fn insert_violations(&self, check_id: Uuid, violations: &[NewViolation]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_insert_violations {
            return Err(anyhow!("violations insert failed"));
        }
        state
            .inserted_violations
            .push((check_id, violations.to_vec()));
        Ok(())
    }

    async fn list_violations(&self, _check_id: Uuid) -> Result<Vec<Violation>> {
        Ok(Vec::new())
    }

    async fn find_similar_by_lexical(
        &self,
        _text: &str,
        _threshold: f32,
        _organization_id: Uuid,
    ) -> Result<Vec<DictionaryEntry>> {
        let state = self.state.lock().unwrap();
        if state.fail_lexical {
            return Err(anyhow!("lexical query failed"));
        }
        Ok(state.lexical.clone())
    }

    async fn find_similar_by_vector(
        &self,
        _embedding: &[f32],
        _max_distance: f32,
        _organization_id: Uuid,
    ) -> Result<Vec<DictionaryEntry>> {
        let state = self.state.lock().unwrap();
        if state.fail_vector {
            return Err(anyhow!("vector query failed"));
        }
        Ok(state.semantic.clone())
    }

    async fn count_active_checks(&self, _organization_id: Uuid) -> Result<ActiveCheckCounts> {
        Ok(self.state.lock().unwrap().counts)
    }

    async fn fetch_dictionary_entries(&self, ids: &[Uuid]) -> Result<Vec<DictionaryEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|entry| ids.contains(&entry.id))
            .cloned()
            .collect())
    }

    async fn update_entry_embedding(&self, id: Uuid, _embedding: &[f32]) -> Result<()> {
        self.state.lock().unwrap().embedding_updates.push(id);
        Ok(())
    }
}

// ============================================================================
// MockCompletions
// ============================================================================

/// What the fake completion service answers with.
pub enum CompletionScript {
    Output(CompletionOutput),
    NetworkError,
    ClientError,
}

pub struct MockCompletions {
    pub script: CompletionScript,
    pub calls: Mutex<Vec<(Vec<ChatMessage>, Option<FunctionSpec>)>>,
    /// When set, park until the gate flips to true before answering.
    pub gate: Option<watch::Receiver<bool>>,
}

impl MockCompletions {
    pub fn answering(output: CompletionOutput) -> Self {
        Self {
            script: CompletionScript::Output(output),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn failing_with_network_error() -> Self {
        Self {
            script: CompletionScript::NetworkError,
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn failing_with_client_error() -> Self {
        Self {
            script: CompletionScript::ClientError,
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseCompletionService for MockCompletions {
    async fn chat_complete(
        &self,
        messages: Vec<ChatMessage>,
        function: Option<FunctionSpec>,
    ) -> Result<CompletionOutput, InferenceError> {
        self.calls.lock().unwrap().push((messages, function));

        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            while !*gate.borrow() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
        }

        match &self.script {
            CompletionScript::Output(output) => Ok(output.clone()),
            CompletionScript::NetworkError => {
                Err(InferenceError::Network("connection reset".into()))
            }
            CompletionScript::ClientError => Err(InferenceError::Api {
                status: 400,
                message: "bad request".into(),
            }),
        }
    }
}

// ============================================================================
// MockEmbeddings
// ============================================================================

pub struct MockEmbeddings {
    pub vector: Vec<f32>,
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl MockEmbeddings {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            vector,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            vector: Vec::new(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BaseEmbeddingService for MockEmbeddings {
    async fn generate(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(InferenceError::Network("embedding endpoint down".into()));
        }
        Ok(self.vector.clone())
    }
}
