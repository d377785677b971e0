//! Job model for dispatchable background work.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// Lifecycle state of a dispatched job.
///
/// Legal transitions:
///   queued -> processing -> {completed, failed}
///   queued -> cancelled
///   processing -> cancelled
///   processing -> queued (transient failure with retries remaining)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether this state ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Classified failure returned by a job handler.
#[derive(Debug, Error)]
pub enum JobError {
    /// Infrastructure hiccup - retried with backoff while attempts remain.
    #[error("{0}")]
    Transient(String),

    /// Will not get better on retry - fails the job immediately.
    #[error("{0}")]
    Permanent(String),
}

impl JobError {
    pub fn transient(message: impl Into<String>) -> Self {
        JobError::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        JobError::Permanent(message.into())
    }

    /// Whether this failure kind should trigger a retry.
    pub fn should_retry(&self) -> bool {
        matches!(self, JobError::Transient(_))
    }
}

/// Error returned by `Dispatcher::enqueue` for malformed payloads.
#[derive(Debug, Error)]
#[error("invalid job payload: {0}")]
pub struct InvalidPayload(pub String);

// ============================================================================
// Job
// ============================================================================

/// A unit of dispatchable work, owned by the dispatcher's job map.
pub(crate) struct Job<P> {
    pub id: Uuid,
    pub payload: P,
    pub state: JobState,
    pub attempts: u32,
    /// Earliest instant a retried job becomes eligible for admission.
    pub not_before: Option<Instant>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub cancel: CancellationToken,
    /// Bumped on every terminal transition; stale eviction timers check it.
    pub eviction_epoch: u64,
}

impl<P> Job<P> {
    pub fn new(payload: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            state: JobState::Queued,
            attempts: 0,
            not_before: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            failure_reason: None,
            cancel: CancellationToken::new(),
            eviction_epoch: 0,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            state: self.state,
            attempts: self.attempts,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            result: self.result.clone(),
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Externally visible view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub state: JobState,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
}

// ============================================================================
// Pool status
// ============================================================================

/// Aggregate queue counters for one dispatcher instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub pending: usize,
    pub in_flight: usize,
    pub max_concurrent: usize,
}

impl PoolStatus {
    /// Slots free for new work right now.
    pub fn available_slots(&self) -> usize {
        self.max_concurrent.saturating_sub(self.in_flight)
    }

    /// Whether a newly enqueued job would start without queueing.
    pub fn accepting(&self) -> bool {
        self.available_slots() > 0
    }
}
