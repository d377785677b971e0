//! Persisted models for compliance checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// What kind of content was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "check_input_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckInputType {
    Text,
    Image,
}

/// Persisted status of a check, mirrored from the job state.
///
/// `pending -> processing -> {completed, failed}`; `pending` and
/// `processing` can additionally transition to `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "check_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl CheckStatus {
    /// Whether this status ends the check's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckStatus::Completed | CheckStatus::Failed | CheckStatus::Cancelled
        )
    }
}

// ============================================================================
// Check
// ============================================================================

/// A submitted compliance check.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Check {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub input_type: CheckInputType,

    /// Submitted text (text checks)
    pub original_text: Option<String>,
    /// Submitted image location (image checks)
    pub image_url: Option<String>,

    pub status: CheckStatus,

    /// Compliant rewrite, written together with the `completed` transition
    pub modified_text: Option<String>,

    /// Categorized human-readable failure summary for the UI
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Violation
// ============================================================================

/// A phrase-level violation found in a check.
///
/// Offsets are the AI's best-effort character positions into the checked
/// text; `0 <= start_pos < end_pos <= len(text)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Violation {
    pub id: Uuid,
    pub check_id: Uuid,
    pub start_pos: i32,
    pub end_pos: i32,
    pub reason: String,
    pub dictionary_entry_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A violation row before insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewViolation {
    pub start_pos: i32,
    pub end_pos: i32,
    pub reason: String,
    pub dictionary_entry_id: Option<Uuid>,
}
