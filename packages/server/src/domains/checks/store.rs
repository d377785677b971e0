//! Repository contract for checks, violations, and dictionary entries.
//!
//! The trait is the only surface the pipeline and workers see; the
//! PostgreSQL implementation lives alongside it, and tests swap in an
//! in-memory mock.

use anyhow::Result;
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Check, CheckInputType, CheckStatus, NewViolation, Violation};
use crate::domains::dictionary::models::DictionaryEntry;

/// Pending/processing counters for one organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ActiveCheckCounts {
    pub pending: i64,
    pub processing: i64,
}

/// Fields written together with a status transition.
#[derive(Debug, Clone, Default)]
pub struct StatusFields {
    pub modified_text: Option<String>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn create_check(
        &self,
        organization_id: Uuid,
        input_type: CheckInputType,
        original_text: Option<String>,
        image_url: Option<String>,
    ) -> Result<Check>;

    async fn find_check(&self, id: Uuid) -> Result<Option<Check>>;

    /// Atomically move a check to `status`, writing the given fields and
    /// stamping `completed_at` on terminal transitions.
    async fn update_check_status(
        &self,
        id: Uuid,
        status: CheckStatus,
        fields: StatusFields,
    ) -> Result<()>;

    async fn insert_violations(&self, check_id: Uuid, violations: &[NewViolation]) -> Result<()>;

    async fn list_violations(&self, check_id: Uuid) -> Result<Vec<Violation>>;

    /// Dictionary entries whose phrase is lexically similar to the text
    /// (trigram similarity >= threshold), scoped to the organization.
    async fn find_similar_by_lexical(
        &self,
        text: &str,
        threshold: f32,
        organization_id: Uuid,
    ) -> Result<Vec<DictionaryEntry>>;

    /// Dictionary entries whose embedding is within `max_distance` (cosine)
    /// of the given vector, scoped to the organization.
    async fn find_similar_by_vector(
        &self,
        embedding: &[f32],
        max_distance: f32,
        organization_id: Uuid,
    ) -> Result<Vec<DictionaryEntry>>;

    async fn count_active_checks(&self, organization_id: Uuid) -> Result<ActiveCheckCounts>;

    async fn fetch_dictionary_entries(&self, ids: &[Uuid]) -> Result<Vec<DictionaryEntry>>;

    async fn update_entry_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()>;
}

// ============================================================================
// PostgreSQL implementation
// ============================================================================

pub struct PgCheckStore {
    pool: PgPool,
}

impl PgCheckStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckStore for PgCheckStore {
    async fn create_check(
        &self,
        organization_id: Uuid,
        input_type: CheckInputType,
        original_text: Option<String>,
        image_url: Option<String>,
    ) -> Result<Check> {
        let check = sqlx::query_as::<_, Check>(
            r#"
            INSERT INTO checks (id, organization_id, input_type, original_text, image_url, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id, organization_id, input_type, original_text, image_url, status,
                      modified_text, error_message, created_at, updated_at, completed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(input_type)
        .bind(original_text)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(check)
    }

    async fn find_check(&self, id: Uuid) -> Result<Option<Check>> {
        let check = sqlx::query_as::<_, Check>(
            r#"
            SELECT id, organization_id, input_type, original_text, image_url, status,
                   modified_text, error_message, created_at, updated_at, completed_at
            FROM checks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(check)
    }

    async fn update_check_status(
        &self,
        id: Uuid,
        status: CheckStatus,
        fields: StatusFields,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE checks
            SET status = $2,
                modified_text = COALESCE($3, modified_text),
                error_message = $4,
                completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(fields.modified_text)
        .bind(fields.error_message)
        .bind(status.is_terminal())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_violations(&self, check_id: Uuid, violations: &[NewViolation]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for violation in violations {
            sqlx::query(
                r#"
                INSERT INTO violations (id, check_id, start_pos, end_pos, reason, dictionary_entry_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(check_id)
            .bind(violation.start_pos)
            .bind(violation.end_pos)
            .bind(&violation.reason)
            .bind(violation.dictionary_entry_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_violations(&self, check_id: Uuid) -> Result<Vec<Violation>> {
        let violations = sqlx::query_as::<_, Violation>(
            r#"
            SELECT id, check_id, start_pos, end_pos, reason, dictionary_entry_id, created_at
            FROM violations
            WHERE check_id = $1
            ORDER BY start_pos ASC
            "#,
        )
        .bind(check_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(violations)
    }

    async fn find_similar_by_lexical(
        &self,
        text: &str,
        threshold: f32,
        organization_id: Uuid,
    ) -> Result<Vec<DictionaryEntry>> {
        let entries = sqlx::query_as::<_, DictionaryEntry>(
            r#"
            SELECT id, organization_id, phrase, guidance, embedding, created_at, updated_at
            FROM dictionary_entries
            WHERE organization_id = $1
              AND similarity(phrase, $2) >= $3
            ORDER BY similarity(phrase, $2) DESC
            "#,
        )
        .bind(organization_id)
        .bind(text)
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn find_similar_by_vector(
        &self,
        embedding: &[f32],
        max_distance: f32,
        organization_id: Uuid,
    ) -> Result<Vec<DictionaryEntry>> {
        let vector = Vector::from(embedding.to_vec());
        let entries = sqlx::query_as::<_, DictionaryEntry>(
            r#"
            SELECT id, organization_id, phrase, guidance, embedding, created_at, updated_at
            FROM dictionary_entries
            WHERE organization_id = $1
              AND embedding IS NOT NULL
              AND embedding <=> $2 < $3
            ORDER BY embedding <=> $2 ASC
            "#,
        )
        .bind(organization_id)
        .bind(vector)
        .bind(max_distance as f64)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn count_active_checks(&self, organization_id: Uuid) -> Result<ActiveCheckCounts> {
        let (pending, processing) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'pending'),
                   COUNT(*) FILTER (WHERE status = 'processing')
            FROM checks
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ActiveCheckCounts {
            pending,
            processing,
        })
    }

    async fn fetch_dictionary_entries(&self, ids: &[Uuid]) -> Result<Vec<DictionaryEntry>> {
        let entries = sqlx::query_as::<_, DictionaryEntry>(
            r#"
            SELECT id, organization_id, phrase, guidance, embedding, created_at, updated_at
            FROM dictionary_entries
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn update_entry_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        let vector = Vector::from(embedding.to_vec());
        sqlx::query(
            r#"
            UPDATE dictionary_entries
            SET embedding = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(vector)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
