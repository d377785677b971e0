use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One regulated phrase in an organization's dictionary.
///
/// The embedding is regenerated out-of-band by the embedding-batch job and is
/// `None` until the first regeneration completes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DictionaryEntry {
    pub id: Uuid,
    pub organization_id: Uuid,

    /// The regulated phrase itself (trigram-indexed for lexical matching)
    pub phrase: String,

    /// Why the phrase is regulated / how to rewrite around it
    pub guidance: Option<String>,

    pub embedding: Option<pgvector::Vector>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
