//! Regulated-claims dictionary: entries and embedding regeneration.

pub mod models;
pub mod worker;

pub use models::DictionaryEntry;
pub use worker::{EmbeddingBatchHandler, EmbeddingBatchPayload};
