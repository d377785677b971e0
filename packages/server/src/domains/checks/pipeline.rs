//! Multi-stage dictionary filtering and AI rewriting.
//!
//! Turns `(text, organization)` into a rewrite plus a violation list in three
//! narrowing steps, each with a fallback so a single stage failure never
//! aborts the check:
//!
//! 1. Lexical pre-filter: trigram similarity against the organization's
//!    dictionary (empty candidate set on error).
//! 2. Semantic filter: embed the input and match by vector distance, merged
//!    with the lexical result (degrades to truncated lexical on error).
//! 3. Rule engine: chat completion over the shortlisted entries, asked for
//!    structured output (plain-text answers go through best-effort
//!    extraction; see `extract`).

use std::collections::HashSet;
use std::sync::Arc;

use inference_client::{ChatMessage, FunctionArgs, FunctionSpec, InferenceError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::extract::{parse_rewrite, RewriteOutcome, RewriteResponse};
use super::store::CheckStore;
use crate::domains::dictionary::models::DictionaryEntry;
use crate::kernel::traits::{BaseCompletionService, BaseEmbeddingService};

/// Lexical similarity floor for the trigram pre-filter.
const LEXICAL_THRESHOLD: f32 = 0.3;
/// Cosine distance ceiling for the semantic filter (similarity > 0.75).
const VECTOR_MAX_DISTANCE: f32 = 0.25;
/// At or above this many lexical candidates the merge is skipped and the
/// semantic result stands alone.
const LEXICAL_MERGE_LIMIT: usize = 1000;
/// Lexical fallback size when the semantic stage is unavailable.
const LEXICAL_FALLBACK_LIMIT: usize = 100;
/// How many shortlisted entries the rule engine sees.
const RULE_ENGINE_ENTRY_LIMIT: usize = 50;

const SYSTEM_PROMPT: &str = "You are a compliance reviewer for regulated marketing claims. \
Rewrite the submitted content so it makes no regulated claims, changing as little as possible, \
and report every violating span with character offsets into the ORIGINAL text.";

pub struct FilterPipeline {
    store: Arc<dyn CheckStore>,
    completions: Arc<dyn BaseCompletionService>,
    embeddings: Arc<dyn BaseEmbeddingService>,
}

impl FilterPipeline {
    pub fn new(
        store: Arc<dyn CheckStore>,
        completions: Arc<dyn BaseCompletionService>,
        embeddings: Arc<dyn BaseEmbeddingService>,
    ) -> Self {
        Self {
            store,
            completions,
            embeddings,
        }
    }

    /// Screen a text submission.
    ///
    /// Only rule-engine infrastructure errors escape; filtering stages degrade
    /// internally and unparseable responses fall back to the original text.
    pub async fn run_text(
        &self,
        text: &str,
        organization_id: Uuid,
    ) -> Result<RewriteOutcome, InferenceError> {
        let candidates = self.filter_candidates(text, organization_id).await;
        debug!(
            organization_id = %organization_id,
            candidates = candidates.len(),
            "running rule engine"
        );

        let shortlist = &candidates[..candidates.len().min(RULE_ENGINE_ENTRY_LIMIT)];
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Regulated phrases for this organization:\n{}\n\nContent to check:\n{}",
                dictionary_block(shortlist),
                text
            )),
        ];

        let output = self
            .completions
            .chat_complete(messages, Some(rewrite_function()))
            .await?;

        Ok(parse_rewrite(&output, text))
    }

    /// Screen an image submission.
    ///
    /// There is no text to narrow the dictionary with, so the image goes to
    /// the rule engine directly and violation offsets are not meaningful.
    pub async fn run_image(
        &self,
        image_url: &str,
        organization_id: Uuid,
    ) -> Result<RewriteOutcome, InferenceError> {
        debug!(organization_id = %organization_id, "running rule engine on image");

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_image(
                "Check the claims made in this image and report a compliant rewrite of its text.",
                image_url,
            ),
        ];

        let output = self
            .completions
            .chat_complete(messages, Some(rewrite_function()))
            .await?;

        Ok(parse_rewrite(&output, ""))
    }

    /// Narrow the dictionary to candidates relevant to the text.
    pub(crate) async fn filter_candidates(
        &self,
        text: &str,
        organization_id: Uuid,
    ) -> Vec<DictionaryEntry> {
        let mut lexical = match self
            .store
            .find_similar_by_lexical(text, LEXICAL_THRESHOLD, organization_id)
            .await
        {
            Ok(entries) => entries,
            Err(error) => {
                warn!(error = %error, "lexical pre-filter failed, continuing with empty candidate set");
                Vec::new()
            }
        };

        if lexical.is_empty() {
            return lexical;
        }

        let embedding = match self.embeddings.generate(text).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!(error = %error, "embedding failed, degrading to lexical candidates");
                lexical.truncate(LEXICAL_FALLBACK_LIMIT);
                return lexical;
            }
        };

        let semantic = match self
            .store
            .find_similar_by_vector(&embedding, VECTOR_MAX_DISTANCE, organization_id)
            .await
        {
            Ok(entries) => entries,
            Err(error) => {
                warn!(error = %error, "semantic filter failed, degrading to lexical candidates");
                lexical.truncate(LEXICAL_FALLBACK_LIMIT);
                return lexical;
            }
        };

        if lexical.len() >= LEXICAL_MERGE_LIMIT {
            // The lexical set is too broad to be a useful signal.
            return semantic;
        }

        merge_candidates(lexical, semantic)
    }
}

/// Union of both filter results, deduplicated by entry id. Entries both
/// filters agree on rank first so they survive the rule-engine shortlist cut.
pub(crate) fn merge_candidates(
    lexical: Vec<DictionaryEntry>,
    semantic: Vec<DictionaryEntry>,
) -> Vec<DictionaryEntry> {
    let semantic_ids: HashSet<Uuid> = semantic.iter().map(|entry| entry.id).collect();

    let mut merged = Vec::with_capacity(lexical.len() + semantic.len());
    let mut seen: HashSet<Uuid> = HashSet::new();

    for entry in lexical.iter().filter(|e| semantic_ids.contains(&e.id)) {
        if seen.insert(entry.id) {
            merged.push(entry.clone());
        }
    }
    for entry in lexical.into_iter().chain(semantic) {
        if seen.insert(entry.id) {
            merged.push(entry);
        }
    }

    merged
}

/// The function the rule engine reports through.
fn rewrite_function() -> FunctionSpec {
    FunctionSpec::new(
        "report_rewrite",
        "Report the compliant rewrite and the violations found in the submitted content",
        RewriteResponse::function_schema(),
    )
}

/// Render shortlisted entries for the prompt. An empty shortlist is valid
/// and simply yields a weaker prompt.
fn dictionary_block(entries: &[DictionaryEntry]) -> String {
    if entries.is_empty() {
        return "(no dictionary entries matched; flag only clearly regulated claims)".to_string();
    }

    entries
        .iter()
        .map(|entry| match &entry.guidance {
            Some(guidance) => format!("- [{}] \"{}\": {}", entry.id, entry.phrase, guidance),
            None => format!("- [{}] \"{}\"", entry.id, entry.phrase),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
