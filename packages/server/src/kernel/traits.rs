// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. Domain code
// decides what to ask the inference service for; implementations of these
// traits only move the request over the wire.
//
// Naming convention: Base* for trait names.

use async_trait::async_trait;
use inference_client::{ChatMessage, CompletionOutput, FunctionSpec, InferenceError};

// =============================================================================
// Chat completion (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseCompletionService: Send + Sync {
    /// Run a chat completion.
    ///
    /// When `function` is given the service is asked for structured tool-call
    /// output; it may still answer with plain text, which callers handle via
    /// the tagged [`CompletionOutput`].
    async fn chat_complete(
        &self,
        messages: Vec<ChatMessage>,
        function: Option<FunctionSpec>,
    ) -> Result<CompletionOutput, InferenceError>;
}

// =============================================================================
// Embedding service (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn generate(&self, text: &str) -> Result<Vec<f32>, InferenceError>;
}
