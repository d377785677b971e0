// Inference service implementations of the kernel infrastructure traits.
//
// Thin adapters over the inference-client crate; the model for each
// capability is fixed at construction from configuration.

use std::sync::Arc;

use async_trait::async_trait;
use inference_client::{
    ChatMessage, ChatRequest, CompletionOutput, FunctionSpec, InferenceClient, InferenceError,
};

use super::traits::{BaseCompletionService, BaseEmbeddingService};

/// Chat completions through the inference service.
#[derive(Clone)]
pub struct InferenceCompletionService {
    client: Arc<InferenceClient>,
    model: String,
}

impl InferenceCompletionService {
    pub fn new(client: Arc<InferenceClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl BaseCompletionService for InferenceCompletionService {
    async fn chat_complete(
        &self,
        messages: Vec<ChatMessage>,
        function: Option<FunctionSpec>,
    ) -> Result<CompletionOutput, InferenceError> {
        let mut request = ChatRequest::new(&self.model)
            .messages(messages)
            .temperature(0.0);
        if let Some(function) = function {
            request = request.function(function);
        }

        self.client.chat_complete(request).await
    }
}

/// Embeddings through the inference service.
#[derive(Clone)]
pub struct InferenceEmbeddingService {
    client: Arc<InferenceClient>,
    model: String,
}

impl InferenceEmbeddingService {
    pub fn new(client: Arc<InferenceClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl BaseEmbeddingService for InferenceEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        self.client.create_embedding(text, &self.model).await
    }
}
