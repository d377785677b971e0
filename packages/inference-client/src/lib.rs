//! Pure REST client for the AI inference service.
//!
//! A minimal client with no domain-specific logic. Supports chat completions
//! (plain text or structured function-call output) and embeddings.
//!
//! # Example
//!
//! ```rust,ignore
//! use inference_client::{ChatMessage, ChatRequest, InferenceClient};
//!
//! let client = InferenceClient::from_env()?;
//!
//! // Plain chat completion
//! let output = client
//!     .chat_complete(ChatRequest::new("gpt-4o").message(ChatMessage::user("Hello!")))
//!     .await?;
//!
//! // Embeddings
//! let embedding = client.create_embedding("text to embed", "text-embedding-3-small").await?;
//! ```
//!
//! # Structured output
//!
//! Attach a [`FunctionSpec`] to the request and the model is forced to answer
//! through a tool call. The response is a tagged [`CompletionOutput`]: either
//! `Structured(args)` when the call came back as requested, or `Text(content)`
//! when the model answered in prose anyway; callers decide how to recover.

pub mod error;
pub mod schema;
pub mod types;

pub use error::{InferenceError, Result};
pub use schema::FunctionArgs;
pub use types::*;

use reqwest::Client;
use tracing::{debug, warn};

use crate::types::{ChatMessageRaw, ChatResponseRaw};

/// Inference service API client.
#[derive(Clone)]
pub struct InferenceClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl InferenceClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Create from the `INFERENCE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("INFERENCE_API_KEY")
            .map_err(|_| InferenceError::Config("INFERENCE_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies or compatible providers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    ///
    /// When the request carries a [`FunctionSpec`] the service is asked for a
    /// forced tool call; otherwise a plain text answer.
    pub async fn chat_complete(&self, request: ChatRequest) -> Result<CompletionOutput> {
        let start = std::time::Instant::now();

        let mut body = serde_json::to_value(&request)
            .map_err(|e| InferenceError::Parse(format!("failed to serialize request: {}", e)))?;
        if let Some(function) = &request.function {
            body["tools"] = serde_json::json!([function.to_tool()]);
            body["tool_choice"] = function.to_tool_choice();
        }

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "inference request failed");
                InferenceError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "inference API error");
            if status.as_u16() == 429 {
                return Err(InferenceError::RateLimited(error_text));
            }
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let chat_response: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        let message = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| InferenceError::Api {
                status: status.as_u16(),
                message: "empty completion response".into(),
            })?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "chat completion"
        );

        completion_from_message(message)
    }

    /// Create an embedding for the given text.
    ///
    /// Returns a vector (typically 1536 dimensions for text-embedding-3-small).
    pub async fn create_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let request = types::EmbeddingRequest {
            model: model.to_string(),
            input: text.to_string(),
        };

        let response = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "embedding request failed");
                InferenceError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "embedding API error");
            if status.as_u16() == 429 {
                return Err(InferenceError::RateLimited(error_text));
            }
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let embed_response: types::EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| InferenceError::Parse("no embedding in response".into()))
    }
}

/// Resolve a raw assistant message into the tagged completion output.
///
/// Tool calls win over content when both are present: a structured answer is
/// what the caller asked for.
fn completion_from_message(message: ChatMessageRaw) -> Result<CompletionOutput> {
    if let Some(call) = message
        .tool_calls
        .and_then(|calls| calls.into_iter().next())
    {
        let args: serde_json::Value = serde_json::from_str(&call.function.arguments)
            .map_err(|e| InferenceError::Parse(format!("invalid tool-call arguments: {}", e)))?;
        return Ok(CompletionOutput::Structured(args));
    }

    match message.content {
        Some(content) => Ok(CompletionOutput::Text(content)),
        None => Err(InferenceError::Parse(
            "completion had neither tool calls nor content".into(),
        )),
    }
}
