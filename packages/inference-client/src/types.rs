//! Inference API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Chat Completion
// =============================================================================

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use (e.g., "gpt-4o")
    pub model: String,

    /// Conversation messages
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens in the completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Function the model is asked to call for structured output.
    ///
    /// Not serialized directly; the client expands it into the wire-level
    /// `tools` / `tool_choice` fields.
    #[serde(skip_serializing)]
    pub function: Option<FunctionSpec>,
}

impl ChatRequest {
    /// Create a new chat request with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            function: None,
        }
    }

    /// Add a message to the conversation.
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Replace the conversation messages.
    pub fn messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Request structured output through the given function.
    pub fn function(mut self, function: FunctionSpec) -> Self {
        self.function = Some(function);
        self
    }
}

/// Chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant"
    pub role: String,

    /// Message content: plain text or multi-part (text + image)
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message carrying an image plus an instruction.
    pub fn user_image(instruction: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: instruction.into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }
}

/// Message content, either a plain string or structured parts.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Image reference inside a multi-part message.
#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

// =============================================================================
// Completion output
// =============================================================================

/// What the model answered with.
///
/// The service responds either with a structured tool call (when a
/// [`FunctionSpec`] was supplied and honored) or with plain assistant text.
/// Callers match on this once instead of shape-sniffing the raw response.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutput {
    /// Parsed arguments of the requested function call.
    Structured(Value),
    /// Plain text content.
    Text(String),
}

impl CompletionOutput {
    /// The plain text content, if this is a text output.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CompletionOutput::Text(content) => Some(content),
            CompletionOutput::Structured(_) => None,
        }
    }
}

// =============================================================================
// Function calling
// =============================================================================

/// A function the model can be asked to call for structured output.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    /// The name of the function.
    pub name: String,

    /// A description of what the function reports.
    pub description: String,

    /// JSON schema for the function's parameters.
    pub parameters: Value,
}

impl FunctionSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Convert to the wire-level tool definition.
    pub fn to_tool(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// Tool-choice value forcing this function to be called.
    pub fn to_tool_choice(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": { "name": self.name }
        })
    }
}

// =============================================================================
// Raw response shapes (internal parsing)
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseRaw {
    pub choices: Vec<ChatChoiceRaw>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceRaw {
    pub message: ChatMessageRaw,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessageRaw {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRaw>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallRaw {
    pub function: FunctionCallRaw,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FunctionCallRaw {
    #[allow(dead_code)]
    pub name: String,
    /// JSON-encoded arguments string
    pub arguments: String,
}

// =============================================================================
// Embeddings
// =============================================================================

/// Embedding request.
#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest {
    /// Model to use (e.g., "text-embedding-3-small")
    pub model: String,

    /// Text to embed
    pub input: String,
}

/// Embedding response.
#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingData {
    pub embedding: Vec<f32>,
}
