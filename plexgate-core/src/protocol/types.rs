//! Wire types for the chat-completion contract
//!
//! These structures mirror the OpenAI chat-completion request/response
//! format field for field. The design prioritizes:
//! - Type safety through enums and strong typing
//! - Tolerance of client variation through optional fields
//! - Streaming support through a dedicated chunk type

use serde::{Deserialize, Serialize};

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions providing context for the query
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
}

/// Content of a message - plain text or a sequence of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Structured content parts
    Parts(Vec<ContentPart>),
}

/// Individual content part for structured message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content part
    Text { text: String },
    /// Any part type the gateway does not understand. Dropped during
    /// normalization rather than rejected.
    #[serde(other)]
    Unsupported,
}

impl MessageContent {
    /// Flatten content to a single string.
    ///
    /// Text parts are concatenated in original order, joined by newline.
    /// Non-text parts contribute nothing.
    pub fn normalized(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Unsupported => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Check if content is empty
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(s) => s.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Stop sequences - a single string or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatCompletionRequest {
    /// Client-facing model identifier
    #[serde(default)]
    pub model: String,

    /// Messages in the conversation
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate (accepted, not enforced by the engine)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Sampling temperature (accepted, not forwarded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter (accepted, not forwarded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Number of completions to generate (the engine produces one)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,

    /// Streaming toggle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Stop sequences (accepted, not forwarded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,

    /// Presence penalty (accepted, not forwarded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Frequency penalty (accepted, not forwarded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// User identifier for abuse detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChatCompletionRequest {
    /// Create a new request with model and messages
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Enable streaming
    pub fn with_streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }

    /// Whether the client asked for a streamed response
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Token usage information.
///
/// Figures are a word-count approximation, not tokenizer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One completion choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    pub index: usize,

    /// Generated message
    pub message: ChatMessage,

    /// Finish reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Complete (non-streaming) chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique completion id
    pub id: String,

    /// Object type, always "chat.completion"
    pub object: String,

    /// Creation timestamp (unix seconds)
    pub created: i64,

    /// Client-facing model identifier
    pub model: String,

    /// Completion choices (always a single choice)
    pub choices: Vec<Choice>,

    /// Token usage estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

/// Delta message carried by a streaming chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MessageDelta {
    /// Role, present on the first chunk only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,

    /// Content delta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Streaming choice with delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index
    pub index: usize,

    /// Delta content
    pub delta: MessageDelta,

    /// Finish reason, present on the terminal chunk only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Streaming response chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Completion id, identical across all chunks of one stream
    pub id: String,

    /// Object type, always "chat.completion.chunk"
    pub object: String,

    /// Creation timestamp (unix seconds)
    pub created: i64,

    /// Client-facing model identifier
    pub model: String,

    /// Delta choices
    pub choices: Vec<StreamChoice>,
}

/// Model listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,

    /// Object type, always "model"
    pub object: String,

    /// Listing timestamp (unix seconds)
    pub created: i64,

    /// Organization that owns the model
    pub owned_by: String,
}

/// Model listing response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Object type, always "list"
    pub object: String,

    /// Available models
    pub data: Vec<ModelInfo>,
}
