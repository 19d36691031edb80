//! Inbound chat-completion protocol
//!
//! The OpenAI-compatible wire contract spoken by gateway clients. The HTTP
//! front door deserializes requests into these types and forwards whatever
//! the adapter emits unmodified.

pub mod types;

pub use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice,
    CompletionUsage, ContentPart, MessageContent, MessageDelta, MessageRole, ModelInfo,
    ModelsResponse, StopSequences, StreamChoice,
};
