//! Response encoding
//!
//! Converts the parser's output into the chat-completion wire format: one
//! complete response object, or a sequence of delta chunks sharing a single
//! completion id, framed as SSE `data:` lines.
//!
//! Token figures are a word-count heuristic (words × 1.3), not tokenizer
//! output. The engine streams whole-text snapshots rather than suffix
//! deltas, and chunks forward those snapshots as-is.

use crate::protocol::{
    ChatCompletionChunk, ChatCompletionResponse, ChatMessage, Choice, CompletionUsage,
    MessageDelta, MessageRole, StreamChoice,
};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Fixed answer used when the stream produced no extractable content.
/// Encoded as an ordinary successful completion, not an error.
pub const NO_RESPONSE_APOLOGY: &str =
    "I apologize, but I couldn't extract a proper response from the stream.";

/// Terminal line of every streamed response.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Generate one completion id: `chatcmpl-` plus 8 hex characters.
pub fn completion_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("chatcmpl-{}", &hex[..8])
}

/// Approximate a token count from whitespace-separated words.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.split_whitespace().count() as f64 * 1.3).round() as u32
}

/// Usage estimate for one query/answer pair.
pub fn usage_for(query: &str, answer: &str) -> CompletionUsage {
    let prompt_tokens = estimate_tokens(query);
    let completion_tokens = estimate_tokens(answer);
    CompletionUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Build the complete (non-streaming) response object.
pub fn completion_response(
    model: &str,
    query: &str,
    answer: &str,
) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: MessageRole::Assistant,
                content: crate::protocol::MessageContent::Text(answer.to_string()),
            },
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(usage_for(query, answer)),
    }
}

/// Build one streaming chunk. `content` of `None` with a finish reason
/// produces the terminal chunk (empty delta).
pub fn stream_chunk(
    id: &str,
    model: &str,
    content: Option<String>,
    finish_reason: Option<&str>,
) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices: vec![StreamChoice {
            index: 0,
            delta: MessageDelta {
                role: None,
                content,
            },
            finish_reason: finish_reason.map(str::to_string),
        }],
    }
}

/// Frame a chunk as an SSE `data:` line.
pub fn sse_data(chunk: &ChatCompletionChunk) -> String {
    // ChatCompletionChunk contains no map types; serialization cannot fail.
    let json = serde_json::to_string(chunk).unwrap_or_default();
    format!("data: {json}\n\n")
}
