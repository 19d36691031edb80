//! Request translation
//!
//! Collapses a multi-message chat request into the engine's single query
//! string plus parameter set. System messages become context lines, user
//! messages pass through verbatim, assistant messages are not replayed.

use crate::engine::{EngineError, EngineResult, QueryParams};
use crate::protocol::{ChatCompletionRequest, ChatMessage, MessageRole};
use crate::registry::{default_sources, ModelRegistry, ModelSpec};

/// Build the single query string from the conversation, preserving message
/// order exactly. Assistant messages are skipped silently.
pub fn build_query(messages: &[ChatMessage]) -> String {
    let mut parts = Vec::new();
    for message in messages {
        match message.role {
            MessageRole::System => {
                parts.push(format!("Context: {}", message.content.normalized()));
            }
            MessageRole::User => parts.push(message.content.normalized()),
            MessageRole::Assistant => {}
        }
    }
    parts.join("\n\n")
}

/// Resolve a client-facing model identifier against the registry.
pub fn resolve_model<'r>(
    registry: &'r ModelRegistry,
    model_id: &str,
) -> EngineResult<&'r ModelSpec> {
    registry.lookup(model_id).ok_or_else(|| {
        EngineError::validation(
            "model",
            format!(
                "'{}' is not recognized; known models: {}",
                model_id,
                registry.known_ids().join(", ")
            ),
        )
    })
}

/// Build the engine parameter set for one request.
///
/// Sources come from the registry's per-mode defaults, never from the
/// request. File attachments and follow-up context are unsupported here
/// and always empty.
pub fn build_params(
    request: &ChatCompletionRequest,
    spec: &ModelSpec,
    language: &str,
) -> QueryParams {
    QueryParams {
        query: build_query(&request.messages),
        mode: spec.mode,
        model: spec.underlying_model.map(str::to_string),
        sources: default_sources(spec.mode),
        files: Vec::new(),
        stream: request.wants_stream(),
        language: language.to_string(),
        follow_up: None,
        incognito: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Mode, Source};

    #[test]
    fn system_messages_become_context_lines() {
        let query = build_query(&[
            ChatMessage::system("be terse"),
            ChatMessage::user("what is 2+2?"),
        ]);
        assert_eq!(query, "Context: be terse\n\nwhat is 2+2?");
    }

    #[test]
    fn assistant_messages_are_dropped() {
        let query = build_query(&[
            ChatMessage::user("first question"),
            ChatMessage::assistant("earlier answer"),
            ChatMessage::user("second question"),
        ]);
        assert_eq!(query, "first question\n\nsecond question");
        assert!(!query.contains("earlier answer"));
    }

    #[test]
    fn message_order_is_preserved() {
        let query = build_query(&[
            ChatMessage::user("alpha"),
            ChatMessage::system("beta"),
            ChatMessage::user("gamma"),
        ]);
        assert_eq!(query, "alpha\n\nContext: beta\n\ngamma");
    }

    #[test]
    fn unknown_model_error_lists_known_ids() {
        let registry = ModelRegistry::builtin();
        let err = resolve_model(&registry, "gpt-4").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gpt-4"));
        assert!(message.contains("perplexity-auto"));
    }

    #[test]
    fn params_take_mode_defaults_not_request_values() {
        let registry = ModelRegistry::builtin();
        let spec = registry.lookup("perplexity-research").unwrap();
        let request = ChatCompletionRequest::new(
            "perplexity-research",
            vec![ChatMessage::user("dig deep")],
        )
        .with_streaming();

        let params = build_params(&request, spec, "en-US");
        assert_eq!(params.mode, Mode::DeepResearch);
        assert_eq!(params.sources, vec![Source::Web, Source::Scholar]);
        assert!(params.stream);
        assert!(params.files.is_empty());
        assert!(params.follow_up.is_none());
        assert!(!params.incognito);
        assert_eq!(params.language, "en-US");
    }
}
