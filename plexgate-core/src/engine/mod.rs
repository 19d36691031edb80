//! Perplexity engine client
//!
//! Everything that speaks the engine's side of the wire: typed query
//! parameters, the session-authenticated dispatch, and the SSE answer
//! parser. The engine exposes a single streaming ask endpoint; one query
//! opens one long-lived SSE body carrying `message` frames and an
//! `end_of_stream` terminator.

pub mod error;
pub mod session;
pub mod sse;

pub use error::{EngineError, EngineResult, ErrorClass};
pub use session::{QuotaCount, SearchSession, SessionOptions, SessionQuota};
pub use sse::{FrameKind, StreamFrame, StreamOutcome};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Path of the streaming ask endpoint, relative to the engine base URL.
pub const ASK_PATH: &str = "/rest/sse/perplexity_ask";

/// Engine API version tag carried in every query payload.
pub const ENGINE_VERSION: &str = "2.18";

/// Operating profile of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Auto,
    Pro,
    Reasoning,
    DeepResearch,
}

impl Mode {
    /// Wire value of the `mode` parameter. The engine distinguishes only
    /// the default profile from the assisted ones.
    pub fn wire_mode(&self) -> &'static str {
        match self {
            Mode::Auto => "concise",
            _ => "copilot",
        }
    }

    /// Whether a query in this mode consumes pro-query quota.
    pub fn consumes_pro_quota(&self) -> bool {
        !matches!(self, Mode::Auto)
    }

    /// Underlying models an account-bound session may select in this mode.
    /// The default (no explicit model) is always allowed.
    pub fn allowed_models(&self) -> &'static [&'static str] {
        match self {
            Mode::Auto | Mode::DeepResearch => &[],
            Mode::Pro => &[
                "sonar",
                "gpt-4.5",
                "gpt-4o",
                "claude 3.7 sonnet",
                "gemini 2.0 flash",
                "grok-2",
            ],
            Mode::Reasoning => &["r1", "o3-mini", "claude 3.7 sonnet"],
        }
    }

    /// Wire value of the `model_preference` parameter for an underlying
    /// model in this mode. Unknown combinations fall back to the mode
    /// default; an account-bound session rejects them during validation
    /// before this mapping is consulted.
    pub fn model_preference(&self, model: Option<&str>) -> &'static str {
        match (self, model) {
            (Mode::Auto, _) => "turbo",
            (Mode::Pro, None) => "pplx_pro",
            (Mode::Pro, Some("sonar")) => "experimental",
            (Mode::Pro, Some("gpt-4.5")) => "gpt45",
            (Mode::Pro, Some("gpt-4o")) => "gpt4o",
            (Mode::Pro, Some("claude 3.7 sonnet")) => "claude2",
            (Mode::Pro, Some("gemini 2.0 flash")) => "gemini2flash",
            (Mode::Pro, Some("grok-2")) => "grok",
            (Mode::Pro, Some(_)) => "pplx_pro",
            (Mode::Reasoning, None) => "pplx_reasoning",
            (Mode::Reasoning, Some("r1")) => "r1",
            (Mode::Reasoning, Some("o3-mini")) => "o3mini",
            (Mode::Reasoning, Some("claude 3.7 sonnet")) => "claude37sonnetthinking",
            (Mode::Reasoning, Some(_)) => "pplx_reasoning",
            (Mode::DeepResearch, _) => "pplx_alpha",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Auto => "auto",
            Mode::Pro => "pro",
            Mode::Reasoning => "reasoning",
            Mode::DeepResearch => "deep_research",
        };
        f.write_str(name)
    }
}

/// Content domain the engine may draw from when answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Web,
    Scholar,
    Social,
}

/// Continuation of a prior query's conversational context.
///
/// The translator never produces one (multi-turn continuation is
/// unsupported); the type exists so the session's wire payload models the
/// full parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    /// Attachment URLs carried over from the prior query
    pub attachments: Vec<String>,

    /// Backend identifier of the query being continued
    pub backend_uuid: Option<String>,
}

/// Parameter set for one engine query. Constructed fresh per request and
/// never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// The single query string built from the chat messages
    pub query: String,

    /// Operating profile
    pub mode: Mode,

    /// Underlying model, when the profile supports selecting one
    pub model: Option<String>,

    /// Content domains to draw from
    pub sources: Vec<Source>,

    /// Attachment URLs to include with the query. Upload handling lives
    /// outside this core; the translator always leaves this empty.
    pub files: Vec<String>,

    /// Whether the caller consumes the response incrementally
    pub stream: bool,

    /// ISO 639 language tag
    pub language: String,

    /// Follow-up context, always absent in this core
    pub follow_up: Option<FollowUp>,

    /// Incognito flag
    pub incognito: bool,
}

/// JSON body posted to the ask endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct AskPayload {
    pub query_str: String,
    pub params: AskParams,
}

#[derive(Debug, Serialize)]
pub(crate) struct AskParams {
    pub attachments: Vec<String>,
    pub frontend_context_uuid: Uuid,
    pub frontend_uuid: Uuid,
    pub is_incognito: bool,
    pub language: String,
    pub last_backend_uuid: Option<String>,
    pub mode: &'static str,
    pub model_preference: &'static str,
    pub source: &'static str,
    pub sources: Vec<Source>,
    pub version: &'static str,
}

impl AskPayload {
    /// Assemble the wire payload for one query.
    pub(crate) fn build(params: &QueryParams) -> Self {
        let mut attachments = params.files.clone();
        let mut last_backend_uuid = None;
        if let Some(follow_up) = &params.follow_up {
            attachments.extend(follow_up.attachments.iter().cloned());
            last_backend_uuid = follow_up.backend_uuid.clone();
        }

        Self {
            query_str: params.query.clone(),
            params: AskParams {
                attachments,
                frontend_context_uuid: Uuid::new_v4(),
                frontend_uuid: Uuid::new_v4(),
                is_incognito: params.incognito,
                language: params.language.clone(),
                last_backend_uuid,
                mode: params.mode.wire_mode(),
                model_preference: params.mode.model_preference(params.model.as_deref()),
                source: "default",
                sources: params.sources.clone(),
                version: ENGINE_VERSION,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_mode_distinguishes_auto_from_assisted() {
        assert_eq!(Mode::Auto.wire_mode(), "concise");
        assert_eq!(Mode::Pro.wire_mode(), "copilot");
        assert_eq!(Mode::Reasoning.wire_mode(), "copilot");
        assert_eq!(Mode::DeepResearch.wire_mode(), "copilot");
    }

    #[test]
    fn model_preference_mapping() {
        assert_eq!(Mode::Auto.model_preference(None), "turbo");
        assert_eq!(Mode::Pro.model_preference(None), "pplx_pro");
        assert_eq!(Mode::Pro.model_preference(Some("gpt-4o")), "gpt4o");
        assert_eq!(
            Mode::Reasoning.model_preference(Some("claude 3.7 sonnet")),
            "claude37sonnetthinking"
        );
        assert_eq!(Mode::DeepResearch.model_preference(None), "pplx_alpha");
        // Unknown combinations fall back to the mode default.
        assert_eq!(Mode::Pro.model_preference(Some("unknown")), "pplx_pro");
    }

    #[test]
    fn ask_payload_carries_version_and_sources() {
        let params = QueryParams {
            query: "what is rust".to_string(),
            mode: Mode::Auto,
            model: None,
            sources: vec![Source::Web],
            files: Vec::new(),
            stream: false,
            language: "en-US".to_string(),
            follow_up: None,
            incognito: false,
        };
        let payload = AskPayload::build(&params);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["query_str"], "what is rust");
        assert_eq!(json["params"]["version"], ENGINE_VERSION);
        assert_eq!(json["params"]["mode"], "concise");
        assert_eq!(json["params"]["sources"][0], "web");
        assert_eq!(json["params"]["source"], "default");
        assert!(json["params"]["last_backend_uuid"].is_null());
    }
}
