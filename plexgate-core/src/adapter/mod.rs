//! Adapter core
//!
//! Ties the two protocol worlds together: the [`Gateway`] resolves the
//! client-facing model, translates the chat request into an engine query,
//! drives the session and stream parser, and encodes the result back into
//! the chat-completion contract. The HTTP front door forwards whatever
//! these operations emit, unmodified.

pub mod encode;
pub mod translate;

use crate::config::GatewayConfig;
use crate::engine::sse::{self, AnswerEvent, StreamOutcome};
use crate::engine::{EngineError, EngineResult, SearchSession};
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, ModelInfo, ModelsResponse};
use crate::registry::ModelRegistry;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// The protocol-translation gateway.
///
/// Holds the immutable model registry and a shared engine session. Each
/// request is handled independently; the only cross-request state is the
/// session's quota counters.
pub struct Gateway {
    registry: ModelRegistry,
    session: Arc<SearchSession>,
    language: String,
}

impl Gateway {
    /// Assemble a gateway from its parts.
    pub fn new(
        registry: ModelRegistry,
        session: Arc<SearchSession>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            session,
            language: language.into(),
        }
    }

    /// Build a gateway from loaded configuration, creating the engine
    /// session from the injected credentials.
    pub fn from_config(config: &GatewayConfig) -> EngineResult<Self> {
        let session = SearchSession::new(config.session_options())?;
        Ok(Self::new(
            ModelRegistry::builtin(),
            Arc::new(session),
            config.engine.language.clone(),
        ))
    }

    /// Registry entries in the model-listing wire shape.
    pub fn list_models(&self) -> ModelsResponse {
        let created = encode::unix_now();
        ModelsResponse {
            object: "list".to_string(),
            data: self
                .registry
                .specs()
                .iter()
                .map(|spec| ModelInfo {
                    id: spec.id.to_string(),
                    object: "model".to_string(),
                    created,
                    owned_by: "perplexity".to_string(),
                })
                .collect(),
        }
    }

    /// Handle one non-streaming completion.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> EngineResult<ChatCompletionResponse> {
        let spec = translate::resolve_model(&self.registry, &request.model)?;
        let params = translate::build_params(request, spec, &self.language);
        info!(model = %request.model, mode = %params.mode, "handling completion");

        let frames = self.session.query(&params).await?;
        let answer = match sse::collect_answer(frames).await {
            StreamOutcome::Answer(text) => text,
            StreamOutcome::NoResponse => {
                warn!(model = %request.model, "no answer extracted from stream");
                encode::NO_RESPONSE_APOLOGY.to_string()
            }
            StreamOutcome::Empty => return Err(EngineError::UpstreamUnavailable),
        };

        Ok(encode::completion_response(
            &request.model,
            &params.query,
            &answer,
        ))
    }

    /// Handle one streaming completion.
    ///
    /// Returns the sequence of SSE-framed lines to forward: one chunk per
    /// grown answer snapshot, exactly one terminal chunk (empty delta,
    /// finish reason "stop"), then the `[DONE]` sentinel. All chunks share
    /// one completion id. A mid-stream failure becomes an error-content
    /// chunk; the stream still closes with the terminal chunk and sentinel.
    pub async fn complete_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> EngineResult<impl Stream<Item = String> + Send> {
        let spec = translate::resolve_model(&self.registry, &request.model)?;
        let mut params = translate::build_params(request, spec, &self.language);
        params.stream = true;
        info!(model = %request.model, mode = %params.mode, "handling streamed completion");

        let frames = self.session.query(&params).await?;
        let completion_id = encode::completion_id();
        let model = request.model.clone();

        let out = async_stream::stream! {
            let events = sse::answer_events(frames);
            tokio::pin!(events);
            while let Some(event) = events.next().await {
                match event {
                    AnswerEvent::Snapshot(text) => {
                        yield encode::sse_data(&encode::stream_chunk(
                            &completion_id,
                            &model,
                            Some(text),
                            None,
                        ));
                    }
                    AnswerEvent::Failed(err) => {
                        warn!(error = %err, "stream failed after open; emitting error chunk");
                        yield encode::sse_data(&encode::stream_chunk(
                            &completion_id,
                            &model,
                            Some(format!("Error: {err}")),
                            None,
                        ));
                        break;
                    }
                    AnswerEvent::Finished(outcome) => {
                        match outcome {
                            StreamOutcome::Answer(_) => {}
                            StreamOutcome::NoResponse => {
                                yield encode::sse_data(&encode::stream_chunk(
                                    &completion_id,
                                    &model,
                                    Some(encode::NO_RESPONSE_APOLOGY.to_string()),
                                    None,
                                ));
                            }
                            StreamOutcome::Empty => {
                                yield encode::sse_data(&encode::stream_chunk(
                                    &completion_id,
                                    &model,
                                    Some(format!("Error: {}", EngineError::UpstreamUnavailable)),
                                    None,
                                ));
                            }
                        }
                        break;
                    }
                }
            }
            yield encode::sse_data(&encode::stream_chunk(&completion_id, &model, None, Some("stop")));
            yield encode::DONE_FRAME.to_string();
        };
        Ok(out)
    }

    /// The shared engine session, for quota observation.
    pub fn session(&self) -> &SearchSession {
        &self.session
    }
}
