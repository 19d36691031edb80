//! Plexgate core library
//!
//! A protocol-translation gateway core: clients speak the OpenAI-style
//! chat-completion contract; the Perplexity answer engine speaks a
//! session-authenticated SSE query protocol. This crate translates chat
//! requests into engine queries, extracts a reliable answer out of the
//! engine's inconsistent stream payloads, and re-encodes it as complete
//! responses or delta-chunk streams.
//!
//! The HTTP front door, credential provisioning, and file uploads are
//! external collaborators: they hand this core an authenticated session
//! and a well-formed request, and forward what it emits unmodified.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod protocol;
pub mod registry;

pub use adapter::Gateway;
pub use config::{ConfigError, GatewayConfig, SecretString};
pub use engine::{EngineError, EngineResult, ErrorClass, SearchSession, SessionOptions};
pub use protocol::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
pub use registry::ModelRegistry;

/// Returns the version of the plexgate core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
