//! Engine error taxonomy
//!
//! Four categories with a fixed client/server classification. Rejections
//! happen before any network call (validation, quota); transport and
//! upstream failures surface the underlying cause. There is no retry
//! anywhere in this path: one failure reaches exactly one caller.

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while translating and dispatching a query
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request rejected before any network call
    #[error("validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Session quota state would be violated; no call was made
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Connection, timeout, or non-success response from the engine
    #[error("engine transport failure: {0}")]
    Transport(String),

    /// The engine accepted the query but returned an explicitly empty
    /// result (no frames at all on the stream)
    #[error("engine returned an empty result")]
    UpstreamUnavailable,
}

/// Coarse classification for the front door's status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller's fault: reject with a client-error status
    Client,
    /// Engine's or gateway's fault: reject with a server-error status
    Server,
}

impl EngineError {
    /// Create a validation error naming the offending field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Classify this error for status mapping
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation { .. } | Self::QuotaExceeded(_) => ErrorClass::Client,
            Self::Transport(_) | Self::UpstreamUnavailable => ErrorClass::Server,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineError::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            EngineError::Transport(format!("connection failed: {err}"))
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            EngineError::validation("model", "unknown").class(),
            ErrorClass::Client
        );
        assert_eq!(
            EngineError::QuotaExceeded("no pro queries left".to_string()).class(),
            ErrorClass::Client
        );
        assert_eq!(
            EngineError::Transport("boom".to_string()).class(),
            ErrorClass::Server
        );
        assert_eq!(EngineError::UpstreamUnavailable.class(), ErrorClass::Server);
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = EngineError::validation("model", "'x' is not recognized");
        assert!(err.to_string().contains("model"));
        assert!(err.to_string().contains("not recognized"));
    }
}
