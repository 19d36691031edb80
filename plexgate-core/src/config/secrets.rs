//! Secret handling for session credentials
//!
//! Session cookie values are long-lived bearer credentials. They are held
//! in a wrapper that redacts itself in all Display/Debug output, so no log
//! line or error message can leak a token. The actual value is reachable
//! only through an explicit accessor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A wrapper type for sensitive strings like cookie values
#[derive(Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    /// Create a new secret string
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the actual value (use with caution)
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Get a partially redacted version for debugging
    pub fn partial_redact(&self) -> String {
        if self.value.is_empty() {
            return "[EMPTY]".to_string();
        }
        let len = self.value.len();
        if len <= 8 {
            // Short values get fully redacted
            "[REDACTED]".to_string()
        } else {
            format!(
                "{}...{}",
                &self.value[..2.min(len)],
                &self.value[len.saturating_sub(2)..]
            )
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
