//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::engine::session::{QuotaCount, SessionOptions, SessionQuota};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration structure for the gateway
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Engine endpoint settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Session credentials and quota bootstrap
    #[serde(default)]
    pub session: SessionConfig,

    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Engine endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default ISO 639 language tag for queries
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language: default_language(),
        }
    }
}

/// Session credential configuration.
///
/// Cookie values are injected here - from a secret store or via `${ENV}`
/// placeholders - and nowhere else. An empty jar produces an anonymous
/// session with zero assisted-mode quota.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie name -> value, sent with every engine request
    #[serde(default)]
    pub cookies: BTreeMap<String, SecretString>,

    /// Explicit pro-query quota handed over by the provisioning
    /// collaborator. Absent: unlimited for account-bound sessions, zero
    /// otherwise.
    #[serde(default)]
    pub pro_queries: Option<u32>,

    /// Explicit file-upload quota; same defaulting as `pro_queries`.
    #[serde(default)]
    pub file_uploads: Option<u32>,
}

impl SessionConfig {
    /// A session is account-bound exactly when it carries credentials.
    pub fn account_bound(&self) -> bool {
        !self.cookies.is_empty()
    }

    fn quota(&self) -> SessionQuota {
        let bootstrap = |explicit: Option<u32>| match explicit {
            Some(count) => QuotaCount::Limited(count),
            None if self.account_bound() => QuotaCount::Unlimited,
            None => QuotaCount::Limited(0),
        };
        SessionQuota {
            pro_queries: bootstrap(self.pro_queries),
            file_uploads: bootstrap(self.file_uploads),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Bound on time to the first response byte, in milliseconds
    #[serde(default = "default_first_byte_timeout")]
    pub first_byte_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10000,
            first_byte_timeout_ms: 60000,
            max_idle_per_host: 10,
        }
    }
}

// Default value functions for serde
fn default_base_url() -> String {
    "https://www.perplexity.ai".to_string()
}
fn default_language() -> String {
    "en-US".to_string()
}
fn default_connect_timeout() -> u64 {
    10000
}
fn default_first_byte_timeout() -> u64 {
    60000
}
fn default_max_idle() -> usize {
    10
}

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        // Validate version
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }
        if self.version != "0.1" {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: "0.1".to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        // Validate engine endpoint
        match url::Url::parse(&self.engine.base_url) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::new(
                        "engine.base_url",
                        ValidationErrorKind::InvalidUrl {
                            message: format!(
                                "URL scheme must be http or https, got: {}",
                                url.scheme()
                            ),
                        },
                    ));
                }
            }
            Err(e) => {
                return Err(ValidationError::new(
                    "engine.base_url",
                    ValidationErrorKind::InvalidUrl {
                        message: e.to_string(),
                    },
                ));
            }
        }

        if self.engine.language.is_empty() {
            return Err(ValidationError::required("engine.language"));
        }

        // Cookie names must be usable in a header
        for name in self.session.cookies.keys() {
            if name.is_empty() || name.contains([';', '=', ' ']) {
                return Err(ValidationError::new(
                    format!("session.cookies.{name}"),
                    ValidationErrorKind::InvalidValue {
                        expected: "cookie name without ';', '=' or spaces".to_string(),
                        actual: name.clone(),
                    },
                ));
            }
        }

        if self.connection.first_byte_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                "connection.first_byte_timeout_ms",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Derive session construction parameters from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            base_url: self.engine.base_url.clone(),
            cookies: self
                .session
                .cookies
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            account_bound: self.session.account_bound(),
            quota: self.session.quota(),
            connect_timeout: Duration::from_millis(self.connection.connect_timeout_ms),
            first_byte_timeout: Duration::from_millis(self.connection.first_byte_timeout_ms),
            max_idle_per_host: self.connection.max_idle_per_host,
        }
    }
}
