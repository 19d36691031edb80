//! Authenticated engine session
//!
//! A [`SearchSession`] owns one connection context (pooled HTTP client plus
//! injected cookie credentials) and the session's mutable quota state. Each
//! call runs `Idle -> validate -> Querying -> Idle`; an unrecoverable
//! transport error fails that one call only, and the session stays usable
//! for subsequent requests.
//!
//! Quota is decremented under a single lock immediately before the network
//! call, not after success: a failed call still consumes quota. That is
//! engine-compatible behavior and deliberately not refunded.

use crate::config::SecretString;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::sse::{self, FrameStream};
use crate::engine::{AskPayload, QueryParams, ASK_PATH};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("plexgate/", env!("CARGO_PKG_VERSION"));

/// A usage counter that is either bounded or unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCount {
    Limited(u32),
    Unlimited,
}

impl QuotaCount {
    /// Whether `n` more units can be consumed.
    pub fn available(&self, n: u32) -> bool {
        match self {
            QuotaCount::Unlimited => true,
            QuotaCount::Limited(remaining) => *remaining >= n,
        }
    }

    fn consume(&mut self, n: u32) {
        if let QuotaCount::Limited(remaining) = self {
            *remaining = remaining.saturating_sub(n);
        }
    }
}

impl std::fmt::Display for QuotaCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaCount::Unlimited => f.write_str("unlimited"),
            QuotaCount::Limited(remaining) => write!(f, "{remaining}"),
        }
    }
}

/// Per-session usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionQuota {
    /// Queries remaining in non-default modes
    pub pro_queries: QuotaCount,
    /// File uploads remaining
    pub file_uploads: QuotaCount,
}

impl SessionQuota {
    /// Quota of a session with no credentials: nothing beyond auto mode.
    pub fn anonymous() -> Self {
        Self {
            pro_queries: QuotaCount::Limited(0),
            file_uploads: QuotaCount::Limited(0),
        }
    }

    /// Quota of an account-bound session.
    pub fn unlimited() -> Self {
        Self {
            pro_queries: QuotaCount::Unlimited,
            file_uploads: QuotaCount::Unlimited,
        }
    }
}

/// Construction parameters for a [`SearchSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Engine base URL
    pub base_url: String,

    /// Cookie credentials, in header order. Empty for an anonymous session.
    pub cookies: Vec<(String, SecretString)>,

    /// Whether the cookies bind this session to an account. Account-bound
    /// sessions validate underlying-model selection locally; anonymous
    /// sessions leave it to the engine.
    pub account_bound: bool,

    /// Initial quota counters
    pub quota: SessionQuota,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Bound on time to the first response byte
    pub first_byte_timeout: Duration,

    /// Idle connections kept per host
    pub max_idle_per_host: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            base_url: "https://www.perplexity.ai".to_string(),
            cookies: Vec::new(),
            account_bound: false,
            quota: SessionQuota::anonymous(),
            connect_timeout: Duration::from_secs(10),
            first_byte_timeout: Duration::from_secs(60),
            max_idle_per_host: 10,
        }
    }
}

/// One authenticated connection context to the engine.
pub struct SearchSession {
    http: reqwest::Client,
    ask_url: String,
    cookie_header: Option<SecretString>,
    account_bound: bool,
    quota: Mutex<SessionQuota>,
    first_byte_timeout: Duration,
    /// Random tag correlating this session's log lines
    trace_tag: String,
}

impl SearchSession {
    /// Create a session from injected credentials and limits.
    pub fn new(options: SessionOptions) -> EngineResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(options.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(options.connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| EngineError::Transport(format!("failed to create HTTP client: {e}")))?;

        let trace_tag = format!("{:08x}", rand::random::<u32>());
        info!(
            trace = %trace_tag,
            account_bound = options.account_bound,
            "engine session created"
        );

        Ok(Self {
            http,
            ask_url: format!("{}{}", options.base_url.trim_end_matches('/'), ASK_PATH),
            cookie_header: build_cookie_header(&options.cookies),
            account_bound: options.account_bound,
            quota: Mutex::new(options.quota),
            first_byte_timeout: options.first_byte_timeout,
            trace_tag,
        })
    }

    /// Check a parameter set against session state without consuming
    /// anything. Rejections here guarantee no network call was made.
    pub fn validate(&self, params: &QueryParams) -> EngineResult<()> {
        if self.account_bound {
            if let Some(model) = params.model.as_deref() {
                let allowed = params.mode.allowed_models();
                if !allowed.contains(&model) {
                    return Err(EngineError::validation(
                        "model",
                        format!(
                            "'{}' is not available in {} mode; allowed: default{}{}",
                            model,
                            params.mode,
                            if allowed.is_empty() { "" } else { ", " },
                            allowed.join(", "),
                        ),
                    ));
                }
            }
        }

        let quota = self.lock_quota();
        if params.mode.consumes_pro_quota() && !quota.pro_queries.available(1) {
            return Err(EngineError::QuotaExceeded(format!(
                "no pro queries remaining for mode {}",
                params.mode
            )));
        }
        let file_count = params.files.len() as u32;
        if file_count > 0 && !quota.file_uploads.available(file_count) {
            return Err(EngineError::QuotaExceeded(format!(
                "{} file uploads requested, {} remaining",
                file_count, quota.file_uploads
            )));
        }
        Ok(())
    }

    /// Dispatch one query, returning the live frame stream bound to the
    /// connection. Quota is consumed before the call and not refunded on
    /// failure.
    pub async fn query(&self, params: &QueryParams) -> EngineResult<FrameStream> {
        self.validate(params)?;
        self.consume_quota(params)?;

        let payload = AskPayload::build(params);
        info!(
            trace = %self.trace_tag,
            mode = %params.mode,
            stream = params.stream,
            query_len = params.query.len(),
            "dispatching engine query"
        );

        let mut request = self.http.post(&self.ask_url).json(&payload);
        if let Some(header) = &self.cookie_header {
            request = request.header(reqwest::header::COOKIE, header.expose_secret());
        }

        let response = tokio::time::timeout(self.first_byte_timeout, request.send())
            .await
            .map_err(|_| {
                warn!(trace = %self.trace_tag, "engine query timed out");
                EngineError::Transport(format!(
                    "no response within {}s",
                    self.first_byte_timeout.as_secs()
                ))
            })?
            .map_err(EngineError::from)?;

        let status = response.status();
        if !status.is_success() {
            warn!(trace = %self.trace_tag, %status, "engine rejected query");
            return Err(EngineError::Transport(format!(
                "engine returned status {status}"
            )));
        }

        debug!(trace = %self.trace_tag, "engine stream open");
        Ok(sse::frames_from_bytes(response.bytes_stream()))
    }

    /// Snapshot of the remaining quota.
    pub fn quota(&self) -> SessionQuota {
        *self.lock_quota()
    }

    /// Single locked check-and-decrement; concurrent callers cannot lose an
    /// update or drive a counter below zero.
    fn consume_quota(&self, params: &QueryParams) -> EngineResult<()> {
        let mut quota = self.lock_quota();
        let file_count = params.files.len() as u32;
        if params.mode.consumes_pro_quota() && !quota.pro_queries.available(1) {
            return Err(EngineError::QuotaExceeded(format!(
                "no pro queries remaining for mode {}",
                params.mode
            )));
        }
        if file_count > 0 && !quota.file_uploads.available(file_count) {
            return Err(EngineError::QuotaExceeded(format!(
                "{} file uploads requested, {} remaining",
                file_count, quota.file_uploads
            )));
        }
        if params.mode.consumes_pro_quota() {
            quota.pro_queries.consume(1);
        }
        if file_count > 0 {
            quota.file_uploads.consume(file_count);
        }
        Ok(())
    }

    fn lock_quota(&self) -> MutexGuard<'_, SessionQuota> {
        self.quota.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn build_cookie_header(cookies: &[(String, SecretString)]) -> Option<SecretString> {
    if cookies.is_empty() {
        return None;
    }
    let header = cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value.expose_secret()))
        .collect::<Vec<_>>()
        .join("; ");
    Some(SecretString::new(header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Mode, Source};

    fn params(mode: Mode) -> QueryParams {
        QueryParams {
            query: "q".to_string(),
            mode,
            model: None,
            sources: vec![Source::Web],
            files: Vec::new(),
            stream: false,
            language: "en-US".to_string(),
            follow_up: None,
            incognito: false,
        }
    }

    fn anonymous_session() -> SearchSession {
        SearchSession::new(SessionOptions::default()).unwrap()
    }

    #[test]
    fn auto_mode_needs_no_quota() {
        let session = anonymous_session();
        assert!(session.validate(&params(Mode::Auto)).is_ok());
    }

    #[test]
    fn pro_mode_rejected_without_quota() {
        let session = anonymous_session();
        let err = session.validate(&params(Mode::Pro)).unwrap_err();
        assert!(matches!(err, EngineError::QuotaExceeded(_)));
    }

    #[test]
    fn account_session_rejects_unknown_model() {
        let session = SearchSession::new(SessionOptions {
            cookies: vec![("session".to_string(), SecretString::new("tok"))],
            account_bound: true,
            quota: SessionQuota::unlimited(),
            ..Default::default()
        })
        .unwrap();
        let mut p = params(Mode::Pro);
        p.model = Some("made-up".to_string());
        let err = session.validate(&p).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
        assert!(err.to_string().contains("made-up"));
    }

    #[test]
    fn anonymous_session_skips_model_allowlist() {
        let session = SearchSession::new(SessionOptions {
            quota: SessionQuota::unlimited(),
            ..Default::default()
        })
        .unwrap();
        let mut p = params(Mode::Pro);
        p.model = Some("made-up".to_string());
        assert!(session.validate(&p).is_ok());
    }

    #[test]
    fn consume_quota_decrements_once() {
        let session = SearchSession::new(SessionOptions {
            quota: SessionQuota {
                pro_queries: QuotaCount::Limited(2),
                file_uploads: QuotaCount::Limited(0),
            },
            ..Default::default()
        })
        .unwrap();
        session.consume_quota(&params(Mode::Reasoning)).unwrap();
        assert_eq!(session.quota().pro_queries, QuotaCount::Limited(1));
        session.consume_quota(&params(Mode::Reasoning)).unwrap();
        assert_eq!(session.quota().pro_queries, QuotaCount::Limited(0));
        assert!(session.consume_quota(&params(Mode::Reasoning)).is_err());
    }

    #[test]
    fn concurrent_consumption_loses_no_updates() {
        use std::sync::Arc;

        let session = Arc::new(
            SearchSession::new(SessionOptions {
                quota: SessionQuota {
                    pro_queries: QuotaCount::Limited(5),
                    file_uploads: QuotaCount::Limited(0),
                },
                ..Default::default()
            })
            .unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.consume_quota(&params(Mode::Pro)).is_ok())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(granted, 5);
        assert_eq!(session.quota().pro_queries, QuotaCount::Limited(0));
    }

    #[test]
    fn file_quota_checked_against_count() {
        let session = SearchSession::new(SessionOptions {
            quota: SessionQuota {
                pro_queries: QuotaCount::Unlimited,
                file_uploads: QuotaCount::Limited(1),
            },
            ..Default::default()
        })
        .unwrap();
        let mut p = params(Mode::Auto);
        p.files = vec!["a.txt".to_string(), "b.txt".to_string()];
        let err = session.validate(&p).unwrap_err();
        assert!(matches!(err, EngineError::QuotaExceeded(_)));
    }
}
