//! Client configuration

use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.bleak.ai";
pub const DEFAULT_ENDPOINT_PATH: &str = "/chat";
pub const DEFAULT_QUESTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_RETRIES: u32 = 3;

/// Configuration for talking to the Bleak backend
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoint_path: String,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    /// Timeout for requests that produce questions
    pub question_timeout: Duration,
    /// Timeout for requests that produce the final answer
    pub answer_timeout: Duration,
    /// Extra attempts for retryable failures, performed by the transport
    pub retries: u32,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("endpoint_path", &self.endpoint_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("question_timeout", &self.question_timeout)
            .field("answer_timeout", &self.answer_timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            api_key: None,
            question_timeout: DEFAULT_QUESTION_TIMEOUT,
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from the environment.
    ///
    /// - `BLEAK_BASE_URL`
    /// - `BLEAK_API_KEY`
    /// - `BLEAK_TIMEOUT_SECS` (question requests)
    /// - `BLEAK_ANSWER_TIMEOUT_SECS`
    /// - `BLEAK_RETRIES`
    ///
    /// Unset or unparseable values, and zero timeouts, keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        };

        Self {
            base_url: lookup("BLEAK_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            endpoint_path: defaults.endpoint_path,
            api_key: lookup("BLEAK_API_KEY").filter(|v| !v.is_empty()),
            question_timeout: secs("BLEAK_TIMEOUT_SECS").unwrap_or(defaults.question_timeout),
            answer_timeout: secs("BLEAK_ANSWER_TIMEOUT_SECS").unwrap_or(defaults.answer_timeout),
            retries: lookup("BLEAK_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.retries),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    #[must_use]
    pub fn with_question_timeout(mut self, timeout: Duration) -> Self {
        self.question_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Full URL of the chat endpoint
    pub fn endpoint_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.endpoint_path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}
