//! Chat error types

use std::time::Duration;
use thiserror::Error;

/// Error from any chat operation.
///
/// Every transport failure is translated into exactly one of these variants
/// at the transport boundary (see [`super::classify`]); higher layers only
/// match on them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    /// Backend throttling (HTTP 429)
    #[error("{message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Credentials rejected (HTTP 401)
    #[error("{message}")]
    Authentication { message: String },

    /// Anything else: other statuses, network failures, timeouts,
    /// malformed responses and misuse of the session
    #[error("{message}")]
    Generic {
        message: String,
        status: Option<u16>,
        body: Option<serde_json::Value>,
    },
}

impl ChatError {
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn http(status: u16, message: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self::Generic {
            message: message.into(),
            status: Some(status),
            body,
        }
    }

    /// A response that violates the wire contract
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::generic(format!("Protocol error: {}", message.into()))
    }

    pub fn cancelled() -> Self {
        Self::generic("Request cancelled")
    }

    pub fn kind(&self) -> ChatErrorKind {
        match self {
            Self::RateLimit { .. } => ChatErrorKind::RateLimit,
            Self::Authentication { .. } => ChatErrorKind::Authentication,
            Self::Generic { .. } => ChatErrorKind::Generic,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::RateLimit { message, .. }
            | Self::Authentication { message }
            | Self::Generic { message, .. } => message,
        }
    }

    /// HTTP status the error was classified from, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimit { .. } => Some(429),
            Self::Authentication { .. } => Some(401),
            Self::Generic { status, .. } => *status,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether re-issuing the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Authentication { .. } => false,
            Self::Generic { status, .. } => matches!(status, Some(500..=599)),
        }
    }

    /// Text suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimit { retry_after, .. } => match retry_after {
                Some(delay) => format!(
                    "Rate limit exceeded. Try again in {} seconds.",
                    delay.as_secs().max(1)
                ),
                None => "Rate limit exceeded.".to_string(),
            },
            Self::Authentication { .. } => {
                "API key is invalid or missing. Please check your API key.".to_string()
            }
            Self::Generic { message, .. } => message.clone(),
        }
    }
}

/// Error classification for dispatch and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// Throttled - retryable after a delay
    RateLimit,
    /// Bad or missing credentials - fatal until fixed
    Authentication,
    /// Everything else
    Generic,
}

impl ChatErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Authentication => "authentication",
            Self::Generic => "generic",
        }
    }

    /// Whether the conversation can continue after this kind of failure
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::RateLimit)
    }
}
