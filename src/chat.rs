//! Transport layer for the Bleak chat API
//!
//! Wire types, the error taxonomy and its classifier, and the
//! [`ChatTransport`] seam the conversation session talks through.

mod classify;
mod config;
mod error;
mod http;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{classify_send_error, classify_status};
pub use config::{
    ClientConfig, DEFAULT_ANSWER_TIMEOUT, DEFAULT_BASE_URL, DEFAULT_ENDPOINT_PATH,
    DEFAULT_QUESTION_TIMEOUT, DEFAULT_RETRIES,
};
pub use error::{ChatError, ChatErrorKind};
pub use http::HttpTransport;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Sends one request to the backend and returns its response.
///
/// Implementations translate every failure into a [`ChatError`] before
/// returning; callers never see raw transport errors.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError>;

    /// Replace the credential attached to subsequent requests
    fn set_api_key(&self, _api_key: Option<String>) {}
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        (**self).send(request).await
    }

    fn set_api_key(&self, api_key: Option<String>) {
        (**self).set_api_key(api_key);
    }
}

/// Logging wrapper for chat transports
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: ChatTransport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: ChatTransport> ChatTransport for LoggingTransport<T> {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    request_type = request.kind(),
                    thread_id = %response.thread_id,
                    response_type = response.kind.as_str(),
                    questions = response.questions().len(),
                    is_complete = response.is_complete,
                    duration_ms = %duration.as_millis(),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    request_type = request.kind(),
                    thread_id = request.thread_id().unwrap_or(""),
                    duration_ms = %duration.as_millis(),
                    kind = e.kind().as_str(),
                    status = e.status(),
                    error = %e.message(),
                    retryable = e.is_retryable(),
                    "Chat request failed"
                );
            }
        }

        result
    }

    fn set_api_key(&self, api_key: Option<String>) {
        self.inner.set_api_key(api_key);
    }
}
