//! HTTP transport for the Bleak chat endpoint

use super::classify::{classify_send_error, classify_status};
use super::{ChatError, ChatRequest, ChatResponse, ChatTransport, ClientConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Posts JSON requests to `{base_url}{endpoint_path}`.
///
/// Retryable failures (rate limits, 5xx) are retried here, up to
/// `ClientConfig::retries` extra attempts; the session above never retries.
pub struct HttpTransport {
    client: Client,
    url: String,
    api_key: RwLock<Option<String>>,
    question_timeout: Duration,
    answer_timeout: Duration,
    retries: u32,
    retry_backoff: Duration,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be built (e.g. no TLS backend).
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChatError::generic(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.endpoint_url(),
            api_key: RwLock::new(config.api_key.clone()),
            question_timeout: config.question_timeout,
            answer_timeout: config.answer_timeout,
            retries: config.retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Base delay for exponential backoff when the backend gives no `Retry-After`
    #[must_use]
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn timeout_for(&self, request: &ChatRequest) -> Duration {
        if request.expects_final_answer() {
            self.answer_timeout
        } else {
            self.question_timeout
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        // Exponential backoff: base, 2x, 4x, ...
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }

    fn current_api_key(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn send_once(
        &self,
        request: &ChatRequest,
        timeout: Duration,
    ) -> Result<ChatResponse, ChatError> {
        let mut builder = self.client.post(&self.url).timeout(timeout).json(request);
        if let Some(key) = self.current_api_key().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_send_error(&e, timeout))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|e| classify_send_error(&e, timeout))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), retry_after.as_deref(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ChatError::protocol(format!("failed to parse response: {e} - body: {body}")))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let timeout = self.timeout_for(request);
        let mut attempt = 0;

        loop {
            match self.send_once(request, timeout).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    let delay = e
                        .retry_after()
                        .map_or_else(|| self.retry_delay(attempt), |d| d.min(MAX_RETRY_DELAY));
                    tracing::warn!(
                        request_type = request.kind(),
                        attempt,
                        max_attempts = self.retries,
                        delay_ms = %delay.as_millis(),
                        error = %e.message(),
                        "Retrying chat request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn set_api_key(&self, api_key: Option<String>) {
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = api_key;
    }
}
