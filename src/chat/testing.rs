//! Mock transport for testing
//!
//! Lets the session and UI layers be exercised without a backend.

use super::{ChatError, ChatRequest, ChatResponse, ChatTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Transport that returns queued responses and records every request
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<ChatResponse, ChatError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    api_key: Mutex<Option<String>>,
    delay: Option<Duration>,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Notify,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            api_key: Mutex::new(None),
            delay: None,
            request_started: Notify::new(),
        }
    }

    /// Hold every response for `delay` before returning it
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_response(&self, response: ChatResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: ChatError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::generic("No mock response queued")))
    }

    fn set_api_key(&self, api_key: Option<String>) {
        *self.api_key.lock().unwrap() = api_key;
    }
}
