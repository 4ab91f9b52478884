//! Conversation session driver
//!
//! Owns the [`ConversationState`] for one conversation, runs the pure
//! [`transition`] function and executes the effects it returns against a
//! [`ChatTransport`].

use crate::chat::{
    AnsweredQuestion, ChatError, ChatRequest, ChatTransport, ClientConfig, ElementAdvert,
    HttpTransport, LoggingTransport, Question,
};
use crate::state_machine::{
    transition, ConvContext, ConversationState, Effect, Event, Phase, SessionEvent,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Rounds `solve` answers before forcing completion
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What the backend handed back after a request settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// The backend wants these answered before it can answer
    Questions(Vec<Question>),
    /// The conversation is complete
    Answer(String),
}

impl Turn {
    pub fn is_answer(&self) -> bool {
        matches!(self, Turn::Answer(_))
    }

    pub fn questions(&self) -> &[Question] {
        match self {
            Turn::Questions(questions) => questions,
            Turn::Answer(_) => &[],
        }
    }
}

/// Session over the real HTTP backend
pub type HttpSession = Session<LoggingTransport<HttpTransport>>;

/// One conversation with the Bleak backend.
///
/// Operations take `&mut self`, so at most one request per session is ever
/// in flight. Independent sessions share nothing.
pub struct Session<T: ChatTransport> {
    transport: T,
    context: ConvContext,
    state: ConversationState,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    /// Aborts an in-flight request when cancelled
    cancel_token: Option<CancellationToken>,
}

impl HttpSession {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        let transport = HttpTransport::new(config)?;
        Ok(Session::with_transport(LoggingTransport::new(transport)))
    }
}

impl<T: ChatTransport> Session<T> {
    pub fn with_transport(transport: T) -> Self {
        let (broadcast_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            context: ConvContext::default(),
            state: ConversationState::default(),
            broadcast_tx,
            cancel_token: None,
        }
    }

    /// Advertise an element vocabulary on `start`
    #[must_use]
    pub fn with_elements(mut self, elements: Vec<ElementAdvert>) -> Self {
        self.context = ConvContext::new(Some(elements));
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Replace the cancellation token. A cancelled token aborts every
    /// subsequent request, so install a fresh one to keep going.
    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.cancel_token = token;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.state.thread_id.as_deref()
    }

    pub fn pending_questions(&self) -> &[Question] {
        &self.state.pending_questions
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn has_active_conversation(&self) -> bool {
        self.state.has_started() && !self.state.is_complete()
    }

    /// Credential for subsequent requests; `None` sends them anonymously
    pub fn set_api_key(&self, api_key: Option<String>) {
        self.transport.set_api_key(api_key);
    }

    /// Begin a conversation with `prompt`.
    ///
    /// # Errors
    ///
    /// Usage errors (empty prompt, conversation already started) leave the
    /// session untouched. Backend failures are recorded in
    /// [`ConversationState::last_error`] and returned.
    pub async fn start(&mut self, prompt: &str) -> Result<Turn, ChatError> {
        self.drive(Event::Start {
            prompt: prompt.to_string(),
        })
        .await?;
        self.current_turn()
    }

    /// Submit answers to the pending questions and continue the conversation.
    /// With `want_more` the backend is asked for further questions,
    /// otherwise it is asked for the final answer.
    ///
    /// # Errors
    ///
    /// Fails before `start`, after completion, or when the backend fails.
    pub async fn continue_with(
        &mut self,
        answers: Vec<AnsweredQuestion>,
        want_more: bool,
    ) -> Result<Turn, ChatError> {
        self.drive(Event::Continue { answers, want_more }).await?;
        self.current_turn()
    }

    /// `continue_with(answers, false)`: answer and ask for the final answer
    ///
    /// # Errors
    ///
    /// See [`Session::continue_with`].
    pub async fn answer(&mut self, answers: Vec<AnsweredQuestion>) -> Result<Turn, ChatError> {
        self.continue_with(answers, false).await
    }

    /// Ask for more questions without answering anything new
    ///
    /// # Errors
    ///
    /// See [`Session::continue_with`].
    pub async fn more(&mut self) -> Result<Turn, ChatError> {
        self.continue_with(Vec::new(), true).await
    }

    /// Submit final answers and require the backend to answer now
    ///
    /// # Errors
    ///
    /// Fails before `start`, after completion, or when the backend fails.
    pub async fn finish(&mut self, answers: Vec<AnsweredQuestion>) -> Result<String, ChatError> {
        self.drive(Event::Finish { answers }).await?;
        self.state
            .final_answer
            .clone()
            .ok_or_else(|| ChatError::protocol("conversation ended without an answer"))
    }

    /// Forget everything and return to the initial state
    pub fn reset(&mut self) {
        if let Err(e) = self.apply(Event::Reset) {
            // Reset is accepted in every phase
            tracing::error!(error = %e, "Reset rejected");
        }
    }

    /// Run a whole conversation, answering each round with `handler`.
    ///
    /// After `max_rounds` rounds the latest answers are submitted with
    /// `finish` so the backend must answer.
    ///
    /// # Errors
    ///
    /// Any error from the underlying operations.
    pub async fn solve<F>(
        &mut self,
        prompt: &str,
        mut handler: F,
        max_rounds: u32,
    ) -> Result<String, ChatError>
    where
        F: AsyncFnMut(&[Question]) -> Vec<AnsweredQuestion>,
    {
        let mut turn = self.start(prompt).await?;
        let mut round = 0;
        loop {
            match turn {
                Turn::Answer(answer) => return Ok(answer),
                Turn::Questions(questions) => {
                    round += 1;
                    let answers = handler(&questions).await;
                    if round >= max_rounds {
                        tracing::debug!(round, "Round limit reached, finishing");
                        return self.finish(answers).await;
                    }
                    turn = self.continue_with(answers, false).await?;
                }
            }
        }
    }

    /// Ask once and skip any questions the backend comes back with
    ///
    /// # Errors
    ///
    /// Any error from `start` or `finish`.
    pub async fn quick_ask(&mut self, prompt: &str) -> Result<String, ChatError> {
        match self.start(prompt).await? {
            Turn::Answer(answer) => Ok(answer),
            Turn::Questions(_) => self.finish(Vec::new()).await,
        }
    }

    // ========================================================================
    // Driver
    // ========================================================================

    /// Feed an event through the state machine until no effects remain
    async fn drive(&mut self, event: Event) -> Result<(), ChatError> {
        let mut events_to_process = vec![event];

        while let Some(event) = events_to_process.pop() {
            if let Some(request) = self.apply(event)? {
                events_to_process.push(self.execute_request(&request).await);
            }
        }

        match &self.state.last_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Run one transition, publish its notifications and hand back the
    /// request it asks for, if any
    fn apply(&mut self, event: Event) -> Result<Option<ChatRequest>, ChatError> {
        let event_name = event.name();
        let result = transition(&self.state, &self.context, event).map_err(|e| {
            tracing::debug!(event = event_name, phase = self.state.phase.name(), error = %e, "Transition rejected");
            ChatError::from(e)
        })?;

        let old_phase = std::mem::replace(&mut self.state, result.new_state).phase;
        if old_phase.name() != self.state.phase.name() {
            tracing::debug!(
                from = old_phase.name(),
                to = self.state.phase.name(),
                event = event_name,
                "Phase changed"
            );
        }

        let mut request = None;
        for effect in result.effects {
            match effect {
                Effect::SendRequest { request: r } => request = Some(r),
                Effect::Notify(notification) => self.publish(notification),
            }
        }
        Ok(request)
    }

    fn publish(&self, notification: SessionEvent) {
        match &notification {
            SessionEvent::Started { thread_id } => {
                tracing::info!(thread_id = %thread_id, "Conversation started");
            }
            SessionEvent::Completed { .. } => {
                tracing::info!(
                    thread_id = self.thread_id().unwrap_or(""),
                    rounds = self.state.rounds,
                    "Conversation complete"
                );
            }
            SessionEvent::Failed { kind, message } => {
                tracing::warn!(kind = kind.as_str(), error = %message, "Conversation request failed");
            }
            _ => {}
        }
        // No subscribers is fine
        let _ = self.broadcast_tx.send(notification);
    }

    async fn execute_request(&self, request: &ChatRequest) -> Event {
        let outcome = match &self.cancel_token {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => {
                        tracing::info!(request_type = request.kind(), "Request cancelled");
                        return Event::Cancelled;
                    }
                    result = self.transport.send(request) => result,
                }
            }
            None => self.transport.send(request).await,
        };

        match outcome {
            Ok(response) => {
                if let Some(thread_id) = &self.state.thread_id {
                    if !response.thread_id.is_empty() && response.thread_id != *thread_id {
                        tracing::warn!(
                            expected = %thread_id,
                            received = %response.thread_id,
                            "Backend returned a different thread_id, keeping the original"
                        );
                    }
                }
                Event::Response(response)
            }
            Err(err) => Event::Failure(err),
        }
    }

    fn current_turn(&self) -> Result<Turn, ChatError> {
        match (&self.state.phase, &self.state.final_answer) {
            (Phase::Complete, Some(answer)) => Ok(Turn::Answer(answer.clone())),
            (Phase::Asking, _) => Ok(Turn::Questions(self.state.pending_questions.clone())),
            _ => Err(ChatError::protocol("conversation settled in an unexpected phase")),
        }
    }
}
