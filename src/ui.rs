//! Conversation session with component resolution
//!
//! [`UiSession`] advertises the caller's element vocabulary when a
//! conversation starts and turns pending questions into renderable
//! components, so a front end never handles raw element descriptors.

use crate::chat::{
    AnsweredQuestion, ChatError, ChatTransport, ClientConfig, HttpTransport, LoggingTransport,
    Question,
};
use crate::resolver::{
    AnswerChangeHandler, ElementConfig, ElementDescriptor, ElementProps, ResolveError, Resolver,
    ResolverOptions,
};
use crate::session::{Session, Turn};
use crate::state_machine::{ConversationState, SessionEvent};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// One pending question, ready to render
#[derive(Debug)]
pub struct RenderedQuestion<'a, C> {
    pub question: &'a Question,
    pub component: &'a C,
    pub props: ElementProps,
    /// Stable list key, distinct from the per-render `props.unique_id`
    pub key: String,
}

/// `bleak-question-{index}-{text}` with every whitespace run in the text
/// replaced by a single `-`
pub fn render_key(index: usize, text: &str) -> String {
    let mut key = format!("bleak-question-{index}-");
    let mut in_whitespace = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                key.push('-');
            }
            in_whitespace = true;
        } else {
            key.push(c);
            in_whitespace = false;
        }
    }
    key
}

pub struct UiSession<C, T: ChatTransport> {
    session: Session<T>,
    resolver: Resolver<C>,
}

impl<C> UiSession<C, LoggingTransport<HttpTransport>> {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, elements: ElementConfig<C>) -> Result<Self, ChatError> {
        let transport = LoggingTransport::new(HttpTransport::new(config)?);
        Ok(Self::with_transport(transport, elements))
    }
}

impl<C, T: ChatTransport> UiSession<C, T> {
    pub fn with_transport(transport: T, elements: ElementConfig<C>) -> Self {
        Self::with_resolver(transport, Resolver::new(elements))
    }

    pub fn with_resolver_options(
        transport: T,
        elements: ElementConfig<C>,
        options: ResolverOptions,
    ) -> Self {
        Self::with_resolver(transport, Resolver::with_options(elements, options))
    }

    fn with_resolver(transport: T, resolver: Resolver<C>) -> Self {
        let mut session = Session::with_transport(transport);
        if !resolver.config().is_empty() {
            session = session.with_elements(resolver.config().adverts());
        }
        Self { session, resolver }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// For settings the UI layer does not forward, like cancellation
    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn resolver(&self) -> &Resolver<C> {
        &self.resolver
    }

    pub fn state(&self) -> &ConversationState {
        self.session.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// # Errors
    ///
    /// See [`Session::start`].
    pub async fn start(&mut self, prompt: &str) -> Result<Turn, ChatError> {
        self.session.start(prompt).await
    }

    /// # Errors
    ///
    /// See [`Session::continue_with`].
    pub async fn continue_with(
        &mut self,
        answers: Vec<AnsweredQuestion>,
        want_more: bool,
    ) -> Result<Turn, ChatError> {
        self.session.continue_with(answers, want_more).await
    }

    /// # Errors
    ///
    /// See [`Session::answer`].
    pub async fn answer(&mut self, answers: Vec<AnsweredQuestion>) -> Result<Turn, ChatError> {
        self.session.answer(answers).await
    }

    /// # Errors
    ///
    /// See [`Session::more`].
    pub async fn more(&mut self) -> Result<Turn, ChatError> {
        self.session.more().await
    }

    /// # Errors
    ///
    /// See [`Session::finish`].
    pub async fn finish(&mut self, answers: Vec<AnsweredQuestion>) -> Result<String, ChatError> {
        self.session.finish(answers).await
    }

    /// Submit the caller's form state, keyed by question text, for the
    /// pending questions
    ///
    /// # Errors
    ///
    /// See [`Session::continue_with`].
    pub async fn submit(
        &mut self,
        values: &HashMap<String, String>,
        want_more: bool,
    ) -> Result<Turn, ChatError> {
        let answers = AnsweredQuestion::collect_from(self.session.pending_questions(), values);
        self.session.continue_with(answers, want_more).await
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Renderable components for the pending questions.
    ///
    /// `answers` holds current values keyed by question text; `on_change`
    /// receives the question text and the new value.
    ///
    /// # Errors
    ///
    /// [`ResolveError`] when a question's type has no component and no
    /// fallback is configured.
    pub fn components(
        &self,
        answers: &HashMap<String, String>,
        on_change: &AnswerChangeHandler,
    ) -> Result<Vec<RenderedQuestion<'_, C>>, ResolveError> {
        let questions = self.session.pending_questions();
        let descriptors: Vec<ElementDescriptor> =
            questions.iter().map(ElementDescriptor::from).collect();
        let resolutions = self.resolver.resolve_all(&descriptors, answers, on_change)?;

        questions
            .iter()
            .zip(resolutions)
            .enumerate()
            .map(|(index, (question, resolution))| {
                let component = self
                    .resolver
                    .component(&resolution.component_key)
                    .ok_or_else(|| ResolveError::NoComponent {
                        kind: resolution.kind.as_str().to_string(),
                    })?;
                Ok(RenderedQuestion {
                    question,
                    component,
                    props: resolution.props,
                    key: render_key(index, &question.text),
                })
            })
            .collect()
    }
}
