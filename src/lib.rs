//! Bleak - client for clarifying-question conversations
//!
//! A caller submits a prompt; the backend may answer directly or come back
//! with questions expressed as abstract form elements. The caller answers,
//! asks for more questions or asks for the final answer.
//!
//! - [`Session`] drives one conversation over a [`ChatTransport`] using the
//!   pure state machine in [`state_machine`].
//! - [`Resolver`] maps element descriptors onto caller-configured render
//!   targets.
//! - [`UiSession`] combines both so pending questions come back as
//!   renderable components.

pub mod chat;
pub mod resolver;
pub mod session;
pub mod state_machine;
pub mod ui;

pub use chat::{
    AnsweredQuestion, ChatError, ChatErrorKind, ChatRequest, ChatResponse, ChatTransport,
    ClientConfig, ElementAdvert, HttpTransport, LoggingTransport, Question, ResponseKind,
    UserChoice,
};
pub use resolver::{
    ComponentResolution, ElementConfig, ElementDescriptor, ElementKind, ElementProps,
    ResolveError, ResolveObserver, Resolver, ResolverOptions, TracingObserver,
};
pub use session::{HttpSession, Session, Turn, DEFAULT_MAX_ROUNDS};
pub use state_machine::{ConversationState, Phase, SessionEvent};
pub use ui::{render_key, RenderedQuestion, UiSession};
