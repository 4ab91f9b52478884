//! Events that can occur in a conversation

use crate::chat::{AnsweredQuestion, ChatError, ChatResponse};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Caller events
    Start {
        prompt: String,
    },
    Continue {
        answers: Vec<AnsweredQuestion>,
        want_more: bool,
    },
    Finish {
        answers: Vec<AnsweredQuestion>,
    },
    Reset,

    // Transport events
    Response(ChatResponse),
    Failure(ChatError),
    Cancelled,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start { .. } => "start",
            Event::Continue { .. } => "continue",
            Event::Finish { .. } => "finish",
            Event::Reset => "reset",
            Event::Response(_) => "response",
            Event::Failure(_) => "failure",
            Event::Cancelled => "cancelled",
        }
    }
}
