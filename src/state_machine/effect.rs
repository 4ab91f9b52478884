//! Effects produced by state transitions

use crate::chat::{ChatErrorKind, ChatRequest, Question};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a request to the backend and feed the outcome back as an event
    SendRequest { request: ChatRequest },

    /// Tell subscribers what happened
    Notify(SessionEvent),
}

impl Effect {
    pub fn send(request: ChatRequest) -> Self {
        Effect::SendRequest { request }
    }

    pub fn notify(event: SessionEvent) -> Self {
        Effect::Notify(event)
    }
}

/// Observable conversation milestones, broadcast to session subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started {
        thread_id: String,
    },
    Questions {
        round: u32,
        questions: Vec<Question>,
    },
    AnswersSubmitted {
        count: usize,
    },
    Completed {
        answer: String,
    },
    Failed {
        kind: ChatErrorKind,
        message: String,
    },
    Reset,
}
