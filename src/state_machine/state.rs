//! Conversation state types

use crate::chat::{AnsweredQuestion, ChatError, ElementAdvert, Question};
use serde::Serialize;

/// Where the conversation is in its request/response cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// No successful response yet
    #[default]
    Starting,

    /// Questions are pending and waiting for the caller's answers
    Asking,

    /// Continuation request in flight
    Answering {
        /// Answers sent with this request, committed on success
        staged: Vec<AnsweredQuestion>,
        want_more: bool,
    },

    /// Completion request in flight
    Completing {
        /// Answers sent with this request, committed on success
        staged: Vec<AnsweredQuestion>,
    },

    /// Terminal: final answer received or an unrecoverable error occurred
    Complete,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Asking => "asking",
            Phase::Answering { .. } => "answering",
            Phase::Completing { .. } => "completing",
            Phase::Complete => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete)
    }

    /// A request was sent from this phase and has not settled
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Phase::Answering { .. } | Phase::Completing { .. })
    }

    pub fn staged(&self) -> &[AnsweredQuestion] {
        match self {
            Phase::Answering { staged, .. } | Phase::Completing { staged } => staged,
            _ => &[],
        }
    }
}

/// Everything one session knows about its conversation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationState {
    /// Issued by the backend on the first response, immutable afterwards
    pub thread_id: Option<String>,
    pub phase: Phase,
    /// Questions from the latest response not yet resolved by continue/finish
    pub pending_questions: Vec<Question>,
    /// Every accepted answer, in submission order. Append-only.
    pub accumulated_answers: Vec<AnsweredQuestion>,
    /// Set only once `phase` is `Complete` with a successful answer
    pub final_answer: Option<String>,
    pub last_error: Option<ChatError>,
    /// Number of question rounds received
    pub rounds: u32,
    pub questions_asked: usize,
    pub questions_answered: usize,
}

impl ConversationState {
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn has_started(&self) -> bool {
        self.thread_id.is_some()
    }

    /// Answers the next request will carry: accepted history plus whatever is staged
    pub fn outgoing_answers(&self) -> Vec<AnsweredQuestion> {
        let staged = self.phase.staged();
        let mut answers = Vec::with_capacity(self.accumulated_answers.len() + staged.len());
        answers.extend_from_slice(&self.accumulated_answers);
        answers.extend_from_slice(staged);
        answers
    }
}

/// Immutable configuration for a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvContext {
    /// Element vocabulary advertised on `start`; `None` sends no vocabulary
    pub elements: Option<Vec<ElementAdvert>>,
}

impl ConvContext {
    pub fn new(elements: Option<Vec<ElementAdvert>>) -> Self {
        Self { elements }
    }
}
