//! Wire types exchanged with the Bleak chat endpoint

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A question the backend wants answered before it produces a final answer.
///
/// `kind` is an open string chosen by the backend from the element vocabulary
/// advertised on `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "question")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl Question {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            options: None,
        }
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }
}

/// An answer, joined to its question by the literal question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
}

impl AnsweredQuestion {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Build answers from form state keyed by question text, in the order of
    /// `questions`. Questions without an entry in `values` are skipped.
    pub fn collect_from(questions: &[Question], values: &HashMap<String, String>) -> Vec<Self> {
        questions
            .iter()
            .filter_map(|q| {
                values
                    .get(&q.text)
                    .map(|answer| Self::new(q.text.clone(), answer.clone()))
            })
            .collect()
    }
}

impl<Q: Into<String>, A: Into<String>> From<(Q, A)> for AnsweredQuestion {
    fn from((question, answer): (Q, A)) -> Self {
        Self::new(question, answer)
    }
}

/// Element vocabulary entry advertised to the backend on `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAdvert {
    pub name: String,
    pub description: String,
}

/// What the caller wants after a continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserChoice {
    MoreQuestions,
    FinalAnswer,
}

/// Request body, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatRequest {
    Start {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bleak_elements: Option<Vec<ElementAdvert>>,
    },
    Continue {
        thread_id: String,
        answers: Vec<AnsweredQuestion>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_choice: Option<UserChoice>,
    },
    Complete {
        thread_id: String,
        answers: Vec<AnsweredQuestion>,
    },
}

impl ChatRequest {
    /// The `type` discriminator as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ChatRequest::Start { .. } => "start",
            ChatRequest::Continue { .. } => "continue",
            ChatRequest::Complete { .. } => "complete",
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        match self {
            ChatRequest::Start { .. } => None,
            ChatRequest::Continue { thread_id, .. } | ChatRequest::Complete { thread_id, .. } => {
                Some(thread_id)
            }
        }
    }

    pub fn answers(&self) -> &[AnsweredQuestion] {
        match self {
            ChatRequest::Start { .. } => &[],
            ChatRequest::Continue { answers, .. } | ChatRequest::Complete { answers, .. } => answers,
        }
    }

    /// Whether the backend is expected to synthesize a final answer.
    /// Answer synthesis gets the longer timeout.
    pub fn expects_final_answer(&self) -> bool {
        match self {
            ChatRequest::Start { .. } => false,
            ChatRequest::Continue { user_choice, .. } => {
                *user_choice != Some(UserChoice::MoreQuestions)
            }
            ChatRequest::Complete { .. } => true,
        }
    }
}

/// Response `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Questions,
    Answer,
    Clarification,
    #[serde(other)]
    Unknown,
}

impl ResponseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Questions => "questions",
            ResponseKind::Answer => "answer",
            ResponseKind::Clarification => "clarification",
            ResponseKind::Unknown => "unknown",
        }
    }
}

/// Response body, one shape for every request variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub thread_id: String,
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    /// Final answer text, or an instructional message while asking.
    /// Older backends call this field `message`.
    #[serde(default, alias = "message")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<serde_json::Value>,
}

impl ChatResponse {
    pub fn questions(&self) -> &[Question] {
        self.questions.as_deref().unwrap_or_default()
    }

    pub fn has_questions(&self) -> bool {
        !self.questions().is_empty()
    }

    /// A question round for `thread_id`
    pub fn asking(thread_id: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            thread_id: thread_id.into(),
            kind: ResponseKind::Questions,
            content: String::new(),
            questions: Some(questions),
            is_complete: false,
            progress: None,
        }
    }

    /// A final answer for `thread_id`
    pub fn answered(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            kind: ResponseKind::Answer,
            content: content.into(),
            questions: None,
            is_complete: true,
            progress: None,
        }
    }
}
