//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! new state and effects. Network I/O happens in the session, which executes
//! [`Effect::SendRequest`] and feeds the outcome back as an event.

use super::effect::SessionEvent;
use super::{ConvContext, ConversationState, Effect, Event, Phase};
use crate::chat::{
    AnsweredQuestion, ChatError, ChatRequest, ChatResponse, Question, ResponseKind, UserChoice,
};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// The request to send, if this transition produced one
    pub fn request(&self) -> Option<&ChatRequest> {
        self.effects.iter().find_map(|e| match e {
            Effect::SendRequest { request } => Some(request),
            Effect::Notify(_) => None,
        })
    }
}

/// Caller misuse rejected without touching state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,
    #[error("Conversation already started. Call reset() to begin a new one.")]
    AlreadyStarted,
    #[error("No active conversation. Call start() first.")]
    NotStarted,
    #[error("Conversation is complete. Call reset() to begin a new one.")]
    ConversationComplete,
    #[error("A previous request has not settled. Call reset() to recover.")]
    RequestInFlight,
    #[error("Invalid transition: {event} in phase {phase}")]
    InvalidTransition {
        event: &'static str,
        phase: &'static str,
    },
}

impl From<TransitionError> for ChatError {
    fn from(err: TransitionError) -> Self {
        ChatError::generic(err.to_string())
    }
}

/// What a well-formed response means for the conversation
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Questions(Vec<Question>),
    Answer(String),
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&state.phase, event) {
        // ============================================================
        // Reset is always allowed
        // ============================================================
        (_, Event::Reset) => Ok(TransitionResult::new(ConversationState::default())
            .with_effect(Effect::notify(SessionEvent::Reset))),

        // ============================================================
        // Caller requests
        // ============================================================
        (Phase::Starting, Event::Start { prompt }) => {
            if prompt.trim().is_empty() {
                return Err(TransitionError::EmptyPrompt);
            }
            if state.thread_id.is_some() {
                return Err(TransitionError::AlreadyStarted);
            }

            let mut new_state = state.clone();
            new_state.last_error = None;
            Ok(TransitionResult::new(new_state).with_effect(Effect::send(ChatRequest::Start {
                prompt,
                bleak_elements: context.elements.clone(),
            })))
        }

        (Phase::Asking, Event::Start { .. }) => Err(TransitionError::AlreadyStarted),

        (Phase::Asking, Event::Continue { answers, want_more }) => {
            let thread_id = active_thread(state)?;
            let count = answers.len();
            let mut new_state = state.clone();
            new_state.last_error = None;
            new_state.phase = Phase::Answering {
                staged: answers,
                want_more,
            };
            let request = ChatRequest::Continue {
                thread_id,
                answers: new_state.outgoing_answers(),
                user_choice: Some(if want_more {
                    UserChoice::MoreQuestions
                } else {
                    UserChoice::FinalAnswer
                }),
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify(SessionEvent::AnswersSubmitted { count }))
                .with_effect(Effect::send(request)))
        }

        (Phase::Asking, Event::Finish { answers }) => {
            let thread_id = active_thread(state)?;
            let count = answers.len();
            let mut new_state = state.clone();
            new_state.last_error = None;
            new_state.phase = Phase::Completing { staged: answers };
            let request = ChatRequest::Complete {
                thread_id,
                answers: new_state.outgoing_answers(),
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify(SessionEvent::AnswersSubmitted { count }))
                .with_effect(Effect::send(request)))
        }

        (Phase::Starting, Event::Continue { .. } | Event::Finish { .. }) => {
            Err(TransitionError::NotStarted)
        }

        (Phase::Complete, Event::Start { .. }) => Err(TransitionError::ConversationComplete),

        (Phase::Complete, Event::Continue { .. } | Event::Finish { .. }) => {
            if state.thread_id.is_none() {
                Err(TransitionError::NotStarted)
            } else {
                Err(TransitionError::ConversationComplete)
            }
        }

        (
            Phase::Answering { .. } | Phase::Completing { .. },
            Event::Start { .. } | Event::Continue { .. } | Event::Finish { .. },
        ) => Err(TransitionError::RequestInFlight),

        // ============================================================
        // Responses
        // ============================================================
        (Phase::Starting, Event::Response(response)) => {
            if response.thread_id.trim().is_empty() {
                return transition(
                    state,
                    context,
                    Event::Failure(ChatError::protocol("response is missing thread_id")),
                );
            }
            let outcome = match validate_response(&response) {
                Ok(outcome) => outcome,
                Err(err) => return transition(state, context, Event::Failure(err)),
            };

            let mut new_state = state.clone();
            new_state.thread_id = Some(response.thread_id.clone());
            let started = Effect::notify(SessionEvent::Started {
                thread_id: response.thread_id,
            });
            Ok(apply_outcome(new_state, outcome).with_effects_first(started))
        }

        (Phase::Answering { staged, .. }, Event::Response(response)) => {
            let outcome = match validate_response(&response) {
                Ok(outcome) => outcome,
                Err(err) => return transition(state, context, Event::Failure(err)),
            };
            let new_state = commit_staged(state, staged);
            Ok(apply_outcome(new_state, outcome))
        }

        (Phase::Completing { staged }, Event::Response(response)) => {
            let outcome = match validate_response(&response) {
                Ok(Outcome::Questions(_)) => {
                    let err = ChatError::protocol("completion request answered with questions");
                    return transition(state, context, Event::Failure(err));
                }
                Ok(outcome) => outcome,
                Err(err) => return transition(state, context, Event::Failure(err)),
            };
            let new_state = commit_staged(state, staged);
            Ok(apply_outcome(new_state, outcome))
        }

        // ============================================================
        // Failures
        // ============================================================
        (
            Phase::Starting | Phase::Answering { .. } | Phase::Completing { .. },
            Event::Failure(err),
        ) => {
            let notify = Effect::notify(SessionEvent::Failed {
                kind: err.kind(),
                message: err.message().to_string(),
            });
            let new_state = if err.kind().is_recoverable() {
                roll_back(state, err)
            } else {
                let mut new_state = state.clone();
                new_state.phase = Phase::Complete;
                new_state.pending_questions.clear();
                new_state.last_error = Some(err);
                new_state
            };
            Ok(TransitionResult::new(new_state).with_effect(notify))
        }

        (Phase::Starting | Phase::Answering { .. } | Phase::Completing { .. }, Event::Cancelled) => {
            let err = ChatError::cancelled();
            let notify = Effect::notify(SessionEvent::Failed {
                kind: err.kind(),
                message: err.message().to_string(),
            });
            Ok(TransitionResult::new(roll_back(state, err)).with_effect(notify))
        }

        // ============================================================
        // Everything else is a bug in the driver
        // ============================================================
        (
            phase @ (Phase::Asking | Phase::Complete),
            event @ (Event::Response(_) | Event::Failure(_) | Event::Cancelled),
        ) => Err(TransitionError::InvalidTransition {
            event: event.name(),
            phase: phase.name(),
        }),
    }
}

impl TransitionResult {
    fn with_effects_first(mut self, effect: Effect) -> Self {
        self.effects.insert(0, effect);
        self
    }
}

fn active_thread(state: &ConversationState) -> Result<String, TransitionError> {
    state.thread_id.clone().ok_or(TransitionError::NotStarted)
}

/// Check a response against the wire contract
fn validate_response(response: &ChatResponse) -> Result<Outcome, ChatError> {
    if response.is_complete {
        if response.content.trim().is_empty() {
            return Err(ChatError::protocol("completed response carries no answer"));
        }
        if response.has_questions() {
            return Err(ChatError::protocol(
                "completed response also carries questions",
            ));
        }
        return Ok(Outcome::Answer(response.content.clone()));
    }

    match response.kind {
        ResponseKind::Questions | ResponseKind::Clarification if response.has_questions() => {
            Ok(Outcome::Questions(response.questions().to_vec()))
        }
        ResponseKind::Questions | ResponseKind::Clarification => Err(ChatError::protocol(
            "response has neither questions nor a final answer",
        )),
        ResponseKind::Answer => Err(ChatError::protocol(
            "answer returned without completing the conversation",
        )),
        ResponseKind::Unknown => Err(ChatError::protocol("unrecognized response type")),
    }
}

fn commit_staged(state: &ConversationState, staged: &[AnsweredQuestion]) -> ConversationState {
    let mut new_state = state.clone();
    new_state.accumulated_answers.extend_from_slice(staged);
    new_state.questions_answered += staged.len();
    new_state
}

fn apply_outcome(mut state: ConversationState, outcome: Outcome) -> TransitionResult {
    match outcome {
        Outcome::Questions(questions) => {
            state.phase = Phase::Asking;
            state.rounds += 1;
            state.questions_asked += questions.len();
            state.pending_questions.clone_from(&questions);
            let round = state.rounds;
            TransitionResult::new(state)
                .with_effect(Effect::notify(SessionEvent::Questions { round, questions }))
        }
        Outcome::Answer(answer) => {
            state.phase = Phase::Complete;
            state.pending_questions.clear();
            state.final_answer = Some(answer.clone());
            TransitionResult::new(state).with_effect(Effect::notify(SessionEvent::Completed { answer }))
        }
    }
}

/// Undo an in-flight request: staged answers are dropped, pending questions kept
fn roll_back(state: &ConversationState, err: ChatError) -> ConversationState {
    let mut new_state = state.clone();
    new_state.phase = match state.phase {
        Phase::Answering { .. } | Phase::Completing { .. } => Phase::Asking,
        ref other => other.clone(),
    };
    new_state.last_error = Some(err);
    new_state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatErrorKind;
    use std::time::Duration;

    fn test_context() -> ConvContext {
        ConvContext::default()
    }

    fn destination() -> Question {
        Question::new("text", "Destination?")
    }

    fn asking_state() -> ConversationState {
        ConversationState {
            thread_id: Some("t1".to_string()),
            phase: Phase::Asking,
            pending_questions: vec![destination()],
            rounds: 1,
            questions_asked: 1,
            ..Default::default()
        }
    }

    fn step(state: &ConversationState, event: Event) -> TransitionResult {
        transition(state, &test_context(), event).unwrap()
    }

    #[test]
    fn test_start_sends_prompt_with_vocabulary() {
        let context = ConvContext::new(Some(vec![crate::chat::ElementAdvert {
            name: "text".to_string(),
            description: "Free text".to_string(),
        }]));
        let result = transition(
            &ConversationState::default(),
            &context,
            Event::Start {
                prompt: "Plan a trip".to_string(),
            },
        )
        .unwrap();

        assert_eq!(result.new_state.phase, Phase::Starting);
        match result.request() {
            Some(ChatRequest::Start {
                prompt,
                bleak_elements,
            }) => {
                assert_eq!(prompt, "Plan a trip");
                assert_eq!(bleak_elements.as_ref().unwrap()[0].name, "text");
            }
            other => panic!("expected start request, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let result = transition(
            &ConversationState::default(),
            &test_context(),
            Event::Start {
                prompt: "   ".to_string(),
            },
        );
        assert!(matches!(result, Err(TransitionError::EmptyPrompt)));
    }

    #[test]
    fn test_start_response_with_questions_moves_to_asking() {
        let result = step(
            &ConversationState::default(),
            Event::Response(ChatResponse::asking("t1", vec![destination()])),
        );

        let state = result.new_state;
        assert_eq!(state.phase, Phase::Asking);
        assert_eq!(state.thread_id.as_deref(), Some("t1"));
        assert_eq!(state.pending_questions.len(), 1);
        assert_eq!(state.rounds, 1);
        assert!(matches!(
            result.effects[0],
            Effect::Notify(SessionEvent::Started { .. })
        ));
    }

    #[test]
    fn test_start_response_with_direct_answer_completes() {
        let result = step(
            &ConversationState::default(),
            Event::Response(ChatResponse::answered("t1", "42")),
        );
        assert_eq!(result.new_state.phase, Phase::Complete);
        assert_eq!(result.new_state.final_answer.as_deref(), Some("42"));
        assert!(result.new_state.pending_questions.is_empty());
    }

    #[test]
    fn test_completed_response_without_content_is_protocol_error() {
        let result = step(
            &ConversationState::default(),
            Event::Response(ChatResponse::answered("t1", "  ")),
        );

        let state = result.new_state;
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.final_answer, None);
        let err = state.last_error.unwrap();
        assert_eq!(err.kind(), ChatErrorKind::Generic);
        assert!(err.message().contains("carries no answer"));
        assert!(matches!(
            result.effects.as_slice(),
            [Effect::Notify(SessionEvent::Failed { kind: ChatErrorKind::Generic, .. })]
        ));
    }

    #[test]
    fn test_completed_response_with_questions_is_protocol_error() {
        let sent = step(
            &asking_state(),
            Event::Continue {
                answers: vec![AnsweredQuestion::new("Destination?", "Japan")],
                want_more: false,
            },
        );
        let mut response = ChatResponse::answered("t1", "Go to Kyoto");
        response.questions = Some(vec![destination()]);
        let result = step(&sent.new_state, Event::Response(response));

        let state = result.new_state;
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.final_answer, None);
        assert!(state.pending_questions.is_empty());
        let err = state.last_error.unwrap();
        assert_eq!(err.kind(), ChatErrorKind::Generic);
        assert!(err.message().contains("also carries questions"));
    }

    #[test]
    fn test_missing_thread_id_is_protocol_error() {
        let result = step(
            &ConversationState::default(),
            Event::Response(ChatResponse::asking("", vec![destination()])),
        );
        assert_eq!(result.new_state.phase, Phase::Complete);
        assert!(result.new_state.thread_id.is_none());
        let err = result.new_state.last_error.unwrap();
        assert!(err.message().contains("thread_id"));
    }

    #[test]
    fn test_continue_before_start_rejected() {
        let result = transition(
            &ConversationState::default(),
            &test_context(),
            Event::Continue {
                answers: vec![],
                want_more: false,
            },
        );
        assert!(matches!(result, Err(TransitionError::NotStarted)));

        let result = transition(
            &ConversationState::default(),
            &test_context(),
            Event::Finish { answers: vec![] },
        );
        assert!(matches!(result, Err(TransitionError::NotStarted)));
    }

    #[test]
    fn test_continue_stages_answers_and_sends_full_history() {
        let mut state = asking_state();
        state.accumulated_answers = vec![AnsweredQuestion::new("Budget?", "Low")];

        let result = step(
            &state,
            Event::Continue {
                answers: vec![AnsweredQuestion::new("Destination?", "Japan")],
                want_more: true,
            },
        );

        // Not committed until the backend accepts it
        assert_eq!(result.new_state.accumulated_answers.len(), 1);
        assert_eq!(result.new_state.phase.name(), "answering");

        match result.request() {
            Some(ChatRequest::Continue {
                thread_id,
                answers,
                user_choice,
            }) => {
                assert_eq!(thread_id, "t1");
                assert_eq!(
                    answers,
                    &vec![
                        AnsweredQuestion::new("Budget?", "Low"),
                        AnsweredQuestion::new("Destination?", "Japan"),
                    ]
                );
                assert_eq!(*user_choice, Some(UserChoice::MoreQuestions));
            }
            other => panic!("expected continue request, got {other:?}"),
        }
    }

    #[test]
    fn test_continue_response_commits_staged_answers() {
        let sent = step(
            &asking_state(),
            Event::Continue {
                answers: vec![AnsweredQuestion::new("Destination?", "Japan")],
                want_more: false,
            },
        );
        let result = step(
            &sent.new_state,
            Event::Response(ChatResponse::asking(
                "t1",
                vec![Question::new("slider", "Budget?")],
            )),
        );

        let state = result.new_state;
        assert_eq!(state.phase, Phase::Asking);
        assert_eq!(
            state.accumulated_answers,
            vec![AnsweredQuestion::new("Destination?", "Japan")]
        );
        assert_eq!(state.pending_questions[0].text, "Budget?");
        assert_eq!(state.rounds, 2);
        assert_eq!(state.questions_answered, 1);
    }

    #[test]
    fn test_finish_then_answer_completes() {
        let sent = step(
            &asking_state(),
            Event::Finish {
                answers: vec![AnsweredQuestion::new("Destination?", "Japan")],
            },
        );
        match sent.request() {
            Some(ChatRequest::Complete { answers, .. }) => {
                assert_eq!(answers, &vec![AnsweredQuestion::new("Destination?", "Japan")]);
            }
            other => panic!("expected complete request, got {other:?}"),
        }

        let result = step(
            &sent.new_state,
            Event::Response(ChatResponse::answered("t1", "Here is your itinerary...")),
        );
        assert_eq!(result.new_state.phase, Phase::Complete);
        assert_eq!(
            result.new_state.final_answer.as_deref(),
            Some("Here is your itinerary...")
        );
        assert_eq!(result.new_state.accumulated_answers.len(), 1);
    }

    #[test]
    fn test_answer_without_completion_is_protocol_error() {
        let sent = step(
            &asking_state(),
            Event::Continue {
                answers: vec![],
                want_more: false,
            },
        );
        let mut response = ChatResponse::answered("t1", "...");
        response.is_complete = false;

        let result = step(&sent.new_state, Event::Response(response));
        assert_eq!(result.new_state.phase, Phase::Complete);
        assert!(result.new_state.final_answer.is_none());
        let err = result.new_state.last_error.unwrap();
        assert_eq!(err.kind(), ChatErrorKind::Generic);
    }

    #[test]
    fn test_empty_question_round_is_protocol_error() {
        let result = step(
            &ConversationState::default(),
            Event::Response(ChatResponse::asking("t1", vec![])),
        );
        assert_eq!(result.new_state.phase, Phase::Complete);
        assert!(result.new_state.last_error.is_some());
    }

    #[test]
    fn test_finish_answered_with_questions_is_protocol_error() {
        let sent = step(&asking_state(), Event::Finish { answers: vec![] });
        let result = step(
            &sent.new_state,
            Event::Response(ChatResponse::asking("t1", vec![destination()])),
        );
        assert_eq!(result.new_state.phase, Phase::Complete);
        assert!(result.new_state.last_error.is_some());
    }

    #[test]
    fn test_rate_limit_rolls_back_without_committing() {
        let sent = step(
            &asking_state(),
            Event::Continue {
                answers: vec![AnsweredQuestion::new("Destination?", "Japan")],
                want_more: false,
            },
        );
        let result = step(
            &sent.new_state,
            Event::Failure(ChatError::rate_limit("slow", Some(Duration::from_secs(1)))),
        );

        let state = result.new_state;
        assert_eq!(state.phase, Phase::Asking);
        assert!(state.accumulated_answers.is_empty());
        assert_eq!(state.pending_questions.len(), 1);
        assert_eq!(state.last_error.unwrap().kind(), ChatErrorKind::RateLimit);
    }

    #[test]
    fn test_auth_failure_forces_complete() {
        let sent = step(&asking_state(), Event::Finish { answers: vec![] });
        let result = step(&sent.new_state, Event::Failure(ChatError::auth("bad key")));

        assert_eq!(result.new_state.phase, Phase::Complete);
        assert!(result.new_state.pending_questions.is_empty());
        assert!(result.new_state.final_answer.is_none());
        assert!(matches!(
            result.effects[0],
            Effect::Notify(SessionEvent::Failed {
                kind: ChatErrorKind::Authentication,
                ..
            })
        ));
    }

    #[test]
    fn test_cancel_rolls_back() {
        let sent = step(&asking_state(), Event::Finish { answers: vec![] });
        let result = step(&sent.new_state, Event::Cancelled);
        assert_eq!(result.new_state.phase, Phase::Asking);
        assert!(result.new_state.last_error.is_some());
    }

    #[test]
    fn test_requests_rejected_while_in_flight() {
        let sent = step(&asking_state(), Event::Finish { answers: vec![] });
        let result = transition(
            &sent.new_state,
            &test_context(),
            Event::Continue {
                answers: vec![],
                want_more: true,
            },
        );
        assert!(matches!(result, Err(TransitionError::RequestInFlight)));
    }

    #[test]
    fn test_requests_rejected_after_completion() {
        let mut state = asking_state();
        state.phase = Phase::Complete;
        let result = transition(&state, &test_context(), Event::Finish { answers: vec![] });
        assert!(matches!(result, Err(TransitionError::ConversationComplete)));
    }

    #[test]
    fn test_thread_id_is_not_replaced_by_later_responses() {
        let sent = step(
            &asking_state(),
            Event::Continue {
                answers: vec![],
                want_more: true,
            },
        );
        let result = step(
            &sent.new_state,
            Event::Response(ChatResponse::asking("other", vec![destination()])),
        );
        assert_eq!(result.new_state.thread_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = asking_state();
        state.accumulated_answers = vec![AnsweredQuestion::new("a", "b")];
        state.last_error = Some(ChatError::generic("x"));

        let result = step(&state, Event::Reset);
        assert_eq!(result.new_state, ConversationState::default());
    }

    #[test]
    fn test_stray_response_is_invalid_transition() {
        let result = transition(
            &asking_state(),
            &test_context(),
            Event::Response(ChatResponse::answered("t1", "x")),
        );
        assert!(matches!(
            result,
            Err(TransitionError::InvalidTransition {
                event: "response",
                phase: "asking"
            })
        ));
    }
}
