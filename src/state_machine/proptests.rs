//! Property-based tests for the state machine
//!
//! These tests drive random event sequences and check the conversation
//! invariants after every step.

use super::transition::*;
use super::*;
use crate::chat::{AnsweredQuestion, ChatError, ChatResponse, Question, ResponseKind};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::default()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_question() -> impl Strategy<Value = Question> {
    (
        prop_oneof![Just("text"), Just("radio"), Just("slider"), Just("widget")],
        "[A-Za-z ]{1,20}\\?",
    )
        .prop_map(|(kind, text)| Question::new(kind, text))
}

fn arb_answer() -> impl Strategy<Value = AnsweredQuestion> {
    ("[A-Za-z ]{1,20}\\?", "[a-z0-9]{0,10}").prop_map(|(q, a)| AnsweredQuestion::new(q, a))
}

fn arb_thread_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("t1".to_string()), Just("t2".to_string()), Just(String::new())]
}

fn arb_response() -> impl Strategy<Value = ChatResponse> {
    (
        arb_thread_id(),
        prop_oneof![
            Just(ResponseKind::Questions),
            Just(ResponseKind::Clarification),
            Just(ResponseKind::Answer),
            Just(ResponseKind::Unknown),
        ],
        "[a-z ]{0,10}",
        proptest::option::of(proptest::collection::vec(arb_question(), 0..3)),
        any::<bool>(),
    )
        .prop_map(|(thread_id, kind, content, questions, is_complete)| ChatResponse {
            thread_id,
            kind,
            content,
            questions,
            is_complete,
            progress: None,
        })
}

fn arb_failure() -> impl Strategy<Value = ChatError> {
    prop_oneof![
        Just(ChatError::rate_limit(
            "Rate limit exceeded",
            Some(Duration::from_secs(2))
        )),
        Just(ChatError::auth("Invalid API key")),
        Just(ChatError::http(500, "Internal error", None)),
        Just(ChatError::generic("Connection failed: refused")),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-z ]{0,10}".prop_map(|prompt| Event::Start { prompt }),
        (proptest::collection::vec(arb_answer(), 0..3), any::<bool>())
            .prop_map(|(answers, want_more)| Event::Continue { answers, want_more }),
        proptest::collection::vec(arb_answer(), 0..3).prop_map(|answers| Event::Finish { answers }),
        arb_response().prop_map(Event::Response),
        arb_failure().prop_map(Event::Failure),
        Just(Event::Cancelled),
    ]
}

// ============================================================================
// State Validity Checkers
// ============================================================================

fn is_valid_state(state: &ConversationState) -> bool {
    // A final answer only ever exists on a completed conversation
    if state.final_answer.is_some() && !state.is_complete() {
        return false;
    }
    if state
        .final_answer
        .as_deref()
        .is_some_and(|answer| answer.trim().is_empty())
    {
        return false;
    }
    // Asking always has something to ask and a thread to ask on
    if matches!(state.phase, Phase::Asking)
        && (state.pending_questions.is_empty() || state.thread_id.is_none())
    {
        return false;
    }
    if state.phase.is_in_flight() && state.thread_id.is_none() {
        return false;
    }
    state.questions_answered == state.accumulated_answers.len()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_transitions_preserve_validity(events in proptest::collection::vec(arb_event(), 0..25)) {
        let mut state = ConversationState::default();
        for event in events {
            if let Ok(result) = transition(&state, &test_context(), event) {
                state = result.new_state;
                prop_assert!(is_valid_state(&state), "Invalid state: {:?}", state);
            }
        }
    }

    #[test]
    fn prop_answers_are_append_only(events in proptest::collection::vec(arb_event(), 0..25)) {
        let mut state = ConversationState::default();
        for event in events {
            if let Ok(result) = transition(&state, &test_context(), event) {
                let before = &state.accumulated_answers;
                let after = &result.new_state.accumulated_answers;
                prop_assert!(after.len() >= before.len());
                prop_assert_eq!(&after[..before.len()], &before[..]);
                state = result.new_state;
            }
        }
    }

    #[test]
    fn prop_thread_id_never_changes_once_set(events in proptest::collection::vec(arb_event(), 0..25)) {
        let mut state = ConversationState::default();
        for event in events {
            if let Ok(result) = transition(&state, &test_context(), event) {
                if let Some(id) = &state.thread_id {
                    prop_assert_eq!(result.new_state.thread_id.as_ref(), Some(id));
                }
                state = result.new_state;
            }
        }
    }

    #[test]
    fn prop_complete_rejects_every_request(event in arb_event()) {
        let state = ConversationState {
            thread_id: Some("t1".to_string()),
            phase: Phase::Complete,
            final_answer: Some("done".to_string()),
            ..Default::default()
        };
        let is_request = matches!(
            event,
            Event::Start { .. } | Event::Continue { .. } | Event::Finish { .. }
        );
        let result = transition(&state, &test_context(), event);
        if is_request {
            prop_assert!(result.is_err(), "Complete accepted a request: {:?}", result);
        }
    }

    #[test]
    fn prop_outgoing_request_carries_full_history(
        history in proptest::collection::vec(arb_answer(), 0..5),
        staged in proptest::collection::vec(arb_answer(), 0..5),
        want_more in any::<bool>(),
    ) {
        let state = ConversationState {
            thread_id: Some("t1".to_string()),
            phase: Phase::Asking,
            pending_questions: vec![Question::new("text", "Why?")],
            questions_answered: history.len(),
            accumulated_answers: history.clone(),
            ..Default::default()
        };
        let result = transition(
            &state,
            &test_context(),
            Event::Continue { answers: staged.clone(), want_more },
        ).unwrap();

        let request = result.request().unwrap();
        let expected: Vec<_> = history.into_iter().chain(staged).collect();
        prop_assert_eq!(request.answers(), &expected[..]);
        prop_assert_eq!(request.thread_id(), Some("t1"));
    }

    #[test]
    fn prop_rate_limit_preserves_progress(
        staged in proptest::collection::vec(arb_answer(), 0..5),
        finish in any::<bool>(),
    ) {
        let state = ConversationState {
            thread_id: Some("t1".to_string()),
            phase: Phase::Asking,
            pending_questions: vec![Question::new("text", "Why?")],
            ..Default::default()
        };
        let event = if finish {
            Event::Finish { answers: staged }
        } else {
            Event::Continue { answers: staged, want_more: false }
        };
        let sent = transition(&state, &test_context(), event).unwrap();
        let failed = transition(
            &sent.new_state,
            &test_context(),
            Event::Failure(ChatError::rate_limit("slow down", None)),
        ).unwrap();

        prop_assert_eq!(&failed.new_state.phase, &Phase::Asking);
        prop_assert_eq!(&failed.new_state.pending_questions, &state.pending_questions);
        prop_assert!(failed.new_state.accumulated_answers.is_empty());
    }

    #[test]
    fn prop_usage_errors_leave_state_untouched(answers in proptest::collection::vec(arb_answer(), 0..3)) {
        let state = ConversationState::default();
        let result = transition(&state, &test_context(), Event::Finish { answers });
        prop_assert!(matches!(result, Err(TransitionError::NotStarted)));
    }
}
