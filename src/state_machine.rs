//! Conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The session owns the state and executes the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, SessionEvent};
pub use event::Event;
pub use state::{ConvContext, ConversationState, Phase};
pub use transition::{transition, TransitionError, TransitionResult};
