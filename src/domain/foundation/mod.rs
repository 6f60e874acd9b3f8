//! Foundation module - Shared domain primitives.
//!
//! Contains the error vocabulary and the state machine contract used by
//! the billing entities.

mod errors;
mod state_machine;

pub use errors::{DomainError, ErrorCode};
pub use state_machine::StateMachine;
