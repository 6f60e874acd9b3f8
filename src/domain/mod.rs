//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (errors, state machine trait)
//! - `billing` - Webhook verification, event classification, and the
//!   subscription and payment lifecycles
//!
//! Nothing in this layer performs I/O.

pub mod billing;
pub mod foundation;
