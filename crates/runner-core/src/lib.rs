//! Deterministic run kernel for the quiz/choice game pattern.
//!
//! One generic session state machine replaces the per-game copies the
//! original platform shipped: content arrives as [`contracts::GameSpec`]
//! data through the catalog, and all timing (feedback delays, per-question
//! countdowns) is modeled as scheduled effects on a stepped clock.

pub mod catalog;
pub mod feedback;
pub mod session;
