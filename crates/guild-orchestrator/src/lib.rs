//! # guild-orchestrator
//!
//! Phase state machine and the orchestrator that drives a project from idea to
//! delivery.
//!
//! The orchestrator never does phase work itself. It assigns each phase to its
//! owner, waits for the phase's required deliverables, and only then moves on.
//! Decisions proposed during architecture are accepted when that phase
//! completes; a review that does not allow delivery sends the project back to
//! implementation.

mod orchestrator;
pub mod state_machine;

pub use orchestrator::{Blocker, Orchestrator, OrchestratorConfig, StatusSnapshot, Validation};
pub use state_machine::{IllegalTransition, PhaseMachine};
