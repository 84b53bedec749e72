//! # guild-core
//!
//! Core types for the Guild governed workflow system.
//!
//! A fixed team of participants carries a project from idea to delivery. Each
//! phase has one owner and a set of named deliverables that must exist before
//! the orchestrator moves on. Accepted decision records constrain every later
//! phase.
//!
//! This crate holds what every other Guild crate agrees on: phases, message
//! kinds and envelopes, the unified error type, and workspace configuration.

pub mod config;
mod error;
pub mod fail_open;
mod message;
mod types;

pub use config::GuildConfig;
pub use error::{GuildError, Result};
pub use message::{Message, Payload};
pub use types::*;
