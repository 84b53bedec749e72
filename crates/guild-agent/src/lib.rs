//! # guild-agent
//!
//! Worker side of a Guild project.
//!
//! A [`Worker`] handles tasks assigned by the orchestrator and talks back through
//! its [`WorkerContext`]. [`WorkerRuntime`] connects a worker to its mailbox.
//! The [`template`] module provides a deterministic standard team.

pub mod template;
mod worker;

pub use template::{spawn_template_team, TemplateRole, TemplateWorker};
pub use worker::{Worker, WorkerContext, WorkerRuntime, EXECUTION_ERROR};
