//! # guild-memory
//!
//! Long-lived project memory for Guild.
//!
//! - [`DecisionLog`]: numbered decision records whose accepted constraints
//!   bind every later phase.
//! - [`ArtifactStore`]: named deliverables, grouped on disk by kind of work.
//!
//! The orchestrator sees these only through the [`GovernanceLedger`] and
//! [`DeliverableRegistry`] traits.

mod ledger;
mod registry;

pub use ledger::{DecisionLog, DecisionRecord, DecisionStatus, GovernanceLedger, NewDecision};
pub use registry::{Artifact, ArtifactKind, ArtifactStore, DeliverableRegistry};
