//! Unified error types for Guild

use thiserror::Error;

use crate::{MessageKind, Phase};

/// Unified error type for all Guild operations
#[derive(Error, Debug)]
pub enum GuildError {
    // Message errors
    #[error("{kind} message is missing required payload key(s): {}", missing.join(", "))]
    Construction {
        kind: MessageKind,
        missing: Vec<String>,
    },

    #[error("Mailbox for '{participant}' is full ({capacity}); message from '{from}' dropped")]
    MailboxFull {
        participant: String,
        from: String,
        capacity: usize,
    },

    // Workflow errors
    #[error("Illegal phase transition: {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },

    // Worker errors
    #[error("Worker execution error: {0}")]
    Worker(String),

    // Governance errors
    #[error("Decision record error: {0}")]
    Decision(String),

    // Deliverable errors
    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using GuildError
pub type Result<T> = std::result::Result<T, GuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_lists_missing_keys() {
        let err = GuildError::Construction {
            kind: MessageKind::Deliverable,
            missing: vec!["summary".to_string(), "artifacts".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "deliverable message is missing required payload key(s): summary, artifacts"
        );
    }

    #[test]
    fn test_mailbox_full_message() {
        let err = GuildError::MailboxFull {
            participant: "analyst".to_string(),
            from: "orchestrator".to_string(),
            capacity: 1000,
        };
        assert!(err.to_string().contains("analyst"));
        assert!(err.to_string().contains("1000"));
    }
}
