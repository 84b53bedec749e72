//! Core type definitions for Guild workflows

use serde::{Deserialize, Serialize};

/// Target name that fans a message out to every listening participant
pub const BROADCAST: &str = "broadcast";

/// Well-known participant names
pub mod participants {
    pub const ORCHESTRATOR: &str = "orchestrator";
    pub const ANALYST: &str = "analyst";
    pub const ARCHITECT: &str = "architect";
    pub const DESIGNER: &str = "designer";
    pub const BACKEND: &str = "backend";
    pub const FRONTEND: &str = "frontend";
    pub const QA: &str = "qa";
    pub const CTO: &str = "cto";
}

/// Message priority levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// The closed set of message kinds exchanged over the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Work assignment from the orchestrator
    Task,
    /// Completed work submitted by a worker
    Deliverable,
    /// Question that may block the sender
    Clarification,
    /// Informational progress update
    Status,
    /// Failure notification
    Error,
    /// Phase change broadcast
    StateChange,
}

impl MessageKind {
    /// Payload keys a message of this kind must carry
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Task => &["description"],
            Self::Deliverable => &["summary", "artifacts"],
            Self::Clarification => &["question", "context"],
            Self::Status => &[],
            Self::Error => &["error_type", "message"],
            Self::StateChange => &["old_state", "new_state"],
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Deliverable => write!(f, "deliverable"),
            Self::Clarification => write!(f, "clarification"),
            Self::Status => write!(f, "status"),
            Self::Error => write!(f, "error"),
            Self::StateChange => write!(f, "state_change"),
        }
    }
}

/// Workflow phase
///
/// Declaration order follows the happy path; `Failed` sits outside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idea,
    Analysis,
    Architecture,
    Design,
    Implementation,
    Testing,
    Review,
    Delivery,
    Failed,
}

impl Phase {
    /// Canonical forward sequence from idea to delivery
    pub const HAPPY_PATH: [Phase; 8] = [
        Self::Idea,
        Self::Analysis,
        Self::Architecture,
        Self::Design,
        Self::Implementation,
        Self::Testing,
        Self::Review,
        Self::Delivery,
    ];

    /// Every phase, including `Failed`
    pub const ALL: [Phase; 9] = [
        Self::Idea,
        Self::Analysis,
        Self::Architecture,
        Self::Design,
        Self::Implementation,
        Self::Testing,
        Self::Review,
        Self::Delivery,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Analysis => "analysis",
            Self::Architecture => "architecture",
            Self::Design => "design",
            Self::Implementation => "implementation",
            Self::Testing => "testing",
            Self::Review => "review",
            Self::Delivery => "delivery",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Invalid phase: {}", s))
    }
}

/// Outcome of a review phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewDecision {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "CONDITIONAL GO")]
    ConditionalGo,
    #[serde(rename = "NO-GO")]
    NoGo,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::ConditionalGo => "CONDITIONAL GO",
            Self::NoGo => "NO-GO",
        }
    }

    /// Whether the workflow may proceed to delivery
    pub fn allows_delivery(&self) -> bool {
        matches!(self, Self::Go | Self::ConditionalGo)
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('_', " ").as_str() {
            "GO" => Ok(Self::Go),
            "CONDITIONAL GO" | "CONDITIONAL-GO" => Ok(Self::ConditionalGo),
            "NO-GO" | "NO GO" | "NOGO" => Ok(Self::NoGo),
            _ => Err(format!("Invalid review decision: {}", s)),
        }
    }
}
