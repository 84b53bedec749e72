//! Phase state machine
//!
//! The transition table, phase owners, required deliverables and progress
//! figures are static and exposed as pure functions. [`PhaseMachine`] tracks
//! the current phase of one project and the phases it has visited.
//!
//! No async, no I/O. A rejected transition leaves the machine untouched.

use guild_core::{participants, GuildError, Phase};
use thiserror::Error;

/// A transition the table does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Illegal transition from {from} to {to}")]
pub struct IllegalTransition {
    pub from: Phase,
    pub to: Phase,
}

impl From<IllegalTransition> for GuildError {
    fn from(err: IllegalTransition) -> Self {
        GuildError::IllegalTransition {
            from: err.from,
            to: err.to,
        }
    }
}

/// Phases reachable from `phase` in one step
pub fn allowed_transitions(phase: Phase) -> &'static [Phase] {
    match phase {
        Phase::Idea => &[Phase::Analysis, Phase::Failed],
        Phase::Analysis => &[Phase::Architecture, Phase::Failed],
        Phase::Architecture => &[Phase::Design, Phase::Analysis, Phase::Failed],
        Phase::Design => &[Phase::Implementation, Phase::Architecture, Phase::Failed],
        Phase::Implementation => &[Phase::Testing, Phase::Design, Phase::Failed],
        Phase::Testing => &[Phase::Review, Phase::Implementation, Phase::Failed],
        Phase::Review => &[Phase::Delivery, Phase::Implementation, Phase::Failed],
        Phase::Delivery | Phase::Failed => &[],
    }
}

/// Participant that owns the work of a phase
pub fn responsible_participant(phase: Phase) -> &'static str {
    match phase {
        Phase::Idea | Phase::Delivery | Phase::Failed => participants::ORCHESTRATOR,
        Phase::Analysis => participants::ANALYST,
        Phase::Architecture => participants::ARCHITECT,
        Phase::Design => participants::DESIGNER,
        Phase::Implementation => participants::BACKEND,
        Phase::Testing => participants::QA,
        Phase::Review => participants::CTO,
    }
}

/// Artifact names that must exist before a phase can complete
pub fn required_deliverables(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::Analysis => &["functional_spec.md", "user_stories.yaml"],
        Phase::Architecture => &["architecture.md", "openapi.yaml", "decisions.md"],
        Phase::Design => &["design_system.md", "wireframes.md"],
        Phase::Implementation => &["backend_code", "frontend_code"],
        Phase::Testing => &["test_plan.md", "test_results.md"],
        Phase::Review => &["cto_review.md"],
        Phase::Idea | Phase::Delivery | Phase::Failed => &[],
    }
}

/// Rough completion figure for a phase
pub fn progress_percentage(phase: Phase) -> u8 {
    match phase {
        Phase::Idea => 0,
        Phase::Analysis => 10,
        Phase::Architecture => 25,
        Phase::Design => 40,
        Phase::Implementation => 70,
        Phase::Testing => 85,
        Phase::Review => 95,
        Phase::Delivery => 100,
        Phase::Failed => 0,
    }
}

pub fn is_terminal(phase: Phase) -> bool {
    matches!(phase, Phase::Delivery | Phase::Failed)
}

/// One-line description used in task assignments
pub fn phase_description(phase: Phase) -> &'static str {
    match phase {
        Phase::Idea => "Capture the project idea",
        Phase::Analysis => "Analyze requirements and write the functional spec and user stories",
        Phase::Architecture => "Design the system architecture, API contract and key decisions",
        Phase::Design => "Produce the design system and wireframes",
        Phase::Implementation => "Implement the backend and frontend",
        Phase::Testing => "Plan and run the test suite",
        Phase::Review => "Review the project and decide GO, CONDITIONAL GO or NO-GO",
        Phase::Delivery => "Deliver the project",
        Phase::Failed => "Workflow failed",
    }
}

/// Current phase of a project plus the phases visited so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseMachine {
    current: Phase,
    history: Vec<Phase>,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            current: Phase::Idea,
            history: vec![Phase::Idea],
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Phases visited, oldest first, starting at `Idea`
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn can_transition_to(&self, target: Phase) -> bool {
        allowed_transitions(self.current).contains(&target)
    }

    /// Move to `target`, or leave the machine as it was if the move is illegal
    pub fn transition_to(&mut self, target: Phase) -> Result<(), IllegalTransition> {
        if !self.can_transition_to(target) {
            return Err(IllegalTransition {
                from: self.current,
                to: target,
            });
        }

        self.current = target;
        self.history.push(target);
        Ok(())
    }

    /// Following phase on the happy path, `None` once delivered or failed
    pub fn next_happy_path_phase(&self) -> Option<Phase> {
        let position = Phase::HAPPY_PATH.iter().position(|p| *p == self.current)?;
        Phase::HAPPY_PATH.get(position + 1).copied()
    }

    pub fn responsible_participant(&self) -> &'static str {
        responsible_participant(self.current)
    }

    pub fn required_deliverables(&self) -> &'static [&'static str] {
        required_deliverables(self.current)
    }

    pub fn progress_percentage(&self) -> u8 {
        progress_percentage(self.current)
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal(self.current)
    }

    /// Back to `Idea` with a fresh history
    pub fn reset(&mut self) {
        self.current = Phase::Idea;
        self.history.clear();
        self.history.push(Phase::Idea);
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
