//! Deterministic template team
//!
//! Template workers fill every deliverable of their phase with a structured
//! placeholder document, so a project can be driven from idea to delivery
//! without any content generator attached.

use async_trait::async_trait;
use guild_bus::MessageBus;
use guild_core::{participants, Message, Payload, Phase, ReviewDecision, Result};
use guild_memory::{ArtifactStore, DecisionLog, NewDecision};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::worker::{Worker, WorkerContext, WorkerRuntime};

/// Seats on the standard team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateRole {
    Analyst,
    Architect,
    Designer,
    Backend,
    Frontend,
    Qa,
    Cto,
}

impl TemplateRole {
    pub const TEAM: [TemplateRole; 7] = [
        Self::Analyst,
        Self::Architect,
        Self::Designer,
        Self::Backend,
        Self::Frontend,
        Self::Qa,
        Self::Cto,
    ];

    pub fn participant(&self) -> &'static str {
        match self {
            Self::Analyst => participants::ANALYST,
            Self::Architect => participants::ARCHITECT,
            Self::Designer => participants::DESIGNER,
            Self::Backend => participants::BACKEND,
            Self::Frontend => participants::FRONTEND,
            Self::Qa => participants::QA,
            Self::Cto => participants::CTO,
        }
    }

    /// Artifacts this role produces
    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            Self::Analyst => &["functional_spec.md", "user_stories.yaml"],
            Self::Architect => &["architecture.md", "openapi.yaml", "decisions.md"],
            Self::Designer => &["design_system.md", "wireframes.md"],
            Self::Backend => &["backend_code"],
            Self::Frontend => &["frontend_code"],
            Self::Qa => &["test_plan.md", "test_results.md"],
            Self::Cto => &["cto_review.md"],
        }
    }
}

/// What a single piece of work is about
struct Brief {
    phase: String,
    project_input: String,
    attempt: u64,
    constraints: Vec<String>,
}

impl Brief {
    fn from_task(task: &Payload) -> Self {
        let constraints = task
            .get("constraints")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(describe_constraint).collect())
            .unwrap_or_default();

        Self {
            phase: task
                .get("phase")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            project_input: task
                .get("project_input")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            attempt: task.get("attempt").and_then(Value::as_u64).unwrap_or(1),
            constraints,
        }
    }
}

fn describe_constraint(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(record) => {
            let field = |key: &str| record.get(key).and_then(Value::as_str).unwrap_or_default();
            let rules: Vec<&str> = record
                .get("constraints")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            let mut line = format!("{}: {} ({})", field("id"), field("title"), field("decision"));
            if !rules.is_empty() {
                let _ = write!(line, " [{}]", rules.join("; "));
            }
            line
        }
        other => other.to_string(),
    }
}

/// A worker producing placeholder documents for its role
pub struct TemplateWorker {
    role: TemplateRole,
    artifacts: Arc<ArtifactStore>,
    decisions: Option<Arc<DecisionLog>>,
    reviews: VecDeque<ReviewDecision>,
    last_review: ReviewDecision,
    proposed: bool,
    deliveries: usize,
}

impl TemplateWorker {
    pub fn new(role: TemplateRole, artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            role,
            artifacts,
            decisions: None,
            reviews: VecDeque::new(),
            last_review: ReviewDecision::Go,
            proposed: false,
            deliveries: 0,
        }
    }

    /// Ledger the architect proposes its decision into
    pub fn with_decision_log(mut self, decisions: Arc<DecisionLog>) -> Self {
        self.decisions = Some(decisions);
        self
    }

    /// Scripted review outcomes, used in order; the last one repeats
    pub fn with_reviews(mut self, reviews: impl IntoIterator<Item = ReviewDecision>) -> Self {
        self.reviews = reviews.into_iter().collect();
        if let Some(last) = self.reviews.back() {
            self.last_review = *last;
        }
        self
    }

    pub fn role(&self) -> TemplateRole {
        self.role
    }

    /// Number of deliverables submitted so far
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    fn next_review(&mut self) -> ReviewDecision {
        match self.reviews.pop_front() {
            Some(decision) => {
                self.last_review = decision;
                decision
            }
            None => self.last_review,
        }
    }

    async fn propose_decision(&mut self, brief: &Brief) -> Result<()> {
        if self.proposed {
            return Ok(());
        }
        let Some(decisions) = &self.decisions else {
            return Ok(());
        };

        let record = decisions
            .propose(
                NewDecision::new("Service layout", "Single backend service behind a REST API")
                    .with_context(format!("Architecture for: {}", brief.project_input))
                    .with_constraint("Every capability is exposed through openapi.yaml")
                    .with_constraint("Frontend talks to the backend only over the REST API")
                    .with_author(self.role.participant())
                    .with_tag("architecture"),
            )
            .await?;

        info!("Architect proposed {}", record.id);
        self.proposed = true;
        Ok(())
    }

    async fn produce(&mut self, brief: &Brief, ctx: &WorkerContext) -> Result<()> {
        let mut extra = Payload::new();
        extra.insert("phase".into(), json!(brief.phase));

        let review = if self.role == TemplateRole::Cto {
            let decision = self.next_review();
            let score = match decision {
                ReviewDecision::Go => 90,
                ReviewDecision::ConditionalGo => 75,
                ReviewDecision::NoGo => 40,
            };
            extra.insert("decision".into(), json!(decision.as_str()));
            extra.insert("score".into(), json!(score));
            Some(decision)
        } else {
            None
        };

        if self.role == TemplateRole::Architect {
            self.propose_decision(brief).await?;
        }

        let outputs = self.role.outputs();
        for name in outputs {
            let content = render(name, self.role, brief, review);
            self.artifacts
                .store(name, &content, self.role.participant())
                .await?;
        }

        let artifacts: Vec<String> = outputs.iter().map(|name| name.to_string()).collect();
        let summary = match review {
            Some(decision) => format!("Review complete: {}", decision),
            None => format!("{} deliverables for {}", self.role.participant(), brief.phase),
        };

        ctx.submit_deliverable(summary, artifacts, extra)?;
        self.deliveries += 1;
        Ok(())
    }
}

fn render(name: &str, role: TemplateRole, brief: &Brief, review: Option<ReviewDecision>) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# {}", name);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "- Author: {}", role.participant());
    let _ = writeln!(doc, "- Phase: {}", brief.phase);
    let _ = writeln!(doc, "- Attempt: {}", brief.attempt);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "## Project");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "{}", brief.project_input);

    if !brief.constraints.is_empty() {
        let _ = writeln!(doc);
        let _ = writeln!(doc, "## Binding decisions");
        let _ = writeln!(doc);
        for constraint in &brief.constraints {
            let _ = writeln!(doc, "- {}", constraint);
        }
    }

    if let Some(decision) = review {
        let _ = writeln!(doc);
        let _ = writeln!(doc, "## Decision");
        let _ = writeln!(doc);
        let _ = writeln!(doc, "{}", decision);
    }

    doc
}

#[async_trait]
impl Worker for TemplateWorker {
    fn name(&self) -> &str {
        self.role.participant()
    }

    async fn execute(&mut self, task: &Payload, ctx: &WorkerContext) -> Result<()> {
        let brief = Brief::from_task(task);
        debug!(
            "{} working on {} (attempt {})",
            self.role.participant(),
            brief.phase,
            brief.attempt
        );
        self.produce(&brief, ctx).await
    }

    async fn on_state_change(&mut self, message: &Message, ctx: &WorkerContext) -> Result<()> {
        if self.role != TemplateRole::Frontend {
            return Ok(());
        }

        let entered = message
            .payload_str("new_state")
            .and_then(|s| s.parse::<Phase>().ok());
        if entered != Some(Phase::Implementation) {
            return Ok(());
        }

        let brief = Brief {
            phase: Phase::Implementation.to_string(),
            project_input: String::new(),
            attempt: 1,
            constraints: Vec::new(),
        };
        self.produce(&brief, ctx).await
    }
}

/// Spawn the full template team on `bus`, returning each worker when cancelled.
///
/// Every member is listening by the time this returns.
pub fn spawn_template_team(
    bus: Arc<MessageBus>,
    artifacts: Arc<ArtifactStore>,
    decisions: Arc<DecisionLog>,
    reviews: Vec<ReviewDecision>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<TemplateWorker>> {
    if reviews.is_empty() {
        warn!("No review script given; the CTO will answer GO");
    }

    TemplateRole::TEAM
        .iter()
        .map(|&role| {
            let mut worker = TemplateWorker::new(role, Arc::clone(&artifacts));
            match role {
                TemplateRole::Architect => {
                    worker = worker.with_decision_log(Arc::clone(&decisions));
                }
                TemplateRole::Cto => {
                    worker = worker.with_reviews(reviews.clone());
                }
                _ => {}
            }

            let listener = bus.listen(role.participant(), cancel.clone());
            let runtime = WorkerRuntime::new(worker, Arc::clone(&bus));
            tokio::spawn(runtime.serve(listener))
        })
        .collect()
}
