//! Workflow orchestrator
//!
//! Consumes the orchestrator mailbox one message at a time, gates phase
//! completion on required deliverables, and assigns each new phase to its
//! owner. All workflow state lives here and is only touched by the loop.

use chrono::{DateTime, Utc};
use guild_bus::MessageBus;
use guild_core::config::RunConfig;
use guild_core::fail_open::fail_open;
use guild_core::{
    participants, GuildError, Message, MessageKind, Payload, Phase, Priority, Result,
    ReviewDecision,
};
use guild_memory::{DecisionStatus, DeliverableRegistry, GovernanceLedger};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::state_machine::{phase_description, PhaseMachine};

/// Configuration for an orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Participant name, also the orchestrator's mailbox
    pub name: String,
    /// Return from [`Orchestrator::run`] once a terminal phase is reached
    pub stop_on_terminal: bool,
}

impl OrchestratorConfig {
    pub fn from_run(run: &RunConfig) -> Self {
        Self {
            stop_on_terminal: run.stop_on_terminal,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stop_on_terminal(mut self, stop: bool) -> Self {
        self.stop_on_terminal = stop;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: participants::ORCHESTRATOR.to_string(),
            stop_on_terminal: true,
        }
    }
}

/// Outcome of checking a phase's required deliverables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Complete,
    Incomplete { missing: Vec<String> },
}

impl Validation {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Something a worker raised that needs attention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Blocker {
    Clarification {
        from: String,
        question: String,
        context: String,
        blocking: bool,
        phase: Phase,
        raised_at: DateTime<Utc>,
    },
    Error {
        from: String,
        error_type: String,
        message: String,
        phase: Phase,
        raised_at: DateTime<Utc>,
    },
}

impl Blocker {
    pub fn from(&self) -> &str {
        match self {
            Self::Clarification { from, .. } | Self::Error { from, .. } => from,
        }
    }
}

/// Point-in-time view of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub progress: u8,
    pub responsible: String,
    /// Artifact names received over the whole run, rework included
    pub deliverables_received: usize,
    pub blocker_count: usize,
    pub blockers: Vec<Blocker>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_secs: u64,
    pub history: Vec<Phase>,
    pub running: bool,
    pub complete: bool,
}

/// Drives one project through its phases
pub struct Orchestrator {
    config: OrchestratorConfig,
    bus: Arc<MessageBus>,
    ledger: Arc<dyn GovernanceLedger>,
    registry: Arc<dyn DeliverableRegistry>,
    machine: PhaseMachine,
    project_input: Option<String>,
    started_at: Option<DateTime<Utc>>,
    /// Artifact names received in each phase since it was last entered
    received: HashMap<Phase, Vec<String>>,
    deliverables_total: usize,
    /// Times each phase has been entered
    entries: HashMap<Phase, u32>,
    blockers: Vec<Blocker>,
    /// Correlation id of the outstanding task
    active_task: Option<String>,
    running: bool,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl Orchestrator {
    pub fn new(
        bus: Arc<MessageBus>,
        ledger: Arc<dyn GovernanceLedger>,
        registry: Arc<dyn DeliverableRegistry>,
    ) -> Self {
        Self::with_config(OrchestratorConfig::default(), bus, ledger, registry)
    }

    pub fn with_config(
        config: OrchestratorConfig,
        bus: Arc<MessageBus>,
        ledger: Arc<dyn GovernanceLedger>,
        registry: Arc<dyn DeliverableRegistry>,
    ) -> Self {
        let orchestrator = Self {
            config,
            bus,
            ledger,
            registry,
            machine: PhaseMachine::new(),
            project_input: None,
            started_at: None,
            received: HashMap::new(),
            deliverables_total: 0,
            entries: HashMap::new(),
            blockers: Vec::new(),
            active_task: None,
            running: false,
            status_tx: watch::channel(idle_snapshot()).0,
        };
        orchestrator.publish();
        orchestrator
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn phase(&self) -> Phase {
        self.machine.current()
    }

    pub fn history(&self) -> &[Phase] {
        self.machine.history()
    }

    pub fn blockers(&self) -> &[Blocker] {
        &self.blockers
    }

    pub fn project_input(&self) -> Option<&str> {
        self.project_input.as_deref()
    }

    /// Artifact names received in `phase` since it was last entered
    pub fn received(&self, phase: Phase) -> &[String] {
        self.received.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the project reached a terminal phase
    pub fn is_complete(&self) -> bool {
        self.project_input.is_some() && self.machine.is_terminal()
    }

    /// Watch every status change
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> StatusSnapshot {
        let elapsed_secs = self
            .started_at
            .map(|started| (Utc::now() - started).num_seconds().max(0) as u64)
            .unwrap_or(0);

        StatusSnapshot {
            phase: self.machine.current(),
            progress: self.machine.progress_percentage(),
            responsible: self.machine.responsible_participant().to_string(),
            deliverables_received: self.deliverables_total,
            blocker_count: self.blockers.len(),
            blockers: self.blockers.clone(),
            started_at: self.started_at,
            elapsed_secs,
            history: self.machine.history().to_vec(),
            running: self.running,
            complete: self.is_complete(),
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }

    /// Begin a project: reset, enter Analysis and assign it
    #[instrument(skip_all)]
    pub async fn start_project(&mut self, input: impl Into<String>) -> Result<()> {
        let input = input.into();

        self.machine.reset();
        self.received.clear();
        self.entries.clear();
        self.blockers.clear();
        self.deliverables_total = 0;
        self.active_task = None;
        self.project_input = Some(input.clone());
        self.started_at = Some(Utc::now());

        info!("Starting project: {}", input);
        self.enter_phase(Phase::Analysis).await
    }

    /// Consume the orchestrator mailbox until `cancel` fires, or until the
    /// project finishes when configured to stop on terminal phases.
    pub async fn run(&mut self, cancel: CancellationToken) -> StatusSnapshot {
        let mut listener = self.bus.listen(&self.config.name, cancel);
        self.running = true;
        self.publish();
        info!("Orchestrator {} running", self.config.name);

        loop {
            if self.config.stop_on_terminal && self.is_complete() {
                info!("Workflow reached {}", self.machine.current());
                break;
            }

            let Some(message) = listener.next().await else {
                info!("Orchestrator {} cancelled", self.config.name);
                break;
            };

            if let Err(e) = self.handle_message(message).await {
                error!("Failed to handle message: {}", e);
            }
        }

        self.running = false;
        self.publish();
        self.status()
    }

    /// Process a single message
    #[instrument(skip_all, fields(kind = %message.kind(), from = message.from()))]
    pub async fn handle_message(&mut self, message: Message) -> Result<()> {
        let result = match message.kind() {
            MessageKind::Deliverable => self.on_deliverable(&message).await,
            MessageKind::Clarification => {
                self.on_clarification(&message);
                Ok(())
            }
            MessageKind::Error => {
                self.on_error(&message);
                Ok(())
            }
            MessageKind::Status => {
                info!(
                    "Status from {}: {}",
                    message.from(),
                    message.payload_str("status").unwrap_or_default()
                );
                Ok(())
            }
            MessageKind::Task | MessageKind::StateChange => {
                debug!("Ignoring {} message from {}", message.kind(), message.from());
                Ok(())
            }
        };

        self.publish();
        result
    }

    async fn on_deliverable(&mut self, message: &Message) -> Result<()> {
        if self.project_input.is_none() || self.machine.is_terminal() {
            warn!(
                "Deliverable from {} ignored: no project in progress",
                message.from()
            );
            return Ok(());
        }

        if let (Some(reply_to), Some(active)) = (message.correlation_id(), &self.active_task) {
            if reply_to != active.as_str() {
                warn!(
                    "Deliverable from {} answers an earlier task; ignored",
                    message.from()
                );
                return Ok(());
            }
        }

        let phase = self.machine.current();
        if let Some(target) = message.payload_str("phase") {
            if target.parse::<Phase>().ok() != Some(phase) {
                warn!(
                    "Deliverable from {} is for {}, not {}; ignored",
                    message.from(),
                    target,
                    phase
                );
                return Ok(());
            }
        }

        let artifacts = message.artifacts();
        self.deliverables_total += artifacts.len();

        let bucket = self.received.entry(phase).or_default();
        for name in artifacts {
            if !bucket.contains(&name) {
                bucket.push(name);
            }
        }

        info!(
            "Deliverable from {} in {}: {}",
            message.from(),
            phase,
            message.payload_str("summary").unwrap_or_default()
        );

        match self.validate().await {
            Validation::Complete => self.complete_phase(phase, message).await,
            Validation::Incomplete { missing } => {
                info!("Phase {} still missing: {}", phase, missing.join(", "));
                Ok(())
            }
        }
    }

    /// Check the current phase's requirements against what was received in
    /// it and what the registry already holds
    pub async fn validate(&self) -> Validation {
        let phase = self.machine.current();
        let received = self.received(phase);
        let mut missing = Vec::new();

        for name in self.machine.required_deliverables() {
            if received.iter().any(|r| r.as_str() == *name) {
                continue;
            }
            if self.registry.exists(name).await {
                continue;
            }
            missing.push(name.to_string());
        }

        if missing.is_empty() {
            Validation::Complete
        } else {
            Validation::Incomplete { missing }
        }
    }

    async fn complete_phase(&mut self, phase: Phase, message: &Message) -> Result<()> {
        info!("Phase {} complete", phase);

        match phase {
            Phase::Architecture => {
                self.ratify_proposed_decisions().await;
                self.advance().await
            }
            Phase::Review => {
                let decision = message
                    .payload_str("decision")
                    .and_then(|d| d.parse::<ReviewDecision>().ok());

                match decision {
                    Some(decision) if decision.allows_delivery() => {
                        info!("Review decision {}", decision);
                        self.advance().await
                    }
                    other => {
                        let score = message.payload().get("score").cloned();
                        warn!(
                            "Review decision {:?} (score {:?}); returning to implementation",
                            other.map(|d| d.as_str()),
                            score
                        );
                        self.enter_phase(Phase::Implementation).await
                    }
                }
            }
            _ => self.advance().await,
        }
    }

    async fn advance(&mut self) -> Result<()> {
        match self.machine.next_happy_path_phase() {
            Some(next) => self.enter_phase(next).await,
            None => {
                info!("Workflow complete");
                Ok(())
            }
        }
    }

    async fn enter_phase(&mut self, target: Phase) -> Result<()> {
        let previous = self.machine.current();
        self.machine.transition_to(target)?;

        self.received.remove(&target);
        *self.entries.entry(target).or_default() += 1;
        self.active_task = None;

        info!("Phase transition: {} -> {}", previous, target);

        self.bus.broadcast(Message::state_change(
            &self.config.name,
            previous,
            target,
            self.machine.progress_percentage(),
        ));

        let outcome = if self.machine.is_terminal() {
            info!("Project reached terminal phase {}", target);
            Ok(())
        } else {
            self.assign_task(target).await
        };

        self.publish();
        outcome
    }

    async fn assign_task(&mut self, phase: Phase) -> Result<()> {
        let assignee = self.machine.responsible_participant();
        let attempt = self.entries.get(&phase).copied().unwrap_or(1);
        let correlation_id = uuid::Uuid::new_v4().to_string();

        let ledger = Arc::clone(&self.ledger);
        let accepted = fail_open("list_accepted_decisions", || async move {
            ledger.list_accepted().await
        })
        .await
        .unwrap_or_default();

        let constraints: Vec<Value> = accepted
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "title": record.title,
                    "decision": record.decision,
                    "constraints": record.constraints,
                })
            })
            .collect();

        let mut payload = Payload::new();
        payload.insert("phase".into(), json!(phase));
        payload.insert(
            "project_input".into(),
            json!(self.project_input.clone().unwrap_or_default()),
        );
        payload.insert("constraints".into(), Value::Array(constraints));
        payload.insert("attempt".into(), json!(attempt));

        let task = Message::task(
            &self.config.name,
            assignee,
            phase_description(phase),
            payload,
        )
        .with_correlation_id(correlation_id.clone());
        // Rework goes to the front of the owner's attention
        let task = if attempt > 1 {
            task.with_priority(Priority::High)
        } else {
            task
        };

        match self.bus.send(task) {
            Ok(()) => {
                info!("Assigned {} to {} (attempt {})", phase, assignee, attempt);
                self.active_task = Some(correlation_id);
                Ok(())
            }
            Err(e) => {
                self.blockers.push(Blocker::Error {
                    from: self.config.name.clone(),
                    error_type: "assignment_failed".to_string(),
                    message: e.to_string(),
                    phase,
                    raised_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn ratify_proposed_decisions(&self) {
        let ledger = Arc::clone(&self.ledger);
        let accepted = fail_open("ratify_decisions", || async move {
            let mut accepted = Vec::new();
            for record in ledger.list_by_status(DecisionStatus::Proposed).await? {
                if ledger.accept(&record.id).await? {
                    accepted.push(record.id);
                }
            }
            Ok::<_, GuildError>(accepted)
        })
        .await;

        if let Some(ids) = accepted {
            if !ids.is_empty() {
                info!("Accepted decisions: {}", ids.join(", "));
            }
        }
    }

    fn on_clarification(&mut self, message: &Message) {
        let question = message.payload_str("question").unwrap_or_default();
        info!("Clarification from {}: {}", message.from(), question);

        self.blockers.push(Blocker::Clarification {
            from: message.from().to_string(),
            question: question.to_string(),
            context: message.payload_str("context").unwrap_or_default().to_string(),
            blocking: message.blocking(),
            phase: self.machine.current(),
            raised_at: message.timestamp(),
        });
    }

    fn on_error(&mut self, message: &Message) {
        let error_type = message.payload_str("error_type").unwrap_or_default();
        let text = message.payload_str("message").unwrap_or_default();
        error!("Error from {} ({}): {}", message.from(), error_type, text);

        self.blockers.push(Blocker::Error {
            from: message.from().to_string(),
            error_type: error_type.to_string(),
            message: text.to_string(),
            phase: self.machine.current(),
            raised_at: message.timestamp(),
        });
    }
}

fn idle_snapshot() -> StatusSnapshot {
    StatusSnapshot {
        phase: Phase::Idea,
        progress: 0,
        responsible: participants::ORCHESTRATOR.to_string(),
        deliverables_received: 0,
        blocker_count: 0,
        blockers: Vec::new(),
        started_at: None,
        elapsed_secs: 0,
        history: vec![Phase::Idea],
        running: false,
        complete: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_memory::{ArtifactStore, DecisionLog, NewDecision};

    struct Fixture {
        bus: Arc<MessageBus>,
        store: Arc<ArtifactStore>,
        log: Arc<DecisionLog>,
        orchestrator: Orchestrator,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(MessageBus::new());
        let store = Arc::new(ArtifactStore::in_memory());
        let log = Arc::new(DecisionLog::in_memory());
        let orchestrator = Orchestrator::new(
            Arc::clone(&bus),
            Arc::clone(&log) as Arc<dyn GovernanceLedger>,
            Arc::clone(&store) as Arc<dyn DeliverableRegistry>,
        );
        Fixture {
            bus,
            store,
            log,
            orchestrator,
        }
    }

    fn deliverable(from: &str, artifacts: &[&str]) -> Message {
        Message::deliverable(
            from,
            "orchestrator",
            "work",
            artifacts.iter().map(|a| a.to_string()).collect(),
            Payload::new(),
        )
    }

    #[tokio::test]
    async fn test_blocker_keeps_message_time() {
        let mut f = fixture();
        f.orchestrator.start_project("A todo app").await.unwrap();

        let question = Message::clarification("analyst", "orchestrator", "Which DB?", "ctx", None);
        let sent_at = question.timestamp();
        f.orchestrator.handle_message(question).await.unwrap();

        match &f.orchestrator.blockers()[0] {
            Blocker::Clarification { raised_at, phase, .. } => {
                assert_eq!(*raised_at, sent_at);
                assert_eq!(*phase, Phase::Analysis);
            }
            other => panic!("unexpected blocker {:?}", other),
        }

        let json = serde_json::to_value(f.orchestrator.status()).unwrap();
        assert_eq!(json["blockers"][0]["type"], "clarification");
    }

    #[tokio::test]
    async fn test_initial_status() {
        let f = fixture();
        let status = f.orchestrator.status();
        assert_eq!(status.phase, Phase::Idea);
        assert_eq!(status.responsible, "orchestrator");
        assert!(!status.complete);
        assert_eq!(*f.orchestrator.subscribe().borrow(), status);
    }

    #[tokio::test]
    async fn test_deliverable_before_start_is_ignored() {
        let mut f = fixture();
        f.orchestrator
            .handle_message(deliverable("analyst", &["functional_spec.md"]))
            .await
            .unwrap();

        assert_eq!(f.orchestrator.phase(), Phase::Idea);
        assert_eq!(f.orchestrator.status().deliverables_received, 0);
    }

    #[tokio::test]
    async fn test_partial_deliverables_accumulate() {
        let mut f = fixture();
        f.orchestrator.start_project("A todo app").await.unwrap();

        f.orchestrator
            .handle_message(deliverable("analyst", &["functional_spec.md"]))
            .await
            .unwrap();
        assert_eq!(f.orchestrator.phase(), Phase::Analysis);
        assert_eq!(
            f.orchestrator.validate().await,
            Validation::Incomplete {
                missing: vec!["user_stories.yaml".to_string()]
            }
        );

        f.orchestrator
            .handle_message(deliverable("analyst", &["user_stories.yaml"]))
            .await
            .unwrap();
        assert_eq!(f.orchestrator.phase(), Phase::Architecture);
        assert_eq!(
            f.orchestrator.history(),
            &[Phase::Idea, Phase::Analysis, Phase::Architecture]
        );
    }

    #[tokio::test]
    async fn test_registry_satisfies_requirements() {
        let mut f = fixture();
        f.store.store("user_stories.yaml", "stories", "analyst").await.unwrap();
        f.orchestrator.start_project("A todo app").await.unwrap();

        f.orchestrator
            .handle_message(deliverable("analyst", &["functional_spec.md"]))
            .await
            .unwrap();
        assert_eq!(f.orchestrator.phase(), Phase::Architecture);
    }

    #[tokio::test]
    async fn test_architecture_completion_accepts_proposals() {
        let mut f = fixture();
        for name in ["functional_spec.md", "user_stories.yaml"] {
            f.store.store(name, "x", "analyst").await.unwrap();
        }
        f.log
            .propose(NewDecision::new("Database", "PostgreSQL").with_constraint("Use SQL"))
            .await
            .unwrap();

        f.orchestrator.start_project("A todo app").await.unwrap();
        f.orchestrator
            .handle_message(deliverable("analyst", &[]))
            .await
            .unwrap();
        assert_eq!(f.orchestrator.phase(), Phase::Architecture);

        f.orchestrator
            .handle_message(deliverable(
                "architect",
                &["architecture.md", "openapi.yaml", "decisions.md"],
            ))
            .await
            .unwrap();

        assert_eq!(f.orchestrator.phase(), Phase::Design);
        assert_eq!(f.log.list_accepted().await.unwrap().len(), 1);

        // The design task carries the accepted decision
        let mut design_task = None;
        while f.bus.queue_size("designer") > 0 {
            design_task = Some(f.bus.receive("designer").await.unwrap());
        }
        let task = design_task.unwrap();
        assert_eq!(task.payload()["constraints"][0]["id"], json!("ADR-001"));
        assert_eq!(task.payload()["constraints"][0]["constraints"], json!(["Use SQL"]));
    }

    #[tokio::test]
    async fn test_stale_correlation_is_ignored() {
        let mut f = fixture();
        f.orchestrator.start_project("A todo app").await.unwrap();

        let stale = deliverable("analyst", &["functional_spec.md", "user_stories.yaml"])
            .with_correlation_id("not-the-current-task");
        f.orchestrator.handle_message(stale).await.unwrap();
        assert_eq!(f.orchestrator.phase(), Phase::Analysis);

        let task = f.bus.receive("analyst").await.unwrap();
        let current = deliverable("analyst", &["functional_spec.md", "user_stories.yaml"])
            .with_correlation_id(task.correlation_id().unwrap());
        f.orchestrator.handle_message(current).await.unwrap();
        assert_eq!(f.orchestrator.phase(), Phase::Architecture);
    }

    #[tokio::test]
    async fn test_status_and_stray_kinds_do_not_move_phase() {
        let mut f = fixture();
        f.orchestrator.start_project("A todo app").await.unwrap();

        f.orchestrator
            .handle_message(Message::status("analyst", "orchestrator", "busy", Payload::new()))
            .await
            .unwrap();
        f.orchestrator
            .handle_message(Message::task("analyst", "orchestrator", "?", Payload::new()))
            .await
            .unwrap();

        assert_eq!(f.orchestrator.phase(), Phase::Analysis);
        assert!(f.orchestrator.blockers().is_empty());
    }

    #[tokio::test]
    async fn test_start_project_resets_tracking() {
        let mut f = fixture();
        f.orchestrator.start_project("first").await.unwrap();
        f.orchestrator
            .handle_message(Message::error(
                "analyst",
                "orchestrator",
                "execution_error",
                "boom",
                Value::Null,
            ))
            .await
            .unwrap();
        assert_eq!(f.orchestrator.blockers().len(), 1);

        f.orchestrator.start_project("second").await.unwrap();
        assert!(f.orchestrator.blockers().is_empty());
        assert_eq!(f.orchestrator.project_input(), Some("second"));
        assert_eq!(f.orchestrator.history(), &[Phase::Idea, Phase::Analysis]);
    }

    #[tokio::test]
    async fn test_custom_name_signs_tasks() {
        let bus = Arc::new(MessageBus::new());
        let config = OrchestratorConfig::default()
            .with_name("lead")
            .with_stop_on_terminal(false);
        let mut orchestrator = Orchestrator::with_config(
            config,
            Arc::clone(&bus),
            Arc::new(DecisionLog::in_memory()),
            Arc::new(ArtifactStore::in_memory()),
        );

        orchestrator.start_project("A todo app").await.unwrap();
        assert_eq!(orchestrator.name(), "lead");

        let task = bus.receive("analyst").await.unwrap();
        assert_eq!(task.from(), "lead");
        assert!(!orchestrator.validate().await.is_complete());
    }

    #[tokio::test]
    async fn test_full_mailbox_records_assignment_blocker() {
        let bus = Arc::new(MessageBus::with_capacity(1, 10));
        let mut orchestrator = Orchestrator::new(
            Arc::clone(&bus),
            Arc::new(DecisionLog::in_memory()),
            Arc::new(ArtifactStore::in_memory()),
        );
        bus.send(Message::status("someone", "analyst", "filler", Payload::new()))
            .unwrap();

        let err = orchestrator.start_project("A todo app").await.unwrap_err();
        assert!(matches!(err, guild_core::GuildError::MailboxFull { .. }));
        assert_eq!(orchestrator.phase(), Phase::Analysis);
        assert_eq!(orchestrator.blockers()[0].from(), "orchestrator");
        assert!(matches!(
            orchestrator.blockers()[0],
            Blocker::Error { ref error_type, .. } if error_type == "assignment_failed"
        ));
    }
}
