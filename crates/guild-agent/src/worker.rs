//! Worker trait and runtime loop
//!
//! A [`WorkerRuntime`] listens on its worker's mailbox and dispatches each
//! message to the worker. Handler failures, including panics, are reported to
//! the orchestrator as `execution_error` messages and never end the loop.

use async_trait::async_trait;
use futures::FutureExt;
use guild_bus::{Listener, MessageBus};
use guild_core::{participants, Message, MessageKind, Payload, Result};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Error type reported when a handler fails
pub const EXECUTION_ERROR: &str = "execution_error";

/// A participant that performs phase work
#[async_trait]
pub trait Worker: Send {
    /// Participant name, also the worker's mailbox
    fn name(&self) -> &str;

    /// Handle an assigned task
    async fn execute(&mut self, task: &Payload, ctx: &WorkerContext) -> Result<()>;

    /// Handle a clarification addressed to this worker
    async fn on_clarification(&mut self, _message: &Message, _ctx: &WorkerContext) -> Result<()> {
        Ok(())
    }

    /// Observe a phase change broadcast
    async fn on_state_change(&mut self, _message: &Message, _ctx: &WorkerContext) -> Result<()> {
        Ok(())
    }
}

/// Emitters available to a worker while it handles a message
#[derive(Clone)]
pub struct WorkerContext {
    name: String,
    orchestrator: String,
    bus: Arc<MessageBus>,
    correlation_id: Option<String>,
}

impl WorkerContext {
    pub fn new(name: impl Into<String>, bus: Arc<MessageBus>) -> Self {
        Self {
            name: name.into(),
            orchestrator: participants::ORCHESTRATOR.to_string(),
            bus,
            correlation_id: None,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: impl Into<String>) -> Self {
        self.orchestrator = orchestrator.into();
        self
    }

    /// Tag every emitted message with the task's correlation id
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    fn emit(&self, message: Message) -> Result<()> {
        let message = match &self.correlation_id {
            Some(id) => message.with_correlation_id(id.clone()),
            None => message,
        };
        self.bus.send(message)
    }

    pub fn submit_deliverable(
        &self,
        summary: impl Into<String>,
        artifacts: Vec<String>,
        extra: Payload,
    ) -> Result<()> {
        let summary = summary.into();
        info!("{} submitting deliverable: {}", self.name, summary);
        self.emit(Message::deliverable(
            &self.name,
            &self.orchestrator,
            summary,
            artifacts,
            extra,
        ))
    }

    /// Ask the orchestrator a question. Always blocking.
    pub fn request_clarification(
        &self,
        question: impl Into<String>,
        context: impl Into<String>,
        options: Option<Vec<String>>,
    ) -> Result<()> {
        self.emit(
            Message::clarification(&self.name, &self.orchestrator, question, context, options)
                .with_blocking(true),
        )
    }

    pub fn send_status(&self, status: impl Into<String>, details: Payload) -> Result<()> {
        self.emit(Message::status(
            &self.name,
            &self.orchestrator,
            status,
            details,
        ))
    }

    pub fn send_error(
        &self,
        error_type: impl Into<String>,
        message: impl Into<String>,
        context: Value,
    ) -> Result<()> {
        self.emit(Message::error(
            &self.name,
            &self.orchestrator,
            error_type,
            message,
            context,
        ))
    }
}

/// Drives a [`Worker`] from its mailbox
pub struct WorkerRuntime<W: Worker> {
    worker: W,
    bus: Arc<MessageBus>,
    orchestrator: String,
    current_task: Option<Message>,
}

impl<W: Worker> WorkerRuntime<W> {
    pub fn new(worker: W, bus: Arc<MessageBus>) -> Self {
        Self {
            worker,
            bus,
            orchestrator: participants::ORCHESTRATOR.to_string(),
            current_task: None,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: impl Into<String>) -> Self {
        self.orchestrator = orchestrator.into();
        self
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }

    /// Most recent task received
    pub fn current_task(&self) -> Option<&Message> {
        self.current_task.as_ref()
    }

    /// Process messages until `cancel` fires, then hand the worker back
    pub async fn run(self, cancel: CancellationToken) -> W {
        let listener = self.bus.listen(self.worker.name(), cancel);
        self.serve(listener).await
    }

    /// Like [`run`](Self::run), on a listener the caller registered already
    pub async fn serve(mut self, mut listener: Listener) -> W {
        let name = self.worker.name().to_string();
        info!("Worker {} started", name);

        while let Some(message) = listener.next().await {
            self.dispatch(message).await;
        }

        info!("Worker {} stopped", name);
        self.worker
    }

    fn context(&self, correlation_id: Option<&str>) -> WorkerContext {
        WorkerContext::new(self.worker.name(), Arc::clone(&self.bus))
            .with_orchestrator(&self.orchestrator)
            .with_correlation_id(correlation_id.map(str::to_string))
    }

    /// Handle one message, converting any failure into an error report
    #[instrument(skip_all, fields(worker = %self.worker.name(), kind = %message.kind()))]
    pub async fn dispatch(&mut self, message: Message) {
        let ctx = self.context(message.correlation_id());

        let outcome = match message.kind() {
            MessageKind::Task => {
                debug!(
                    "Task received: {}",
                    message.payload_str("description").unwrap_or_default()
                );
                self.current_task = Some(message.clone());
                AssertUnwindSafe(self.worker.execute(message.payload(), &ctx))
                    .catch_unwind()
                    .await
            }
            MessageKind::Clarification => {
                AssertUnwindSafe(self.worker.on_clarification(&message, &ctx))
                    .catch_unwind()
                    .await
            }
            MessageKind::StateChange => {
                // Broadcasts carry no task correlation
                let ctx = self.context(None);
                AssertUnwindSafe(self.worker.on_state_change(&message, &ctx))
                    .catch_unwind()
                    .await
            }
            MessageKind::Deliverable | MessageKind::Status | MessageKind::Error => {
                debug!("Ignoring {} message from {}", message.kind(), message.from());
                Ok(Ok(()))
            }
        };

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };

        error!("Worker {} failed handling {}: {}", ctx.name(), message.kind(), failure);

        let context = json!({
            "message_kind": message.kind(),
            "phase": message.payload().get("phase").cloned().unwrap_or(Value::Null),
        });
        if let Err(e) = ctx.send_error(EXECUTION_ERROR, failure, context) {
            error!("Could not report failure of {}: {}", ctx.name(), e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
