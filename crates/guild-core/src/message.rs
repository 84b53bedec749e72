//! Message envelopes exchanged between participants
//!
//! Every message carries one of the closed [`MessageKind`]s and an open JSON
//! payload. The payload keys a kind depends on are checked when the message is
//! built, so a malformed message never reaches the bus.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{GuildError, MessageKind, Phase, Priority, Result, BROADCAST};

/// Open key/value payload of a message
pub type Payload = Map<String, Value>;

/// A message on the Guild bus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    from: String,
    to: String,
    kind: MessageKind,
    payload: Payload,
    blocking: bool,
    priority: Priority,
    correlation_id: Option<String>,
    timestamp: DateTime<Utc>,
    metadata: Payload,
}

impl Message {
    /// Build a message, rejecting payloads that lack the keys `kind` requires
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: MessageKind,
        payload: Payload,
    ) -> Result<Self> {
        let missing: Vec<String> = kind
            .required_keys()
            .iter()
            .filter(|key| !payload.contains_key(**key))
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(GuildError::Construction { kind, missing });
        }

        Ok(Self::unchecked(from, to, kind, payload))
    }

    fn unchecked(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: MessageKind,
        payload: Payload,
    ) -> Self {
        let (blocking, priority) = match kind {
            MessageKind::Clarification => (true, Priority::Medium),
            MessageKind::Error => (false, Priority::High),
            _ => (false, Priority::Medium),
        };

        Self {
            from: from.into(),
            to: to.into(),
            kind,
            payload,
            blocking,
            priority,
            correlation_id: None,
            timestamp: Utc::now(),
            metadata: Payload::new(),
        }
    }

    /// Create a task assignment
    pub fn task(
        from: impl Into<String>,
        to: impl Into<String>,
        description: impl Into<String>,
        extra: Payload,
    ) -> Self {
        let mut payload = extra;
        payload.insert("description".into(), json!(description.into()));
        Self::unchecked(from, to, MessageKind::Task, payload)
    }

    /// Create a deliverable submission
    pub fn deliverable(
        from: impl Into<String>,
        to: impl Into<String>,
        summary: impl Into<String>,
        artifacts: Vec<String>,
        extra: Payload,
    ) -> Self {
        let mut payload = extra;
        payload.insert("summary".into(), json!(summary.into()));
        payload.insert("artifacts".into(), json!(artifacts));
        Self::unchecked(from, to, MessageKind::Deliverable, payload)
    }

    /// Create a clarification request (blocking by default)
    pub fn clarification(
        from: impl Into<String>,
        to: impl Into<String>,
        question: impl Into<String>,
        context: impl Into<String>,
        options: Option<Vec<String>>,
    ) -> Self {
        let mut payload = Payload::new();
        payload.insert("question".into(), json!(question.into()));
        payload.insert("context".into(), json!(context.into()));
        if let Some(options) = options {
            payload.insert("options".into(), json!(options));
        }
        Self::unchecked(from, to, MessageKind::Clarification, payload)
    }

    /// Create a status update
    pub fn status(
        from: impl Into<String>,
        to: impl Into<String>,
        status: impl Into<String>,
        details: Payload,
    ) -> Self {
        let mut payload = details;
        payload.insert("status".into(), json!(status.into()));
        Self::unchecked(from, to, MessageKind::Status, payload)
    }

    /// Create an error notification (high priority by default)
    pub fn error(
        from: impl Into<String>,
        to: impl Into<String>,
        error_type: impl Into<String>,
        message: impl Into<String>,
        context: Value,
    ) -> Self {
        let mut payload = Payload::new();
        payload.insert("error_type".into(), json!(error_type.into()));
        payload.insert("message".into(), json!(message.into()));
        payload.insert("context".into(), context);
        Self::unchecked(from, to, MessageKind::Error, payload)
    }

    /// Create a phase change notice addressed to every listener
    pub fn state_change(from: impl Into<String>, old: Phase, new: Phase, progress: u8) -> Self {
        let mut payload = Payload::new();
        payload.insert("old_state".into(), json!(old));
        payload.insert("new_state".into(), json!(new));
        payload.insert("progress".into(), json!(progress));
        Self::unchecked(from, BROADCAST, MessageKind::StateChange, payload)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn blocking(&self) -> bool {
        self.blocking
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &Payload {
        &self.metadata
    }

    /// Whether the message is addressed to every listener
    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }

    /// Readdress the message to the broadcast target.
    ///
    /// This is the only mutation allowed after construction; the bus calls it
    /// when fanning a message out.
    pub fn retarget_broadcast(&mut self) {
        self.to = BROADCAST.to_string();
    }

    /// String value of a payload key, if present and a string
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Artifact names listed in the payload; non-string entries are skipped
    pub fn artifacts(&self) -> Vec<String> {
        match self.payload.get("artifacts") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }
}
