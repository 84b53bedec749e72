//! Mailbox bus for orchestrator and workers
//!
//! Each participant owns one bounded FIFO mailbox. Direct sends fail fast when
//! the target mailbox is full; broadcasts fan an independent copy out to every
//! listening participant except the sender and skip full mailboxes.

use guild_core::{GuildError, Message, MessageKind, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default maximum number of queued messages per mailbox
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// Default number of messages kept in the history ring
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

struct Mailbox {
    sender: mpsc::Sender<Message>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Message>>,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    /// Dequeue the next message. Cancel-safe: dropping the future before it
    /// resolves leaves the mailbox untouched.
    async fn recv(&self) -> Option<Message> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }
}

/// Listening participants, counted so overlapping listeners deregister cleanly
type Subscribers = Arc<RwLock<BTreeMap<String, usize>>>;

#[derive(Default)]
struct Counters {
    total_messages: u64,
    by_kind: HashMap<MessageKind, u64>,
    by_sender: HashMap<String, u64>,
}

/// Snapshot of bus activity
#[derive(Debug, Clone, Serialize)]
pub struct BusStats {
    /// Messages enqueued into mailboxes (a broadcast counts once per recipient)
    pub total_messages: u64,
    /// Accepted sends and broadcasts by kind
    pub messages_by_kind: HashMap<MessageKind, u64>,
    /// Accepted sends and broadcasts by sender
    pub messages_by_sender: HashMap<String, u64>,
    /// Number of mailboxes created so far
    pub active_mailboxes: usize,
    /// Participants currently listening for broadcasts
    pub subscribers: Vec<String>,
    /// Queued message count per mailbox
    pub queue_sizes: BTreeMap<String, usize>,
}

/// Result of a broadcast fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that received a copy
    pub delivered: Vec<String>,
    /// Subscribers skipped because their mailbox was full
    pub skipped: Vec<String>,
}

/// Filter for [`MessageBus::history`]
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Keep only the most recent `limit` matches
    pub limit: Option<usize>,
    pub kind: Option<MessageKind>,
    pub sender: Option<String>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

/// In-process message bus shared by every participant
pub struct MessageBus {
    mailbox_capacity: usize,
    history_capacity: usize,
    mailboxes: RwLock<HashMap<String, Arc<Mailbox>>>,
    subscribers: Subscribers,
    counters: Mutex<Counters>,
    history: Mutex<VecDeque<Message>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY, DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a bus with custom mailbox and history limits.
    ///
    /// A mailbox capacity of zero is raised to one.
    pub fn with_capacity(mailbox_capacity: usize, history_capacity: usize) -> Self {
        let mailbox_capacity = mailbox_capacity.max(1);
        info!(
            mailbox_capacity,
            history_capacity, "Message bus initialized"
        );

        Self {
            mailbox_capacity,
            history_capacity,
            mailboxes: RwLock::new(HashMap::new()),
            subscribers: Arc::new(RwLock::new(BTreeMap::new())),
            counters: Mutex::new(Counters::default()),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
        }
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    /// Get or create the mailbox for a participant
    fn mailbox(&self, participant: &str) -> Arc<Mailbox> {
        if let Some(mailbox) = self.mailboxes.read().get(participant) {
            return Arc::clone(mailbox);
        }

        let mut mailboxes = self.mailboxes.write();
        let mailbox = mailboxes.entry(participant.to_string()).or_insert_with(|| {
            debug!("Created mailbox for participant: {}", participant);
            Arc::new(Mailbox::new(self.mailbox_capacity))
        });
        Arc::clone(mailbox)
    }

    /// Deliver a message to its target mailbox.
    ///
    /// Messages addressed to the broadcast target are fanned out instead.
    /// Returns [`GuildError::MailboxFull`] when the target mailbox is at
    /// capacity; the message is dropped and the mailbox left as it was.
    pub fn send(&self, message: Message) -> Result<()> {
        if message.is_broadcast() {
            self.broadcast(message);
            return Ok(());
        }

        let mailbox = self.mailbox(message.to());
        let record = message.clone();

        match mailbox.sender.try_send(message) {
            Ok(()) => {
                debug!(
                    from = record.from(),
                    to = record.to(),
                    kind = %record.kind(),
                    blocking = record.blocking(),
                    "Message sent"
                );
                self.record(record, 1);
                Ok(())
            }
            Err(TrySendError::Full(dropped)) => {
                error!(
                    "Mailbox full for {}. Message from {} dropped.",
                    dropped.to(),
                    dropped.from()
                );
                Err(GuildError::MailboxFull {
                    participant: dropped.to().to_string(),
                    from: dropped.from().to_string(),
                    capacity: self.mailbox_capacity,
                })
            }
            Err(TrySendError::Closed(dropped)) => Err(GuildError::Other(format!(
                "Mailbox for {} is closed",
                dropped.to()
            ))),
        }
    }

    /// Fan a message out to every listening participant except its sender.
    ///
    /// Full mailboxes are skipped with a warning; delivery to the remaining
    /// subscribers is unaffected.
    pub fn broadcast(&self, mut message: Message) -> BroadcastReport {
        message.retarget_broadcast();

        let subscribers: Vec<String> = self.subscribers.read().keys().cloned().collect();
        let mut report = BroadcastReport::default();

        for subscriber in subscribers {
            if subscriber == message.from() {
                continue;
            }

            match self.mailbox(&subscriber).sender.try_send(message.clone()) {
                Ok(()) => report.delivered.push(subscriber),
                Err(_) => {
                    warn!("Could not broadcast to {}: mailbox full", subscriber);
                    report.skipped.push(subscriber);
                }
            }
        }

        debug!(
            from = message.from(),
            kind = %message.kind(),
            delivered = report.delivered.len(),
            skipped = report.skipped.len(),
            "Broadcast complete"
        );

        if !report.delivered.is_empty() {
            self.record(message, report.delivered.len() as u64);
        }
        report
    }

    fn record(&self, message: Message, deliveries: u64) {
        {
            let mut counters = self.counters.lock();
            counters.total_messages += deliveries;
            *counters.by_kind.entry(message.kind()).or_default() += 1;
            *counters
                .by_sender
                .entry(message.from().to_string())
                .or_default() += 1;
        }

        if self.history_capacity == 0 {
            return;
        }

        let mut history = self.history.lock();
        if history.len() == self.history_capacity {
            history.pop_front();
        }
        history.push_back(message);
    }

    /// Wait for the next message in a participant's mailbox (FIFO)
    pub async fn receive(&self, participant: &str) -> Result<Message> {
        let mailbox = self.mailbox(participant);
        let message = mailbox
            .recv()
            .await
            .ok_or_else(|| GuildError::Other(format!("Mailbox for {} is closed", participant)))?;

        debug!(
            "Message received by {}: from={}, kind={}",
            participant,
            message.from(),
            message.kind()
        );
        Ok(message)
    }

    /// Start listening on a participant's mailbox.
    ///
    /// The participant receives broadcasts until the returned [`Listener`] is
    /// dropped. Cancelling `cancel` ends the sequence without consuming a
    /// pending message.
    pub fn listen(&self, participant: &str, cancel: CancellationToken) -> Listener {
        *self
            .subscribers
            .write()
            .entry(participant.to_string())
            .or_default() += 1;

        info!("Participant {} started listening for messages", participant);

        Listener {
            participant: participant.to_string(),
            mailbox: self.mailbox(participant),
            subscribers: Arc::clone(&self.subscribers),
            cancel,
            subscribed: true,
        }
    }

    /// Number of messages waiting in a participant's mailbox
    pub fn queue_size(&self, participant: &str) -> usize {
        self.mailboxes
            .read()
            .get(participant)
            .map(|mailbox| self.mailbox_capacity - mailbox.sender.capacity())
            .unwrap_or(0)
    }

    /// Whether a participant is currently listening
    pub fn is_subscribed(&self, participant: &str) -> bool {
        self.subscribers.read().contains_key(participant)
    }

    /// Recent delivered messages, oldest first
    pub fn history(&self, filter: &HistoryFilter) -> Vec<Message> {
        let history = self.history.lock();
        let mut matches: Vec<Message> = history
            .iter()
            .filter(|m| filter.kind.map_or(true, |kind| m.kind() == kind))
            .filter(|m| filter.sender.as_deref().map_or(true, |s| m.from() == s))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            let excess = matches.len().saturating_sub(limit);
            matches.drain(..excess);
        }
        matches
    }

    pub fn stats(&self) -> BusStats {
        let counters = self.counters.lock();
        let mailboxes = self.mailboxes.read();

        BusStats {
            total_messages: counters.total_messages,
            messages_by_kind: counters.by_kind.clone(),
            messages_by_sender: counters.by_sender.clone(),
            active_mailboxes: mailboxes.len(),
            subscribers: self.subscribers.read().keys().cloned().collect(),
            queue_sizes: mailboxes
                .iter()
                .map(|(name, mailbox)| {
                    (
                        name.clone(),
                        self.mailbox_capacity - mailbox.sender.capacity(),
                    )
                })
                .collect(),
        }
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
        info!("Message history cleared");
    }

    pub fn reset_stats(&self) {
        *self.counters.lock() = Counters::default();
        info!("Statistics reset");
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancelable sequence of messages for one participant
///
/// Holding a listener registers the participant as a broadcast subscriber.
pub struct Listener {
    participant: String,
    mailbox: Arc<Mailbox>,
    subscribers: Subscribers,
    cancel: CancellationToken,
    subscribed: bool,
}

impl Listener {
    /// Wait for the next message, or `None` once cancelled.
    ///
    /// Cancellation takes priority over a pending message, which then stays
    /// queued for the next reader. A cancelled listener stops receiving
    /// broadcasts straight away.
    pub async fn next(&mut self) -> Option<Message> {
        let message = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            message = self.mailbox.recv() => message,
        };

        if message.is_none() {
            self.unsubscribe();
        }
        message
    }

    fn unsubscribe(&mut self) {
        if !std::mem::take(&mut self.subscribed) {
            return;
        }

        let mut subscribers = self.subscribers.write();
        if let Some(count) = subscribers.get_mut(&self.participant) {
            *count -= 1;
            if *count == 0 {
                subscribers.remove(&self.participant);
            }
        }
        info!("Participant {} stopped listening", self.participant);
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_core::{participants, Payload, Phase, BROADCAST};
    use std::time::Duration;

    fn status(from: &str, to: &str, n: usize) -> Message {
        let mut details = Payload::new();
        details.insert("n".into(), serde_json::json!(n));
        Message::status(from, to, format!("update {}", n), details)
    }

    fn seq(message: &Message) -> u64 {
        message.payload()["n"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_fifo_per_mailbox() {
        let bus = MessageBus::new();
        for n in 0..10 {
            bus.send(status("analyst", "orchestrator", n)).unwrap();
        }

        for n in 0..10 {
            let msg = bus.receive("orchestrator").await.unwrap();
            assert_eq!(seq(&msg), n as u64);
        }
    }

    #[tokio::test]
    async fn test_fifo_unaffected_by_other_mailboxes() {
        let bus = MessageBus::new();
        for n in 0..20 {
            bus.send(status("analyst", "orchestrator", n)).unwrap();
            bus.send(status("analyst", "qa", 100 + n)).unwrap();
        }

        for n in 0..20 {
            assert_eq!(seq(&bus.receive("qa").await.unwrap()), 100 + n as u64);
        }
        for n in 0..20 {
            assert_eq!(seq(&bus.receive("orchestrator").await.unwrap()), n as u64);
        }
    }

    #[tokio::test]
    async fn test_concurrent_senders_keep_per_sender_order() {
        let bus = Arc::new(MessageBus::new());
        let mut handles = Vec::new();

        for sender in ["analyst", "architect", "qa"] {
            let bus = Arc::clone(&bus);
            handles.push(tokio::spawn(async move {
                for n in 0..50 {
                    bus.send(status(sender, "orchestrator", n)).unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut last: HashMap<String, i64> = HashMap::new();
        for _ in 0..150 {
            let msg = bus.receive("orchestrator").await.unwrap();
            let prev = last.entry(msg.from().to_string()).or_insert(-1);
            assert!(seq(&msg) as i64 > *prev);
            *prev = seq(&msg) as i64;
        }
    }

    #[tokio::test]
    async fn test_mailbox_full_leaves_queue_untouched() {
        let bus = MessageBus::new();
        assert_eq!(bus.mailbox_capacity(), DEFAULT_MAILBOX_CAPACITY);
        for n in 0..DEFAULT_MAILBOX_CAPACITY {
            bus.send(status("orchestrator", "analyst", n)).unwrap();
        }

        let err = bus
            .send(status("orchestrator", "analyst", 9999))
            .unwrap_err();
        assert!(matches!(
            err,
            GuildError::MailboxFull { ref participant, capacity: 1000, .. }
                if participant == "analyst"
        ));
        assert_eq!(bus.queue_size("analyst"), DEFAULT_MAILBOX_CAPACITY);

        for n in 0..DEFAULT_MAILBOX_CAPACITY {
            assert_eq!(seq(&bus.receive("analyst").await.unwrap()), n as u64);
        }
        assert_eq!(bus.queue_size("analyst"), 0);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let bus = MessageBus::new();
        let cancel = CancellationToken::new();
        let _orchestrator = bus.listen(participants::ORCHESTRATOR, cancel.clone());
        let mut analyst = bus.listen(participants::ANALYST, cancel.clone());
        let mut qa = bus.listen(participants::QA, cancel.clone());

        let report = bus.broadcast(Message::state_change(
            participants::ORCHESTRATOR,
            Phase::Idea,
            Phase::Analysis,
            10,
        ));

        assert_eq!(report.delivered, vec!["analyst".to_string(), "qa".to_string()]);
        assert_eq!(bus.queue_size(participants::ORCHESTRATOR), 0);
        assert_eq!(analyst.next().await.unwrap().to(), BROADCAST);
        assert_eq!(qa.next().await.unwrap().kind(), MessageKind::StateChange);
    }

    #[tokio::test]
    async fn test_send_to_broadcast_target_fans_out() {
        let bus = MessageBus::new();
        let cancel = CancellationToken::new();
        let _analyst = bus.listen("analyst", cancel.clone());
        let _qa = bus.listen("qa", cancel.clone());

        bus.send(status("orchestrator", BROADCAST, 1)).unwrap();

        assert_eq!(bus.queue_size("analyst"), 1);
        assert_eq!(bus.queue_size("qa"), 1);
        assert_eq!(bus.stats().total_messages, 2);
    }

    #[tokio::test]
    async fn test_broadcast_isolates_full_subscriber() {
        let bus = MessageBus::with_capacity(2, 10);
        let cancel = CancellationToken::new();
        let _analyst = bus.listen("analyst", cancel.clone());
        let mut qa = bus.listen("qa", cancel.clone());

        bus.send(status("orchestrator", "analyst", 0)).unwrap();
        bus.send(status("orchestrator", "analyst", 1)).unwrap();

        let report = bus.broadcast(status("orchestrator", BROADCAST, 2));
        assert_eq!(report.delivered, vec!["qa".to_string()]);
        assert_eq!(report.skipped, vec!["analyst".to_string()]);
        assert_eq!(seq(&qa.next().await.unwrap()), 2);
        assert_eq!(bus.queue_size("analyst"), 2);
    }

    #[tokio::test]
    async fn test_history_ring_evicts_oldest() {
        let bus = MessageBus::with_capacity(100, 3);
        for n in 0..5 {
            bus.send(status("qa", "orchestrator", n)).unwrap();
        }

        let history = bus.history(&HistoryFilter::new());
        let seqs: Vec<u64> = history.iter().map(seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_history_filters() {
        let bus = MessageBus::new();
        bus.send(status("qa", "orchestrator", 0)).unwrap();
        bus.send(status("analyst", "orchestrator", 1)).unwrap();
        bus.send(Message::task("orchestrator", "qa", "Test", Payload::new()))
            .unwrap();
        bus.send(status("qa", "orchestrator", 2)).unwrap();

        let from_qa = bus.history(&HistoryFilter::new().with_sender("qa"));
        assert_eq!(from_qa.len(), 2);

        let tasks = bus.history(&HistoryFilter::new().with_kind(MessageKind::Task));
        assert_eq!(tasks.len(), 1);

        let last = bus.history(&HistoryFilter::new().with_kind(MessageKind::Status).with_limit(1));
        assert_eq!(seq(&last[0]), 2);
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let bus = MessageBus::new();
        bus.send(status("qa", "orchestrator", 0)).unwrap();
        bus.send(Message::task("orchestrator", "qa", "Test", Payload::new()))
            .unwrap();

        let stats = bus.stats();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.messages_by_kind[&MessageKind::Status], 1);
        assert_eq!(stats.messages_by_kind[&MessageKind::Task], 1);
        assert_eq!(stats.messages_by_sender["qa"], 1);
        assert_eq!(stats.active_mailboxes, 2);
        assert_eq!(stats.queue_sizes["orchestrator"], 1);

        bus.reset_stats();
        assert_eq!(bus.stats().total_messages, 0);
    }

    #[tokio::test]
    async fn test_failed_send_not_counted() {
        let bus = MessageBus::with_capacity(1, 10);
        bus.send(status("qa", "orchestrator", 0)).unwrap();
        assert!(bus.send(status("qa", "orchestrator", 1)).is_err());

        assert_eq!(bus.stats().total_messages, 1);
        assert_eq!(bus.history(&HistoryFilter::new()).len(), 1);
    }

    #[tokio::test]
    async fn test_unheard_broadcast_not_counted() {
        let bus = MessageBus::with_capacity(1, 10);
        let report = bus.broadcast(status("orchestrator", BROADCAST, 0));
        assert!(report.delivered.is_empty());

        let _qa = bus.listen("qa", CancellationToken::new());
        bus.send(Message::task("orchestrator", "qa", "Test", Payload::new()))
            .unwrap();
        let report = bus.broadcast(status("orchestrator", BROADCAST, 1));
        assert_eq!(report.skipped, vec!["qa".to_string()]);

        let stats = bus.stats();
        assert_eq!(stats.total_messages, 1);
        assert!(!stats.messages_by_kind.contains_key(&MessageKind::Status));
        assert_eq!(bus.history(&HistoryFilter::new()).len(), 1);
    }

    #[tokio::test]
    async fn test_listener_deregisters_on_drop() {
        let bus = MessageBus::new();
        let cancel = CancellationToken::new();

        let first = bus.listen("qa", cancel.clone());
        let second = bus.listen("qa", cancel.clone());
        assert!(bus.is_subscribed("qa"));

        drop(first);
        assert!(bus.is_subscribed("qa"));
        drop(second);
        assert!(!bus.is_subscribed("qa"));
    }

    #[tokio::test]
    async fn test_cancelled_listener_keeps_pending_message() {
        let bus = MessageBus::new();
        let cancel = CancellationToken::new();
        let mut listener = bus.listen("qa", cancel.clone());
        assert_eq!(listener.participant(), "qa");

        bus.send(status("orchestrator", "qa", 7)).unwrap();
        cancel.cancel();
        assert!(listener.cancel_token().is_cancelled());

        assert!(listener.next().await.is_none());
        drop(listener);

        let msg = bus.receive("qa").await.unwrap();
        assert_eq!(seq(&msg), 7);
    }

    #[tokio::test]
    async fn test_cancelled_listener_leaves_broadcasts() {
        let bus = MessageBus::new();
        let cancel = CancellationToken::new();
        let mut stopped = bus.listen("qa", cancel.clone());
        let _cto = bus.listen("cto", CancellationToken::new());

        cancel.cancel();
        assert!(stopped.next().await.is_none());
        assert!(!bus.is_subscribed("qa"));

        let report = bus.broadcast(Message::state_change(
            participants::ORCHESTRATOR,
            Phase::Analysis,
            Phase::Architecture,
            25,
        ));
        assert_eq!(report.delivered, vec!["cto".to_string()]);
        assert_eq!(bus.queue_size("qa"), 0);

        // A second poll and the drop leave the other subscriber alone
        let _qa_again = bus.listen("qa", CancellationToken::new());
        assert!(stopped.next().await.is_none());
        drop(stopped);
        assert!(bus.is_subscribed("qa"));
        assert!(bus.is_subscribed("cto"));
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiting_listener() {
        let bus = MessageBus::new();
        let cancel = CancellationToken::new();
        let mut listener = bus.listen("qa", cancel.clone());

        let waiter = tokio::spawn(async move { listener.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_receive_waits_for_message() {
        let bus = Arc::new(MessageBus::new());
        let reader = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.receive("qa").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.send(status("orchestrator", "qa", 3)).unwrap();

        let msg = reader.await.unwrap().unwrap();
        assert_eq!(seq(&msg), 3);
    }
}
