//! # guild-bus
//!
//! In-process message bus connecting the orchestrator and its workers.
//!
//! Every participant gets a bounded FIFO mailbox on first use. Direct sends
//! never block: a full mailbox is reported to the sender. Broadcasts reach
//! every participant currently holding a [`Listener`], except the sender.

mod bus;

pub use bus::{
    BroadcastReport, BusStats, HistoryFilter, Listener, MessageBus, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_MAILBOX_CAPACITY,
};

use guild_core::config::BusConfig;

impl MessageBus {
    /// Create a bus from workspace configuration
    pub fn from_config(config: &BusConfig) -> Self {
        Self::with_capacity(config.mailbox_capacity, config.history_capacity)
    }
}
