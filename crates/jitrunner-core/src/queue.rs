//! Message queue port.
//!
//! The queue is the only boundary between intake and dispatch. Bodies travel
//! unmodified; no envelope is added.

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;

/// A message received from the queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Opaque handle used to acknowledge the message.
    pub receipt: String,
    /// Message body, exactly as it was sent.
    pub body: String,
    /// How many times the message has been delivered, this delivery included.
    pub receive_count: u32,
}

/// Trait for queue backends.
///
/// A received message stays hidden for the visibility timeout and becomes
/// deliverable again unless it is acknowledged first.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Send one message.
    async fn send(&self, body: &str) -> Result<()>;

    /// Receive up to `max_messages`, waiting at most `wait` for the first one.
    async fn receive(&self, max_messages: u32, wait: Duration) -> Result<Vec<QueueMessage>>;

    /// Acknowledge successful processing, removing the message for good.
    async fn ack(&self, message: &QueueMessage) -> Result<()>;
}
