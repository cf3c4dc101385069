//! In-process message queue.
//!
//! Mirrors the at-least-once semantics of the hosted queue: received
//! messages are hidden for a visibility timeout and come back unless they
//! are acknowledged. Used by `jitrunner serve --memory-queue` and tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use jitrunner_core::{Error, MessageQueue, QueueMessage, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Entry {
    id: u64,
    body: String,
    receive_count: u32,
    visible_at: Instant,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Queue held in process memory.
pub struct MemoryQueue {
    visibility_timeout: Duration,
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            visibility_timeout,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Messages not yet acknowledged, visible or not.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_visible(&self, max_messages: u32) -> Vec<QueueMessage> {
        let now = Instant::now();
        let hidden_until = now + self.visibility_timeout;
        let mut inner = self.lock();

        inner
            .entries
            .iter_mut()
            .filter(|e| e.visible_at <= now)
            .take(max_messages.max(1) as usize)
            .map(|entry| {
                entry.receive_count += 1;
                entry.visible_at = hidden_until;
                QueueMessage {
                    receipt: format!("{}-{}", entry.id, entry.receive_count),
                    body: entry.body.clone(),
                    receive_count: entry.receive_count,
                }
            })
            .collect()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, body: &str) -> Result<()> {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            body: body.to_string(),
            receive_count: 0,
            visible_at: Instant::now(),
        });
        Ok(())
    }

    async fn receive(&self, max_messages: u32, wait: Duration) -> Result<Vec<QueueMessage>> {
        let deadline = Instant::now() + wait;
        loop {
            let messages = self.take_visible(max_messages);
            if !messages.is_empty() || Instant::now() >= deadline {
                return Ok(messages);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn ack(&self, message: &QueueMessage) -> Result<()> {
        let stale = || Error::Queue(format!("stale receipt {}", message.receipt));

        let (id, count) = message.receipt.split_once('-').ok_or_else(stale)?;
        let id: u64 = id.parse().map_err(|_| stale())?;
        let count: u32 = count.parse().map_err(|_| stale())?;

        // Only the latest delivery may acknowledge.
        let mut inner = self.lock();
        let position = inner
            .entries
            .iter()
            .position(|e| e.id == id && e.receive_count == count)
            .ok_or_else(stale)?;
        inner.entries.remove(position);
        Ok(())
    }
}
