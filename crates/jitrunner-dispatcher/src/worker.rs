//! Worker that pulls webhook events from the queue and dispatches them.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{Instrument, error, info, info_span, warn};

use crate::dispatcher::Dispatcher;
use jitrunner_core::{MessageQueue, QueueMessage};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Polling and concurrency settings for a worker.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Upper bound on messages requested per receive.
    pub max_messages: u32,
    /// Long-poll wait per receive.
    pub wait_time: Duration,
    /// Messages processed at the same time.
    pub max_concurrency: usize,
    /// Deliveries after which the queue dead-letters a message. Zero disables
    /// the warning.
    pub max_receive_count: u32,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_time: Duration::from_secs(20),
            max_concurrency: 8,
            max_receive_count: 5,
        }
    }
}

/// A worker that receives messages and runs each through the dispatcher.
///
/// A message is acknowledged only when dispatch returns successfully, skips
/// included. Failed messages are left for the queue to redeliver.
#[derive(Clone)]
pub struct Worker {
    id: String,
    queue: Arc<dyn MessageQueue>,
    dispatcher: Arc<Dispatcher>,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn MessageQueue>,
        dispatcher: Arc<Dispatcher>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            dispatcher,
            options,
        }
    }

    /// Run the worker loop until `shutdown` resolves.
    ///
    /// On shutdown no new messages are received; messages already in flight
    /// are finished before this returns.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            worker_id = %self.id,
            max_concurrency = self.options.max_concurrency,
            "Starting worker"
        );

        tokio::pin!(shutdown);
        let max_concurrency = self.options.max_concurrency.max(1);
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() >= max_concurrency {
                reap(tasks.join_next().await);
            }
            while let Some(finished) = tasks.try_join_next() {
                reap(Some(finished));
            }

            let capacity = (max_concurrency - tasks.len()) as u32;
            let batch = self.options.max_messages.min(capacity).max(1);

            let received = tokio::select! {
                _ = &mut shutdown => break,
                received = self.queue.receive(batch, self.options.wait_time) => received,
            };

            match received {
                Ok(messages) => {
                    for message in messages {
                        let worker = self.clone();
                        tasks.spawn(async move { worker.process(message).await });
                    }
                }
                Err(e) => {
                    warn!(worker_id = %self.id, error = %e, "Failed to receive messages");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.id, in_flight = tasks.len(), "Shutting down worker");
        while let Some(finished) = tasks.join_next().await {
            reap(Some(finished));
        }
        info!(worker_id = %self.id, "Worker stopped");
    }

    /// Receive one batch and process it to completion.
    ///
    /// Returns the number of messages received.
    pub async fn poll_once(&self) -> jitrunner_core::Result<usize> {
        let messages = self
            .queue
            .receive(self.options.max_messages, self.options.wait_time)
            .await?;
        let count = messages.len();
        join_all(messages.into_iter().map(|m| self.process(m))).await;
        Ok(count)
    }

    async fn process(&self, message: QueueMessage) {
        let span = info_span!(
            "dispatch",
            worker_id = %self.id,
            receive_count = message.receive_count
        );

        async {
            if message.receive_count > 1 {
                warn!("Redelivered message");
            }
            let max = self.options.max_receive_count;
            if max > 0 && message.receive_count >= max {
                warn!(max_receive_count = max, "Message on its final delivery before dead-lettering");
            }

            match self.dispatcher.dispatch_message(&message.body).await {
                Ok(outcome) => {
                    info!(outcome = %outcome, "Processed message");
                    if let Err(e) = self.queue.ack(&message).await {
                        warn!(error = %e, "Failed to acknowledge message");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Dispatch failed; leaving message for redelivery");
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn reap(finished: Option<Result<(), tokio::task::JoinError>>) {
    if let Some(Err(e)) = finished {
        error!(error = %e, "Dispatch task panicked");
    }
}
