//! SQS-backed message queue.

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use std::time::Duration;
use tracing::{debug, warn};

use jitrunner_core::{Error, MessageQueue, QueueMessage, Result};

/// Message queue backed by one SQS queue.
///
/// Redelivery, visibility timeout and dead-lettering are configured on the
/// queue itself.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(config: &aws_config::SdkConfig, queue_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(config), queue_url)
    }

    /// Create with a custom SQS client.
    pub fn with_client(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: &str) -> Result<()> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| Error::Queue(DisplayErrorContext(&e).to_string()))?;

        debug!(message_id = ?output.message_id(), "Sent message");
        Ok(())
    }

    async fn receive(&self, max_messages: u32, wait: Duration) -> Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, 10) as i32)
            .wait_time_seconds(wait.as_secs().min(20) as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| Error::Queue(DisplayErrorContext(&e).to_string()))?;

        Ok(output.messages().iter().filter_map(to_queue_message).collect())
    }

    async fn ack(&self, message: &QueueMessage) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt)
            .send()
            .await
            .map_err(|e| Error::Queue(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// Convert an SQS message. Messages without a receipt handle cannot be
/// acknowledged and are dropped with a warning.
fn to_queue_message(message: &Message) -> Option<QueueMessage> {
    let Some(receipt) = message.receipt_handle() else {
        warn!(message_id = ?message.message_id(), "Message without receipt handle");
        return None;
    };

    let receive_count = message
        .attributes()
        .and_then(|a| a.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|c| c.parse().ok())
        .unwrap_or(1);

    Some(QueueMessage {
        receipt: receipt.to_string(),
        body: message.body().unwrap_or_default().to_string(),
        receive_count,
    })
}
