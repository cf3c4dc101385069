//! Application state.

use jitrunner_core::MessageQueue;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn MessageQueue>,
    /// Shared secret for `X-Hub-Signature-256` checks. Unset disables them.
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self {
            queue,
            webhook_secret: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.map(Arc::from);
        self
    }
}
