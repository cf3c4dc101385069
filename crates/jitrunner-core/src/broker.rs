//! Credential broker port.

use async_trait::async_trait;

use crate::{JobCredential, Result};

/// Exchanges the long-lived application identity for a job credential.
///
/// Implementations perform no caching: every call re-authenticates.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn issue(&self, owner: &str, repo: &str) -> Result<JobCredential>;
}
