//! Secret storage abstraction.

use async_trait::async_trait;

use crate::Result;

/// Trait for secret storage backends. Read-only from this system's side.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get a secret string by name.
    ///
    /// Fails with [`crate::Error::CredentialUnavailable`] when the secret does
    /// not exist or has no string value.
    async fn get(&self, name: &str) -> Result<String>;
}
