//! Secrets Manager-backed secret store.

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, SdkError};

use jitrunner_core::{Error, Result, SecretStore};

/// Reads secret strings from AWS Secrets Manager.
#[derive(Clone)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self::with_client(Client::new(config))
    }

    /// Create with a custom Secrets Manager client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| match e {
                // Missing secret, access denied, decryption failure: the
                // service answered and the identity is not available.
                SdkError::ServiceError(_) => Error::CredentialUnavailable(format!(
                    "cannot read secret {}: {}",
                    name,
                    DisplayErrorContext(&e)
                )),
                other => Error::Upstream(DisplayErrorContext(&other).to_string()),
            })?;

        output
            .secret_string()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::CredentialUnavailable(format!("secret {} has no string value", name)))
    }
}
