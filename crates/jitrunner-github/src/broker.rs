//! Credential broker backed by a GitHub App.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use jitrunner_core::{
    AppIdentity, CredentialBroker, IdentityProvider, JobCredential, Result, SecretStore,
};

/// Issues job credentials from the App identity held in a secret store.
///
/// The identity is re-read and re-authenticated on every call; nothing is
/// cached between dispatches.
pub struct AppCredentialBroker {
    secrets: Arc<dyn SecretStore>,
    identity_provider: Arc<dyn IdentityProvider>,
    secret_name: String,
}

impl AppCredentialBroker {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        identity_provider: Arc<dyn IdentityProvider>,
        secret_name: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            identity_provider,
            secret_name: secret_name.into(),
        }
    }
}

#[async_trait]
impl CredentialBroker for AppCredentialBroker {
    async fn issue(&self, owner: &str, repo: &str) -> Result<JobCredential> {
        let secret = self.secrets.get(&self.secret_name).await?;
        let identity = AppIdentity::from_secret_json(&secret)?;
        debug!(app_id = %identity.app_id, "Loaded app identity");

        let installation = self
            .identity_provider
            .resolve_installation(&identity, owner, repo)
            .await?;

        let credential = self
            .identity_provider
            .mint_job_credential(&identity, installation, owner, repo)
            .await?;

        info!(
            owner,
            repo,
            installation = %installation,
            expires_at = ?credential.expires_at,
            "Issued job credential"
        );
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitrunner_core::{Error, InstallationRef};
    use std::sync::Mutex;

    struct StaticSecrets(Option<String>);

    #[async_trait]
    impl SecretStore for StaticSecrets {
        async fn get(&self, name: &str) -> Result<String> {
            self.0
                .clone()
                .ok_or_else(|| Error::CredentialUnavailable(format!("secret {} not found", name)))
        }
    }

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<String>>,
        installed: bool,
    }

    #[async_trait]
    impl IdentityProvider for RecordingProvider {
        async fn resolve_installation(
            &self,
            identity: &AppIdentity,
            owner: &str,
            repo: &str,
        ) -> Result<InstallationRef> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("resolve {} {}/{}", identity.app_id, owner, repo));
            if self.installed {
                Ok(InstallationRef(9))
            } else {
                Err(Error::InstallationNotFound {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
        }

        async fn mint_job_credential(
            &self,
            _identity: &AppIdentity,
            installation: InstallationRef,
            owner: &str,
            repo: &str,
        ) -> Result<JobCredential> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("mint {} {}/{}", installation, owner, repo));
            Ok(JobCredential::new("reg-token", None))
        }
    }

    fn secret() -> Option<String> {
        Some(r#"{"app_id":"55","private_key":"pem"}"#.to_string())
    }

    #[tokio::test]
    async fn test_issue_resolves_then_mints() {
        let provider = Arc::new(RecordingProvider {
            installed: true,
            ..Default::default()
        });
        let broker =
            AppCredentialBroker::new(Arc::new(StaticSecrets(secret())), provider.clone(), "app");

        let credential = broker.issue("acme", "widget").await.unwrap();

        assert_eq!(credential.expose(), "reg-token");
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["resolve 55 acme/widget", "mint 9 acme/widget"]
        );
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let provider = Arc::new(RecordingProvider::default());
        let broker = AppCredentialBroker::new(Arc::new(StaticSecrets(None)), provider.clone(), "app");

        let result = broker.issue("acme", "widget").await;

        assert!(matches!(result, Err(Error::CredentialUnavailable(_))));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_secret() {
        let provider = Arc::new(RecordingProvider::default());
        let broker = AppCredentialBroker::new(
            Arc::new(StaticSecrets(Some(r#"{"appId":"55"}"#.to_string()))),
            provider.clone(),
            "app",
        );

        let result = broker.issue("acme", "widget").await;

        assert!(matches!(result, Err(Error::CredentialUnavailable(_))));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_installed_never_mints() {
        let provider = Arc::new(RecordingProvider::default());
        let broker =
            AppCredentialBroker::new(Arc::new(StaticSecrets(secret())), provider.clone(), "app");

        let result = broker.issue("acme", "widget").await;

        assert!(matches!(result, Err(Error::InstallationNotFound { .. })));
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }
}
