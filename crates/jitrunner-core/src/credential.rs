//! Credential types.
//!
//! None of these types print their secret material through `Debug` or
//! `Display`. The raw values are only reachable through explicit accessors.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Long-lived application identity, read from the secret store.
#[derive(Clone)]
pub struct AppIdentity {
    pub app_id: String,
    private_key: String,
}

impl AppIdentity {
    pub fn new(app_id: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            private_key: private_key.into(),
        }
    }

    /// Parse a secret record of the form `{"app_id": "...", "private_key": "..."}`.
    ///
    /// `app_id` may be a string or a number.
    pub fn from_secret_json(secret: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(secret)
            .map_err(|e| Error::CredentialUnavailable(format!("secret is not JSON: {}", e)))?;

        let app_id = match value.get("app_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::CredentialUnavailable(
                    "secret has no app_id".to_string(),
                ));
            }
        };

        let private_key = value
            .get("private_key")
            .and_then(|k| k.as_str())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::CredentialUnavailable("secret has no private_key".to_string()))?;

        Ok(Self::new(app_id, private_key))
    }

    /// PEM-encoded private key.
    pub fn private_key_pem(&self) -> &str {
        &self.private_key
    }
}

impl std::fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppIdentity")
            .field("app_id", &self.app_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Installation of the application on one repository.
///
/// Valid for the current dispatch only; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct InstallationRef(pub u64);

/// Single-use, repository-scoped runner registration token.
#[derive(Clone)]
pub struct JobCredential {
    token: String,
    /// Expiry as reported by the identity provider. Not enforced here.
    pub expires_at: Option<DateTime<Utc>>,
}

impl JobCredential {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// The raw token. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for JobCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCredential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl std::fmt::Display for JobCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secret_with_string_app_id() {
        let identity =
            AppIdentity::from_secret_json(r#"{"app_id":"12345","private_key":"-----BEGIN"}"#)
                .unwrap();
        assert_eq!(identity.app_id, "12345");
        assert_eq!(identity.private_key_pem(), "-----BEGIN");
    }

    #[test]
    fn test_parse_secret_with_numeric_app_id() {
        let identity =
            AppIdentity::from_secret_json(r#"{"app_id":12345,"private_key":"pem"}"#).unwrap();
        assert_eq!(identity.app_id, "12345");
    }

    #[test]
    fn test_secret_missing_keys() {
        for secret in [
            r#"{"private_key":"pem"}"#,
            r#"{"app_id":"1"}"#,
            r#"{"app_id":"","private_key":"pem"}"#,
            r#"{"app_id":"1","private_key":""}"#,
            "plain text",
        ] {
            let result = AppIdentity::from_secret_json(secret);
            assert!(
                matches!(result, Err(Error::CredentialUnavailable(_))),
                "expected credential error for {secret}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let identity = AppIdentity::new("1", "super-secret-pem");
        let debug = format!("{:?}", identity);
        assert!(!debug.contains("super-secret-pem"));
    }

    #[test]
    fn test_job_credential_is_redacted() {
        let credential = JobCredential::new("AABBCC", None);
        assert_eq!(credential.to_string(), "<redacted>");
        assert!(!format!("{:?}", credential).contains("AABBCC"));
        assert_eq!(credential.expose(), "AABBCC");
    }
}
