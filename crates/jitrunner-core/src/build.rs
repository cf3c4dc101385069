//! Build trigger port and invocation types.
//!
//! A build trigger starts one ephemeral compute execution that hosts a single
//! runner. Success means the start request was accepted, nothing more.

use async_trait::async_trait;

use crate::{JobCredential, Result};

/// Parameter carrying the repository owner.
pub const PARAM_OWNER: &str = "OWNER";
/// Parameter carrying the repository name.
pub const PARAM_REPO: &str = "REPO";
/// Parameter carrying the job credential.
pub const PARAM_JOB_CREDENTIAL: &str = "JOB_CREDENTIAL";

/// One named parameter passed to the ephemeral build.
#[derive(Clone, PartialEq, Eq)]
pub struct BuildParameter {
    pub name: String,
    pub value: String,
    /// Whether the value must be kept out of logs.
    pub sensitive: bool,
}

impl std::fmt::Debug for BuildParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.sensitive {
            "<redacted>"
        } else {
            self.value.as_str()
        };
        f.debug_struct("BuildParameter")
            .field("name", &self.name)
            .field("value", &value)
            .finish()
    }
}

/// A request to start one ephemeral build.
#[derive(Debug, Clone)]
pub struct BuildInvocation {
    /// Build project reference.
    pub project: String,
    /// Environment overrides, in `OWNER`, `REPO`, `JOB_CREDENTIAL` order.
    pub parameters: Vec<BuildParameter>,
    /// Inline buildspec replacing the project's own, if any.
    pub buildspec_override: Option<String>,
}

impl BuildInvocation {
    /// Build the three-parameter invocation for one repository.
    pub fn for_repository(
        project: impl Into<String>,
        owner: &str,
        repo: &str,
        credential: &JobCredential,
    ) -> Self {
        Self {
            project: project.into(),
            parameters: vec![
                BuildParameter {
                    name: PARAM_OWNER.to_string(),
                    value: owner.to_string(),
                    sensitive: false,
                },
                BuildParameter {
                    name: PARAM_REPO.to_string(),
                    value: repo.to_string(),
                    sensitive: false,
                },
                BuildParameter {
                    name: PARAM_JOB_CREDENTIAL.to_string(),
                    value: credential.expose().to_string(),
                    sensitive: true,
                },
            ],
            buildspec_override: None,
        }
    }

    pub fn with_buildspec(mut self, buildspec: impl Into<String>) -> Self {
        self.buildspec_override = Some(buildspec.into());
        self
    }

    /// Look up a parameter value by name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// Handle to an accepted build start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHandle {
    /// Build-service specific identifier.
    pub build_id: String,
}

/// Trait for ephemeral build backends.
#[async_trait]
pub trait BuildTrigger: Send + Sync {
    /// Name of this backend.
    fn name(&self) -> &'static str;

    /// Start one build. Fails with [`crate::Error::TriggerRejected`] when the
    /// service refuses the request.
    async fn start(&self, invocation: &BuildInvocation) -> Result<BuildHandle>;
}
