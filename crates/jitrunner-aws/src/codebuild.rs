//! CodeBuild-backed build trigger.

use async_trait::async_trait;
use aws_sdk_codebuild::Client;
use aws_sdk_codebuild::error::{DisplayErrorContext, SdkError};
use aws_sdk_codebuild::types::{EnvironmentVariable, EnvironmentVariableType};
use tracing::info;

use jitrunner_core::{BuildHandle, BuildInvocation, BuildTrigger, Error, Result};

/// Starts one CodeBuild build per invocation.
///
/// Parameters are passed as `PLAINTEXT` environment overrides, so the job
/// credential is visible in the build's environment listing for its short
/// lifetime.
#[derive(Clone)]
pub struct CodeBuildTrigger {
    client: Client,
}

impl CodeBuildTrigger {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self::with_client(Client::new(config))
    }

    /// Create with a custom CodeBuild client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BuildTrigger for CodeBuildTrigger {
    fn name(&self) -> &'static str {
        "codebuild"
    }

    async fn start(&self, invocation: &BuildInvocation) -> Result<BuildHandle> {
        let output = self
            .client
            .start_build()
            .project_name(&invocation.project)
            .set_environment_variables_override(Some(environment_overrides(invocation)?))
            .set_buildspec_override(invocation.buildspec_override.clone())
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(_) => {
                    Error::TriggerRejected(DisplayErrorContext(&e).to_string())
                }
                other => Error::Upstream(DisplayErrorContext(&other).to_string()),
            })?;

        let build_id = output
            .build_value()
            .and_then(|b| b.id())
            .unwrap_or_default()
            .to_string();

        info!(project = %invocation.project, build_id = %build_id, "Started build");
        Ok(BuildHandle { build_id })
    }
}

/// Map invocation parameters to plaintext environment overrides.
fn environment_overrides(invocation: &BuildInvocation) -> Result<Vec<EnvironmentVariable>> {
    invocation
        .parameters
        .iter()
        .map(|p| {
            EnvironmentVariable::builder()
                .name(&p.name)
                .value(&p.value)
                .r#type(EnvironmentVariableType::Plaintext)
                .build()
                .map_err(|e| Error::Internal(e.to_string()))
        })
        .collect()
}
