//! AWS backends for jitrunner.
//!
//! Provides implementations of the core ports:
//! - [`SqsQueue`] for [`jitrunner_core::MessageQueue`]
//! - [`SecretsManagerStore`] for [`jitrunner_core::SecretStore`]
//! - [`CodeBuildTrigger`] for [`jitrunner_core::BuildTrigger`]
//!
//! Clients are created once by the binary from one shared [`SdkConfig`] and
//! handed to the components that use them.

pub mod codebuild;
pub mod secrets;
pub mod sqs;

#[cfg(test)]
mod testing;

pub use aws_config::SdkConfig;
pub use codebuild::CodeBuildTrigger;
pub use secrets::SecretsManagerStore;
pub use sqs::SqsQueue;

use aws_config::BehaviorVersion;

/// Load the shared AWS configuration from the environment (region,
/// credentials chain, endpoint overrides).
pub async fn load_sdk_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest()).load().await
}
