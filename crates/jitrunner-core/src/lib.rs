//! Core domain types and port traits for jitrunner.
//!
//! This crate contains:
//! - The typed view of inbound `workflow_job` webhook events
//! - Credential types (application identity, installation, job credential)
//! - Build invocation types and the build trigger port
//! - Queue, secret store, identity provider and credential broker ports
//! - The error taxonomy shared by every crate in the workspace

pub mod broker;
pub mod build;
pub mod credential;
pub mod error;
pub mod event;
pub mod identity;
pub mod queue;
pub mod secret;

pub use broker::CredentialBroker;
pub use build::{BuildHandle, BuildInvocation, BuildParameter, BuildTrigger};
pub use credential::{AppIdentity, InstallationRef, JobCredential};
pub use error::{Error, Result};
pub use event::{InboundEvent, RepositoryOwner, RepositoryRef, WorkflowJob, is_valid_name};
pub use identity::IdentityProvider;
pub use queue::{MessageQueue, QueueMessage};
pub use secret::SecretStore;
