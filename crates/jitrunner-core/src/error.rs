//! Error types for jitrunner.
//!
//! Every failure inside one dispatch is fatal to that dispatch. Callers do not
//! retry individual steps; the queue redelivers the whole message instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The application identity secret is missing, unreadable or malformed,
    /// or the identity provider rejected it.
    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// The application is not installed on the target repository.
    #[error("installation not found for {owner}/{repo}")]
    InstallationNotFound { owner: String, repo: String },

    /// The installation lacks permission to mint runner registration tokens.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The build service refused to start the ephemeral build.
    #[error("build trigger rejected: {0}")]
    TriggerRejected(String),

    #[error("queue error: {0}")]
    Queue(String),

    /// Unexpected response or transport failure from an upstream service.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
