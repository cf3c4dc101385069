//! GitHub API errors.

use jitrunner_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JWT error: {0}")]
    Jwt(String),
}

impl From<GitHubError> for Error {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Jwt(msg) => Error::CredentialUnavailable(msg),
            other => Error::Upstream(other.to_string()),
        }
    }
}
