//! GitHub App REST client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::{GitHubError, create_app_jwt};
use jitrunner_core::{AppIdentity, Error, IdentityProvider, InstallationRef, JobCredential, Result};

const USER_AGENT: &str = "jitrunner";
const API_VERSION: &str = "2022-11-28";

/// GitHub App API client.
///
/// Holds no credentials. Every call authenticates from the [`AppIdentity`]
/// it is given.
#[derive(Clone)]
pub struct GitHubAppClient {
    client: reqwest::Client,
    api_url: String,
}

impl GitHubAppClient {
    /// Create a client for `api_url` (`https://api.github.com`, or
    /// `https://<host>/api/v3` for GitHub Enterprise Server).
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create with a custom HTTP client.
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    fn request(&self, method: reqwest::Method, path: &str, bearer: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .header("Authorization", format!("Bearer {}", bearer))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Exchange an app JWT for an installation access token.
    async fn installation_token(
        &self,
        jwt: &str,
        installation: InstallationRef,
    ) -> Result<String> {
        let path = format!("/app/installations/{}/access_tokens", installation);
        let response = self
            .request(reqwest::Method::POST, &path, jwt)
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = parse(response).await?;
                Ok(token.token)
            }
            StatusCode::UNAUTHORIZED => Err(Error::CredentialUnavailable(
                api_message(response).await,
            )),
            StatusCode::FORBIDDEN => Err(Error::Authorization(api_message(response).await)),
            status => Err(api_error(status, response).await),
        }
    }
}

#[async_trait]
impl IdentityProvider for GitHubAppClient {
    async fn resolve_installation(
        &self,
        identity: &AppIdentity,
        owner: &str,
        repo: &str,
    ) -> Result<InstallationRef> {
        let jwt = create_app_jwt(identity)?;
        let path = repo_path(owner, repo, "installation");

        let response = self
            .request(reqwest::Method::GET, &path, &jwt)
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let installation: InstallationResponse = parse(response).await?;
                debug!(owner, repo, installation = installation.id, "Resolved installation");
                Ok(InstallationRef(installation.id))
            }
            StatusCode::NOT_FOUND => Err(Error::InstallationNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            StatusCode::UNAUTHORIZED => Err(Error::CredentialUnavailable(format!(
                "app authentication rejected: {}",
                api_message(response).await
            ))),
            status => Err(api_error(status, response).await),
        }
    }

    async fn mint_job_credential(
        &self,
        identity: &AppIdentity,
        installation: InstallationRef,
        owner: &str,
        repo: &str,
    ) -> Result<JobCredential> {
        let jwt = create_app_jwt(identity)?;
        let installation_token = self.installation_token(&jwt, installation).await?;

        let path = repo_path(owner, repo, "actions/runners/registration-token");
        let response = self
            .request(reqwest::Method::POST, &path, &installation_token)
            .send()
            .await
            .map_err(|e| GitHubError::Request(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = parse(response).await?;
                Ok(JobCredential::new(token.token, token.expires_at))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(Error::Authorization(format!(
                    "cannot create registration token for {}/{}: {}",
                    owner,
                    repo,
                    api_message(response).await
                )))
            }
            status => Err(api_error(status, response).await),
        }
    }
}

/// `/repos/{owner}/{repo}/{rest}` with owner and repo percent-encoded as
/// single path segments.
fn repo_path(owner: &str, repo: &str, rest: &str) -> String {
    format!(
        "/repos/{}/{}/{}",
        urlencoding::encode(owner),
        urlencoding::encode(repo),
        rest
    )
}

async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| GitHubError::Parse(e.to_string()).into())
}

/// Extract GitHub's `message` field from an error response, falling back to
/// the raw body.
async fn api_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.message)
        .unwrap_or(text)
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> Error {
    GitHubError::Api {
        status: status.as_u16(),
        message: api_message(response).await,
    }
    .into()
}

#[derive(Debug, Deserialize)]
struct InstallationResponse {
    id: u64,
}

/// Shape shared by installation access tokens and registration tokens.
#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}
