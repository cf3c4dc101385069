//! Identity provider port.
//!
//! Mirrors the app-authentication model: the application authenticates with
//! its own identity to find an installation, then mints a job credential
//! through installation-scoped authority.

use async_trait::async_trait;

use crate::{AppIdentity, InstallationRef, JobCredential, Result};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the installation of the application on `owner/repo`.
    ///
    /// Fails with [`crate::Error::InstallationNotFound`] when the application
    /// is not installed there.
    async fn resolve_installation(
        &self,
        identity: &AppIdentity,
        owner: &str,
        repo: &str,
    ) -> Result<InstallationRef>;

    /// Mint a runner registration credential for `owner/repo`.
    ///
    /// Fails with [`crate::Error::Authorization`] when the installation lacks
    /// permission.
    async fn mint_job_credential(
        &self,
        identity: &AppIdentity,
        installation: InstallationRef,
        owner: &str,
        repo: &str,
    ) -> Result<JobCredential>;
}
