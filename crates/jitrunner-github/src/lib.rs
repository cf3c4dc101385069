//! GitHub App credential exchange for jitrunner.
//!
//! Converts the long-lived GitHub App identity into a single-use runner
//! registration token:
//!
//! 1. sign an app JWT with the App's private key
//! 2. resolve the App's installation on the target repository
//! 3. exchange the JWT for an installation access token
//! 4. mint a registration token with the installation token

pub mod app_jwt;
pub mod broker;
pub mod client;
pub mod error;

pub use app_jwt::create_app_jwt;
pub use broker::AppCredentialBroker;
pub use client::GitHubAppClient;
pub use error::GitHubError;
