//! App JWT creation.
//!
//! GitHub accepts app JWTs signed with RS256, issued by the App id and valid
//! for at most ten minutes.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::GitHubError;
use jitrunner_core::AppIdentity;

/// Backdate `iat` to absorb clock drift between us and GitHub.
const CLOCK_DRIFT_SECS: i64 = 60;
/// Stay under GitHub's ten minute maximum.
const LIFETIME_SECS: i64 = 9 * 60;

/// JWT claims for GitHub App authentication.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Create a short-lived app JWT for `identity`.
pub fn create_app_jwt(identity: &AppIdentity) -> Result<String, GitHubError> {
    let key = EncodingKey::from_rsa_pem(identity.private_key_pem().as_bytes())
        .map_err(|e| GitHubError::Jwt(format!("invalid private key: {}", e)))?;

    let now = Utc::now().timestamp();
    let claims = AppClaims {
        iat: now - CLOCK_DRIFT_SECS,
        exp: now + LIFETIME_SECS,
        iss: identity.app_id.clone(),
    };

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| GitHubError::Jwt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    const PRIVATE_KEY: &str = include_str!("../testdata/app-key.pem");
    const PUBLIC_KEY: &str = include_str!("../testdata/app-key.pub.pem");

    #[test]
    fn test_create_app_jwt() {
        let identity = AppIdentity::new("424242", PRIVATE_KEY);
        let jwt = create_app_jwt(&identity).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&["424242"]);
        let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
        let decoded = decode::<AppClaims>(&jwt, &key, &validation).unwrap();

        assert_eq!(decoded.claims.iss, "424242");
        assert!(decoded.claims.exp - decoded.claims.iat <= 600);
        assert!(decoded.claims.iat < Utc::now().timestamp());
    }

    #[test]
    fn test_invalid_private_key() {
        let identity = AppIdentity::new("1", "not a pem");
        let result = create_app_jwt(&identity);
        assert!(matches!(result, Err(GitHubError::Jwt(_))));
    }
}
