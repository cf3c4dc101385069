//! GitHub webhook signature verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Check a `sha256=<hex>` signature against `body`.
pub fn verify_github_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };

    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&sig_bytes).is_ok()
}

/// Compute the header value GitHub would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example from GitHub's webhook validation docs.
    const DOCS_SIGNATURE: &str =
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";

    #[test]
    fn test_known_signature() {
        assert!(verify_github_signature(
            "It's a Secret to Everybody",
            b"Hello, World!",
            Some(DOCS_SIGNATURE)
        ));
    }

    #[test]
    fn test_sign_matches_verify() {
        let signature = sign("s3cret", b"{}").unwrap();
        assert_eq!(
            sign("It's a Secret to Everybody", b"Hello, World!").as_deref(),
            Some(DOCS_SIGNATURE)
        );
        assert!(verify_github_signature("s3cret", b"{}", Some(&signature)));
        assert!(!verify_github_signature("other", b"{}", Some(&signature)));
    }

    #[test]
    fn test_rejects_malformed_signatures() {
        assert!(!verify_github_signature("s3cret", b"{}", None));
        assert!(!verify_github_signature("s3cret", b"{}", Some("sha1=abcd")));
        assert!(!verify_github_signature("s3cret", b"{}", Some("sha256=not-hex")));
    }
}
