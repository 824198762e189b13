//! Signed OAuth state tokens
//!
//! The state parameter carried through the authorization redirect is an
//! HMAC-SHA256 signed payload so the callback can recover which user
//! started the flow without server-side session storage. Tokens expire
//! after ten minutes.

use crate::models::Platform;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const STATE_TTL_MINUTES: i64 = 10;

/// Payload carried through the OAuth redirect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateToken {
    pub user_id: i64,
    pub platform: Platform,
    pub issued_at: DateTime<Utc>,
    pub nonce: String,
}

impl StateToken {
    pub fn new(user_id: i64, platform: Platform) -> Self {
        Self {
            user_id,
            platform,
            issued_at: Utc::now(),
            nonce: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() - self.issued_at > Duration::minutes(STATE_TTL_MINUTES)
    }
}

/// Signs and verifies state tokens with a shared secret.
#[derive(Clone)]
pub struct StateSigner {
    secret: Vec<u8>,
}

impl StateSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Encode a token as `base64url(payload).base64url(signature)`.
    pub fn sign(&self, token: &StateToken) -> Result<String> {
        let payload = serde_json::to_vec(token).context("Failed to serialize state token")?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            BASE64URL_NOPAD.encode(&payload),
            BASE64URL_NOPAD.encode(&signature)
        ))
    }

    /// Verify the signature and expiry, returning the payload.
    ///
    /// Returns an error for malformed input, a bad signature, or an
    /// expired token.
    pub fn verify(&self, state: &str) -> Result<StateToken> {
        let (payload_part, signature_part) = state
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("Malformed state token"))?;

        let payload = BASE64URL_NOPAD
            .decode(payload_part.as_bytes())
            .context("Invalid state payload encoding")?;
        let signature = BASE64URL_NOPAD
            .decode(signature_part.as_bytes())
            .context("Invalid state signature encoding")?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| anyhow::anyhow!("State signature mismatch"))?;

        let token: StateToken =
            serde_json::from_slice(&payload).context("Failed to parse state token")?;

        if token.is_expired() {
            anyhow::bail!("State token expired");
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = StateSigner::new("test-secret");
        let token = StateToken::new(42, Platform::Linkedin);

        let state = signer.sign(&token).expect("sign");
        let verified = signer.verify(&state).expect("verify");

        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.platform, Platform::Linkedin);
        assert_eq!(verified.nonce, token.nonce);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = StateSigner::new("test-secret");
        let token = StateToken::new(42, Platform::Twitter);
        let state = signer.sign(&token).expect("sign");

        let other = StateToken::new(99, Platform::Twitter);
        let forged_payload =
            BASE64URL_NOPAD.encode(&serde_json::to_vec(&other).unwrap());
        let signature_part = state.split_once('.').unwrap().1;
        let forged = format!("{}.{}", forged_payload, signature_part);

        assert!(signer.verify(&forged).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signer = StateSigner::new("secret-a");
        let other = StateSigner::new("secret-b");
        let state = signer.sign(&StateToken::new(1, Platform::Pinterest)).expect("sign");

        assert!(other.verify(&state).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = StateSigner::new("test-secret");
        let token = StateToken {
            user_id: 1,
            platform: Platform::Devto,
            issued_at: Utc::now() - Duration::minutes(11),
            nonce: "n".to_string(),
        };

        let state = signer.sign(&token).expect("sign");
        let err = signer.verify(&state).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_malformed_input_rejected() {
        let signer = StateSigner::new("test-secret");
        assert!(signer.verify("no-dot-here").is_err());
        assert!(signer.verify("!!!.???").is_err());
    }
}
