//! Webhook signature verification
//!
//! Senders sign the raw request body with HMAC-SHA256 under a shared secret
//! and send the hex digest in the `signature-token` header, optionally as
//! `sha256=<hex>`. A verifier without a provisioned secret rejects everything.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies webhook signatures against a shared secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<Vec<u8>>,
}

impl SignatureVerifier {
    /// Creates a verifier for the given shared secret
    ///
    /// An empty secret counts as not provisioned.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            secret: (!secret.is_empty()).then(|| secret.to_vec()),
        }
    }

    /// Creates a verifier that rejects every request
    pub fn unprovisioned() -> Self {
        Self { secret: None }
    }

    pub fn is_provisioned(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks `token` against the HMAC of `payload`
    ///
    /// The digest comparison is constant-time.
    pub fn verify(&self, payload: &[u8], token: Option<&str>) -> Result<(), WebhookError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| WebhookError::authentication("webhook secret is not provisioned"))?;

        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WebhookError::authentication("missing signature token"))?;
        let hex_digest = token.strip_prefix(SIGNATURE_PREFIX).unwrap_or(token);

        let expected = hex::decode(hex_digest)
            .map_err(|_| WebhookError::authentication("signature token is not hex"))?;

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| WebhookError::authentication(format!("HMAC error: {e}")))?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| WebhookError::authentication("signature mismatch"))
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("provisioned", &self.is_provisioned())
            .finish()
    }
}

/// Computes the hex signature a sender would attach to `payload`
pub fn sign_payload(secret: impl AsRef<[u8]>, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_ref())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
