//! Token signing/verification.
//!
//! Verification failures of any kind (bad signature, malformed token, expired,
//! wrong algorithm) surface as `DomainError::Unauthorized`. Library error
//! details are logged at `debug` and never returned.

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use reservo_core::{DomainError, DomainResult};

/// Signs and verifies one kind of token claims.
///
/// Access and refresh tokens use two independently configured instances with
/// distinct secrets and lifetimes.
pub trait TokenSigner<C>: Send + Sync {
    /// Lifetime of tokens produced by this signer.
    fn expires_in(&self) -> Duration;

    fn sign(&self, claims: &C) -> DomainResult<String>;

    fn verify(&self, token: &str) -> DomainResult<C>;
}

/// HMAC-SHA256 JWT signer.
pub struct Hs256Signer {
    label: &'static str,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: Duration,
}

impl core::fmt::Debug for Hs256Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Signer")
            .field("label", &self.label)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

impl Hs256Signer {
    /// `label` only appears in logs ("access", "refresh").
    pub fn new(label: &'static str, secret: &str, expires_in: Duration) -> Self {
        Self {
            label,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);
        validation
    }
}

impl<C> TokenSigner<C> for Hs256Signer
where
    C: Serialize + DeserializeOwned,
{
    fn expires_in(&self) -> Duration {
        self.expires_in
    }

    fn sign(&self, claims: &C) -> DomainResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("failed to sign {} token: {e}", self.label)))
    }

    fn verify(&self, token: &str) -> DomainResult<C> {
        decode::<C>(token, &self.decoding_key, &Self::validation())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(signer = self.label, error = %e, "token verification failed");
                DomainError::unauthorized(format!("invalid {} token", self.label))
            })
    }
}
