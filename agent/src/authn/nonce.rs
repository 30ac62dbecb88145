//! Admin action nonces.
//!
//! A nonce is an HS256 JWT naming the action it was issued for. It stays
//! valid for its whole lifetime and can be reused for the same action,
//! which matches how admin forms are resubmitted.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Nonce claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceClaims {
    /// Action the nonce authorizes
    pub action: String,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,
}

/// Issues and checks nonces
pub struct NonceSigner {
    secret: SecretString,
    lifetime: Duration,
}

impl NonceSigner {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            lifetime: Duration::hours(12),
        }
    }

    /// Signer with a random secret; nonces do not survive a restart
    pub fn ephemeral() -> Self {
        let secret = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        Self::new(SecretString::from(secret))
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Nonce for `action`, with its expiry
    pub fn issue(&self, action: &str) -> Result<(String, DateTime<Utc>), AgentError> {
        self.issue_at(action, Utc::now())
    }

    pub fn issue_at(
        &self,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AgentError> {
        let expires_at = now + self.lifetime;
        let claims = NonceClaims {
            action: action.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(|e| AgentError::NonceError(format!("Failed to sign nonce: {}", e)))?;
        Ok((token, expires_at))
    }

    /// Fails unless `nonce` was issued by this signer for `action` and has
    /// not expired
    pub fn verify(&self, action: &str, nonce: &str) -> Result<(), AgentError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<NonceClaims>(
            nonce,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map_err(|e| AgentError::NonceError(format!("Invalid nonce: {}", e)))?;

        if data.claims.action != action {
            return Err(AgentError::NonceError(format!(
                "Nonce was issued for {}",
                data.claims.action
            )));
        }
        Ok(())
    }
}
