//! HS256 bearer tokens.
//!
//! A token carries the display name in a `username` claim and expires after
//! the configured TTL:
//!
//! ```text
//! header  {"alg":"HS256","typ":"JWT"}
//! claims  {"username":"alice","iat":1700000000,"exp":1700003600}
//! ```
//!
//! [`JwtAuthority`] both issues tokens (the `token` CLI subcommand) and
//! verifies them at WebSocket handshake time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chatroom_core::{Identity, IdentityVerifier, VerifyError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from [`JwtAuthority::issue`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    /// Issued at, seconds since the Unix epoch.
    #[serde(default)]
    pub iat: u64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Issues and verifies HS256 tokens with one shared secret.
pub struct JwtAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    allow_anonymous: bool,
}

impl JwtAuthority {
    /// Creates an authority that requires a valid token on every connection.
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
            allow_anonymous: false,
        }
    }

    /// Admits connections that present no token as anonymous.
    ///
    /// A token that is presented must still verify.
    pub fn allowing_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    /// Signs a token for `username` valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// - [`AuthError::EmptyUsername`] for a blank name.
    /// - [`AuthError::Signing`] if encoding fails.
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        let now = unix_now();
        let claims = Claims {
            username: username.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Decodes and validates `token`, returning its claims.
    ///
    /// # Errors
    ///
    /// [`VerifyError::Expired`] for an expired token, [`VerifyError::Invalid`]
    /// for anything else (bad signature, malformed, wrong algorithm).
    pub fn decode_claims(&self, token: &str) -> Result<Claims, VerifyError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid(e.to_string()),
            })
    }
}

impl IdentityVerifier for JwtAuthority {
    fn verify(&self, credential: Option<&str>) -> Result<Identity, VerifyError> {
        let token = match credential.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None if self.allow_anonymous => return Ok(Identity::anonymous()),
            None => return Err(VerifyError::Missing),
        };

        let claims = self.decode_claims(token)?;
        let identity = Identity::new(claims.username);
        if identity.is_anonymous() {
            return Err(VerifyError::Invalid("empty username claim".to_string()));
        }
        debug!(identity = %identity, "token verified");
        Ok(identity)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn authority() -> JwtAuthority {
        JwtAuthority::new(SECRET, Duration::from_secs(3600))
    }

    /// Signs arbitrary claims with `secret`, bypassing `issue`.
    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_then_verify_yields_username() {
        // Arrange
        let auth = authority();

        // Act
        let token = auth.issue("alice").unwrap();
        let identity = auth.verify(Some(&token)).unwrap();

        // Assert
        assert_eq!(identity.label(), Some("alice"));
    }

    #[test]
    fn test_issued_token_expires_after_ttl() {
        let auth = authority();
        let token = auth.issue("alice").unwrap();
        let claims = auth.decode_claims(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_huge_ttl_saturates_expiry() {
        // Arrange
        let auth = JwtAuthority::new(SECRET, Duration::from_secs(u64::MAX));

        // Act
        let token = auth.issue("alice").unwrap();

        // Assert
        let claims = auth.decode_claims(&token).unwrap();
        assert_eq!(claims.exp, u64::MAX);
    }

    #[test]
    fn test_issue_rejects_blank_username() {
        assert!(matches!(authority().issue("   "), Err(AuthError::EmptyUsername)));
    }

    #[test]
    fn test_missing_token_is_rejected_when_required() {
        assert_eq!(authority().verify(None), Err(VerifyError::Missing));
        assert_eq!(authority().verify(Some("")), Err(VerifyError::Missing));
    }

    #[test]
    fn test_missing_token_is_anonymous_when_allowed() {
        let auth = authority().allowing_anonymous();
        assert!(auth.verify(None).unwrap().is_anonymous());
    }

    #[test]
    fn test_bad_token_is_rejected_even_when_anonymous_allowed() {
        let auth = authority().allowing_anonymous();
        assert!(matches!(
            auth.verify(Some("not-a-jwt")),
            Err(VerifyError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected_as_expired() {
        // Arrange: expired well outside the default 60s leeway.
        let now = unix_now();
        let claims = Claims {
            username: "alice".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = sign(&claims, SECRET);

        // Act / Assert
        assert_eq!(authority().verify(Some(&token)), Err(VerifyError::Expired));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_invalid() {
        let claims = Claims {
            username: "mallory".to_string(),
            iat: unix_now(),
            exp: unix_now() + 600,
        };
        let token = sign(&claims, "someone-elses-secret");
        assert!(matches!(
            authority().verify(Some(&token)),
            Err(VerifyError::Invalid(_))
        ));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        // Swap the payload segment for one naming a different user.
        let auth = authority();
        let alice = auth.issue("alice").unwrap();
        let mallory = sign(
            &Claims {
                username: "mallory".to_string(),
                iat: unix_now(),
                exp: unix_now() + 600,
            },
            "other",
        );
        let a: Vec<&str> = alice.split('.').collect();
        let m: Vec<&str> = mallory.split('.').collect();
        let forged = format!("{}.{}.{}", a[0], m[1], a[2]);

        assert!(matches!(auth.verify(Some(&forged)), Err(VerifyError::Invalid(_))));
    }

    #[test]
    fn test_blank_username_claim_is_invalid() {
        let token = sign(
            &Claims {
                username: "  ".to_string(),
                iat: unix_now(),
                exp: unix_now() + 600,
            },
            SECRET,
        );
        assert!(matches!(
            authority().verify(Some(&token)),
            Err(VerifyError::Invalid(_))
        ));
    }
}
