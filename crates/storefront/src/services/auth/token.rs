//! HS256 access tokens.
//!
//! Standard JWTs signed with the shared token secret. Claims carry the user
//! id, email and role so request handlers can authorize without a database
//! round trip.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lumiere_core::{Email, Role, UserId};

use crate::models::CurrentUser;

/// Token failures.
///
/// The variants exist for logging; clients only ever see "invalid token".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token could not be signed")]
    Signing,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::BadSignature,
            _ => Self::Malformed,
        }
    }
}

/// Claims carried in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: Email,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// An issued token and its expiry.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenSigner {
    /// Create a signer with the given lifetime.
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        // HS256 only, `exp` required and checked without leeway
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }

    /// Issue a token for `user` valid from `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be encoded.
    pub fn issue_at(
        &self,
        user: &CurrentUser,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to sign access token");
                TokenError::Signing
            })?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Issue a token valid from now.
    ///
    /// # Errors
    ///
    /// See [`TokenSigner::issue_at`].
    pub fn issue(&self, user: &CurrentUser) -> Result<IssuedToken, TokenError> {
        self.issue_at(user, Utc::now())
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` for malformed tokens, bad signatures, other
    /// algorithms and expired tokens.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;

    const SECRET: &str = "kQ8#vN2$pL5@xR9!mT4&wZ7*bH3^cJ6%";

    fn signer() -> TokenSigner {
        TokenSigner::new(&SecretString::from(SECRET), Duration::hours(24))
    }

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(42),
            email: Email::parse("anna@lumiere.shop").unwrap(),
            role,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let issued = signer().issue(&user(Role::Admin)).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);

        let claims = signer().verify(&issued.token).unwrap();
        assert_eq!(claims.sub, UserId::new(42));
        assert_eq!(claims.email.as_str(), "anna@lumiere.shop");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_header_is_hs256_jwt() {
        let issued = signer().issue(&user(Role::User)).unwrap();
        let header = jsonwebtoken::decode_header(&issued.token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issued_at = Utc::now() - Duration::hours(25);
        let issued = signer().issue_at(&user(Role::User), issued_at).unwrap();
        assert_eq!(signer().verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let issued = signer().issue(&user(Role::User)).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let forged_claims = Claims {
            role: Role::Admin,
            ..signer().verify(&issued.token).unwrap()
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(signer().verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_other_secret_rejected() {
        let issued = signer().issue(&user(Role::User)).unwrap();
        let other = TokenSigner::new(
            &SecretString::from("Zx7!Qw3@Er5#Ty9$Ui2%Op4^As6&Df8*"),
            Duration::hours(24),
        );
        assert_eq!(other.verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let claims = Claims {
            sub: UserId::new(42),
            email: Email::parse("anna@lumiere.shop").unwrap(),
            role: Role::Admin,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(signer().verify(&token).is_err());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for token in ["", "abc", "a.b", "a.b.c.d", "a.b.!!!"] {
            assert!(signer().verify(token).is_err(), "{token:?}");
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", signer());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("kQ8#"));
    }
}
