//! Bearer token codec
//!
//! Issues and parses self-contained HS256 tokens. A token is the compact JWT
//! wrapped in standard (padded) base64, so clients treat it as one opaque
//! string.
//!
//! The codec performs no I/O and reads no clock: callers pass `now`, which
//! makes `parse` a pure function of the secret, the token and the time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use payhere_core::{AuthConfig, RepositoryError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of an issued token
pub const TOKEN_LIFETIME_DAYS: i64 = 7;

/// Claims embedded in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// JWT ID, fresh per issuance
    pub jti: String,
    /// Token issuer
    pub iss: String,
    /// Subject - user ID as a decimal string
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

/// Token lifecycle errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Empty identifier")]
    EmptyIdentifier,

    #[error("Empty token")]
    EmptyToken,

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Token expired at {expires_at}")]
    Expired { expires_at: DateTime<Utc> },

    #[error("Malformed token: {0}")]
    Malformed(&'static str),

    #[error("Token is not blacklisted")]
    BlacklistNotFound,

    #[error("Token store {operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("Token store {operation} timed out")]
    Timeout { operation: &'static str },
}

/// Signs and parses bearer tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    lifetime: Duration,
}

impl TokenCodec {
    /// Create a codec with an HMAC secret and the issuer it writes and requires
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is compared against the caller's `now` in `parse`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer,
            lifetime: Duration::days(TOKEN_LIFETIME_DAYS),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.issuer.clone())
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for `subject`
    ///
    /// # Returns
    ///
    /// * `Ok((token, expires_at))` - `expires_at` equals the embedded `exp`
    /// * `Err(TokenError::EmptyIdentifier)` - subject is empty
    /// * `Err(TokenError::Signing)` - the token could not be signed
    pub fn issue(
        &self,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        if subject.is_empty() {
            return Err(TokenError::EmptyIdentifier);
        }

        let iat = now.timestamp();
        let exp = iat + self.lifetime.num_seconds();
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| TokenError::Signing(format!("expiry out of range: {exp}")))?;

        let claims = Claims {
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            iat,
            exp,
        };

        let jwt = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok((STANDARD.encode(jwt), expires_at))
    }

    /// Parse and verify a token at time `now`
    ///
    /// The signature and issuer are checked before expiry, so a forged token
    /// is reported as malformed even when its claimed expiry has passed.
    /// A token whose `exp` is at or before `now` is expired.
    pub fn parse(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        if token.is_empty() {
            return Err(TokenError::EmptyToken);
        }

        let raw = STANDARD
            .decode(token)
            .map_err(|_| TokenError::Malformed("invalid envelope"))?;
        let jwt = String::from_utf8(raw).map_err(|_| TokenError::Malformed("invalid envelope"))?;

        let claims = decode::<Claims>(&jwt, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    TokenError::Malformed("invalid signature")
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    TokenError::Malformed("invalid issuer")
                }
                _ => TokenError::Malformed("invalid claims"),
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(TokenError::Malformed("empty subject"));
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or(TokenError::Malformed("expiry out of range"))?;
        if expires_at <= now {
            return Err(TokenError::Expired { expires_at });
        }

        Ok((claims.sub, expires_at))
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
