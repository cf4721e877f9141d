//! Revocation records for signed-out tokens

use crate::{truncate_to_seconds, DomainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A revoked token that has not expired yet
///
/// `expires_at` is copied from the token's own expiry claim; once it has
/// passed the record is redundant, because the token is rejected as expired
/// anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRecord {
    /// The token string exactly as presented by the client
    pub token: String,

    /// Expiry of the token, whole seconds
    pub expires_at: DateTime<Utc>,
}

impl RevocationRecord {
    /// Create a new revocation record
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(DomainError::EmptyToken);
        }

        Ok(Self {
            token,
            expires_at: truncate_to_seconds(expires_at),
        })
    }

    /// Whether the underlying token has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
