//! User account model
//!
//! A `User` is the principal a bearer token resolves to. Its identifier is
//! assigned by storage on creation; before that it is `0`.

use crate::valid::validate_phone_number;
use crate::{truncate_to_seconds, DomainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account
///
/// This maps to the `users` table.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Storage-assigned identifier, `0` until persisted
    pub id: i64,

    /// Phone number used to sign in (unique)
    pub phone_number: String,

    /// Hashed password (PHC string)
    /// This field is never serialized
    #[serde(skip_serializing, default)]
    pub password: String,

    /// Account creation timestamp, whole seconds
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create an unsaved user
    ///
    /// # Arguments
    ///
    /// * `phone_number` - Phone number in canonical format
    /// * `password_hash` - Already hashed password
    /// * `created_at` - Creation time, truncated to seconds
    pub fn new(
        phone_number: impl Into<String>,
        password_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let phone_number = phone_number.into();
        let password = password_hash.into();

        validate_phone_number(&phone_number)?;
        if password.is_empty() {
            return Err(DomainError::InvalidUser("empty password hash".to_string()));
        }

        Ok(Self {
            id: 0,
            phone_number,
            password,
            created_at: truncate_to_seconds(created_at),
        })
    }

    /// Whether storage has assigned an identifier
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Token subject for this user (the identifier as a decimal string)
    pub fn subject(&self) -> String {
        self.id.to_string()
    }

    /// Validate a persisted user
    pub fn validate(&self) -> Result<()> {
        if !self.is_persisted() {
            return Err(DomainError::InvalidUser("zero user id".to_string()));
        }
        if self.password.is_empty() {
            return Err(DomainError::InvalidUser("empty password hash".to_string()));
        }
        validate_phone_number(&self.phone_number)
            .map_err(|e| DomainError::InvalidUser(e.to_string()))?;

        Ok(())
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("phone_number", &self.phone_number)
            .field("password", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}
