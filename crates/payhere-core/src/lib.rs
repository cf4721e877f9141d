//! payhere core - domain models, validation rules and shared types
//!
//! This crate defines the abstractions shared by the API server:
//! - Users (the authenticated principal) and their credential rules
//! - Items owned by a user
//! - Revocation records for signed-out bearer tokens
//! - Repository traits for the storage collaborators
//! - Configuration management

pub mod config;
pub mod item;
pub mod repository;
pub mod token;
pub mod user;
pub mod valid;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
pub use item::{Item, ItemSize, ItemUpdate, NewItem};
pub use repository::{
    ItemPage, ItemQuery, ItemRepository, RepositoryError, TokenBlacklistRepository,
    UserRepository,
};
pub use token::RevocationRecord;
pub use user::User;

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Validation failures of domain values
///
/// These never carry a plaintext password; the password variant only names
/// the rule that was violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid phone number: {0:?}")]
    InvalidPhoneNumber(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(&'static str),

    #[error("Invalid user: {0}")]
    InvalidUser(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Undefined item size: {0:?}")]
    UndefinedItemSize(String),

    #[error("Empty token")]
    EmptyToken,
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Truncate a timestamp to whole seconds, the resolution every stored
/// timestamp and every token claim uses.
pub fn truncate_to_seconds(
    at: chrono::DateTime<chrono::Utc>,
) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}
