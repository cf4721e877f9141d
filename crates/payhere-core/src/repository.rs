//! Storage collaborator traits
//!
//! Every backing store (PostgreSQL, in-memory) implements these traits. The
//! traits only promise atomic single-row operations; uniqueness is enforced
//! by the store and surfaced as [`RepositoryError::AlreadyExists`].

use crate::item::PAGE_SIZE;
use crate::{Item, ItemUpdate, RevocationRecord, User};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists")]
    AlreadyExists,

    #[error("Database error: {0}")]
    Database(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }
}

/// User storage
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user and return it with its assigned id
    ///
    /// A duplicate phone number fails with `AlreadyExists`.
    async fn create(&self, user: User) -> Result<User, RepositoryError>;

    /// Get a user by id
    async fn get(&self, user_id: i64) -> Result<User, RepositoryError>;

    /// Get a user by phone number
    async fn get_by_phone_number(&self, phone_number: &str) -> Result<User, RepositoryError>;
}

/// Revoked token storage
#[async_trait::async_trait]
pub trait TokenBlacklistRepository: Send + Sync {
    /// Insert a record; an existing record for the same token fails with
    /// `AlreadyExists` and leaves the stored record untouched.
    async fn create(&self, record: &RevocationRecord) -> Result<(), RepositoryError>;

    /// Point lookup by token string
    async fn get(&self, token: &str) -> Result<RevocationRecord, RepositoryError>;

    /// Delete records whose token expired at or before `now`
    ///
    /// Returns the number of deleted records.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Item search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub user_id: i64,

    /// Name keyword; empty matches everything
    pub keyword: String,

    /// Only items with an id greater than this are returned; 0 starts from
    /// the beginning
    pub search_after: i64,

    pub limit: usize,
}

impl ItemQuery {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            keyword: String::new(),
            search_after: 0,
            limit: PAGE_SIZE,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn with_search_after(mut self, search_after: i64) -> Self {
        self.search_after = search_after.max(0);
        self
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPage {
    /// Number of matching items, ignoring the cursor
    pub total_count: i64,

    /// Items in ascending id order
    pub items: Vec<Item>,

    /// Whether more matching items follow this page
    pub has_next: bool,

    /// Cursor for the next page: id of the last returned item, or 0
    pub search_after: i64,
}

/// Item storage; every operation is scoped by owner
#[async_trait::async_trait]
pub trait ItemRepository: Send + Sync {
    /// Persist a new item; a duplicate `(user_id, barcode)` fails with
    /// `AlreadyExists`.
    async fn create(&self, item: Item) -> Result<Item, RepositoryError>;

    async fn get(&self, user_id: i64, item_id: i64) -> Result<Item, RepositoryError>;

    async fn update(
        &self,
        user_id: i64,
        item_id: i64,
        update: &ItemUpdate,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, user_id: i64, item_id: i64) -> Result<(), RepositoryError>;

    async fn find(&self, query: &ItemQuery) -> Result<ItemPage, RepositoryError>;
}
