//! In-memory repositories
//!
//! Back the integration tests and `serve --in-memory`. Each store guards its
//! tables with a single mutex, which gives the same single-row atomicity the
//! database provides through its unique constraints.

use chrono::{DateTime, Utc};
use payhere_core::{
    Item, ItemPage, ItemQuery, ItemRepository, ItemUpdate, RepositoryError, RevocationRecord,
    TokenBlacklistRepository, User, UserRepository,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Default)]
struct UserTable {
    last_id: i64,
    rows: BTreeMap<i64, User>,
}

/// In-memory user store
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    table: Mutex<UserTable>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, mut user: User) -> Result<User, RepositoryError> {
        let mut table = lock(&self.table);
        if table
            .rows
            .values()
            .any(|existing| existing.phone_number == user.phone_number)
        {
            return Err(RepositoryError::AlreadyExists);
        }

        table.last_id += 1;
        user.id = table.last_id;
        table.rows.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get(&self, user_id: i64) -> Result<User, RepositoryError> {
        lock(&self.table)
            .rows
            .get(&user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_phone_number(&self, phone_number: &str) -> Result<User, RepositoryError> {
        lock(&self.table)
            .rows
            .values()
            .find(|user| user.phone_number == phone_number)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }
}

// ============================================================================
// Token blacklist
// ============================================================================

/// In-memory revocation store
#[derive(Debug, Default)]
pub struct MemoryTokenBlacklistRepository {
    records: Mutex<HashMap<String, RevocationRecord>>,
}

impl MemoryTokenBlacklistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl TokenBlacklistRepository for MemoryTokenBlacklistRepository {
    async fn create(&self, record: &RevocationRecord) -> Result<(), RepositoryError> {
        let mut records = lock(&self.records);
        if records.contains_key(&record.token) {
            return Err(RepositoryError::AlreadyExists);
        }

        records.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<RevocationRecord, RepositoryError> {
        lock(&self.records)
            .get(token)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));

        Ok((before - records.len()) as u64)
    }
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Default)]
struct ItemTable {
    last_id: i64,
    rows: BTreeMap<i64, Item>,
}

impl ItemTable {
    fn barcode_taken(&self, user_id: i64, barcode: &str, except_id: i64) -> bool {
        self.rows.values().any(|item| {
            item.user_id == user_id && item.barcode == barcode && item.id != except_id
        })
    }

    fn owned_mut(&mut self, user_id: i64, item_id: i64) -> Option<&mut Item> {
        self.rows
            .get_mut(&item_id)
            .filter(|item| item.user_id == user_id)
    }
}

/// In-memory item store
#[derive(Debug, Default)]
pub struct MemoryItemRepository {
    table: Mutex<ItemTable>,
}

impl MemoryItemRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ItemRepository for MemoryItemRepository {
    async fn create(&self, mut item: Item) -> Result<Item, RepositoryError> {
        let mut table = lock(&self.table);
        if table.barcode_taken(item.user_id, &item.barcode, 0) {
            return Err(RepositoryError::AlreadyExists);
        }

        table.last_id += 1;
        item.id = table.last_id;
        table.rows.insert(item.id, item.clone());

        Ok(item)
    }

    async fn get(&self, user_id: i64, item_id: i64) -> Result<Item, RepositoryError> {
        lock(&self.table)
            .rows
            .get(&item_id)
            .filter(|item| item.user_id == user_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update(
        &self,
        user_id: i64,
        item_id: i64,
        update: &ItemUpdate,
    ) -> Result<(), RepositoryError> {
        let mut table = lock(&self.table);
        if let Some(barcode) = &update.barcode {
            if table.barcode_taken(user_id, barcode, item_id) {
                return Err(RepositoryError::AlreadyExists);
            }
        }

        let item = table
            .owned_mut(user_id, item_id)
            .ok_or(RepositoryError::NotFound)?;
        update.apply(item);

        Ok(())
    }

    async fn delete(&self, user_id: i64, item_id: i64) -> Result<(), RepositoryError> {
        let mut table = lock(&self.table);
        if table.owned_mut(user_id, item_id).is_none() {
            return Err(RepositoryError::NotFound);
        }

        table.rows.remove(&item_id);
        Ok(())
    }

    async fn find(&self, query: &ItemQuery) -> Result<ItemPage, RepositoryError> {
        let table = lock(&self.table);
        let matching: Vec<&Item> = table
            .rows
            .values()
            .filter(|item| item.user_id == query.user_id && item.matches_keyword(&query.keyword))
            .collect();

        let items: Vec<Item> = matching
            .iter()
            .filter(|item| item.id > query.search_after)
            .take(query.limit)
            .map(|item| (*item).clone())
            .collect();

        let search_after = items.last().map(|item| item.id).unwrap_or(0);
        let has_next =
            search_after > 0 && matching.iter().any(|item| item.id > search_after);

        Ok(ItemPage {
            total_count: matching.len() as i64,
            items,
            has_next,
            search_after,
        })
    }
}
