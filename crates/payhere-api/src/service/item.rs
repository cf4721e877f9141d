//! Item service
//!
//! Every operation is scoped to the owning user; an item of another user is
//! reported as not found.

use super::bounded;
use crate::error::AppError;
use chrono::Utc;
use payhere_core::{
    Item, ItemPage, ItemQuery, ItemRepository, ItemUpdate, NewItem, RepositoryError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct ItemService {
    items: Arc<dyn ItemRepository>,
    store_timeout: Duration,
}

impl ItemService {
    pub fn new(items: Arc<dyn ItemRepository>, store_timeout: Duration) -> Self {
        Self {
            items,
            store_timeout,
        }
    }

    pub async fn create(&self, user_id: i64, input: NewItem) -> Result<Item, AppError> {
        let item = Item::new(user_id, input, Utc::now())?;

        let item = bounded(self.store_timeout, "create_item", self.items.create(item))
            .await
            .map_err(conflict_or_internal)?;
        debug!(user_id, item_id = item.id, "Item created");

        Ok(item)
    }

    pub async fn get(&self, user_id: i64, item_id: i64) -> Result<Item, AppError> {
        bounded(self.store_timeout, "get_item", self.items.get(user_id, item_id))
            .await
            .map_err(not_found_or_internal)
    }

    /// Apply a partial update; at least one field must be set
    pub async fn update(
        &self,
        user_id: i64,
        item_id: i64,
        update: ItemUpdate,
    ) -> Result<(), AppError> {
        update.validate()?;

        bounded(
            self.store_timeout,
            "update_item",
            self.items.update(user_id, item_id, &update),
        )
        .await
        .map_err(|e| match e {
            RepositoryError::AlreadyExists => AppError::ItemAlreadyExists,
            other => not_found_or_internal(other),
        })
    }

    pub async fn delete(&self, user_id: i64, item_id: i64) -> Result<(), AppError> {
        bounded(self.store_timeout, "delete_item", self.items.delete(user_id, item_id))
            .await
            .map_err(not_found_or_internal)?;
        debug!(user_id, item_id, "Item deleted");

        Ok(())
    }

    /// One page of the user's items in identifier order, after the `search_after` cursor
    pub async fn find(
        &self,
        user_id: i64,
        keyword: Option<String>,
        search_after: Option<i64>,
    ) -> Result<ItemPage, AppError> {
        let query = ItemQuery::new(user_id)
            .with_keyword(keyword.unwrap_or_default())
            .with_search_after(search_after.unwrap_or_default());

        Ok(bounded(self.store_timeout, "find_items", self.items.find(&query)).await?)
    }
}

fn not_found_or_internal(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::ItemNotFound,
        other => other.into(),
    }
}

fn conflict_or_internal(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::AlreadyExists => AppError::ItemAlreadyExists,
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryItemRepository;
    use chrono::Duration as ChronoDuration;
    use payhere_core::ItemSize;

    fn service() -> ItemService {
        ItemService::new(Arc::new(MemoryItemRepository::new()), Duration::from_secs(1))
    }

    fn new_item(name: &str, barcode: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            description: "fresh".to_string(),
            price: 3000,
            cost: 1500,
            category: "fruit".to_string(),
            barcode: barcode.to_string(),
            expiry_at: Utc::now() + ChronoDuration::days(3),
            size: ItemSize::Small,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = service();

        let created = service.create(1, new_item("사과", "8801")).await.unwrap();
        let fetched = service.get(1, created.id).await.unwrap();

        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_items_are_scoped_to_owner() {
        let service = service();
        let created = service.create(1, new_item("사과", "8801")).await.unwrap();

        assert!(matches!(service.get(2, created.id).await, Err(AppError::ItemNotFound)));
        assert!(matches!(
            service.delete(2, created.id).await,
            Err(AppError::ItemNotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_barcode() {
        let service = service();
        service.create(1, new_item("사과", "8801")).await.unwrap();

        let result = service.create(1, new_item("배", "8801")).await;
        assert!(matches!(result, Err(AppError::ItemAlreadyExists)));

        // Another owner may reuse the barcode
        service.create(2, new_item("배", "8801")).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_item() {
        let service = service();

        let result = service.create(1, new_item("", "8801")).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_update() {
        let service = service();
        let created = service.create(1, new_item("사과", "8801")).await.unwrap();

        let empty = service.update(1, created.id, ItemUpdate::default()).await;
        assert!(matches!(empty, Err(AppError::InvalidRequest(_))));

        let update = ItemUpdate {
            price: Some(4000),
            ..Default::default()
        };
        service.update(1, created.id, update.clone()).await.unwrap();
        assert_eq!(service.get(1, created.id).await.unwrap().price, 4000);

        let missing = service.update(1, created.id + 100, update).await;
        assert!(matches!(missing, Err(AppError::ItemNotFound)));
    }

    #[tokio::test]
    async fn test_find_by_keyword_and_initials() {
        let service = service();
        service.create(1, new_item("사과", "1")).await.unwrap();
        service.create(1, new_item("Banana", "2")).await.unwrap();

        let by_initials = service.find(1, Some("ㅅㄱ".into()), None).await.unwrap();
        assert_eq!(by_initials.total_count, 1);
        assert_eq!(by_initials.items[0].name, "사과");

        let by_name = service.find(1, Some("bAn".into()), None).await.unwrap();
        assert_eq!(by_name.items[0].name, "Banana");

        let all = service.find(1, None, None).await.unwrap();
        assert_eq!(all.total_count, 2);
        assert!(!all.has_next);
    }
}
