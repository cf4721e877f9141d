//! PostgreSQL repositories
//!
//! Uniqueness (phone number, revoked token, per-user barcode) is enforced by
//! table constraints; a violation (SQLSTATE 23505) surfaces as
//! [`RepositoryError::AlreadyExists`].
//!
//! Author: hephaex@gmail.com

use chrono::{DateTime, Utc};
use payhere_core::item::initial_consonants;
use payhere_core::{
    DatabaseConfig, Item, ItemPage, ItemQuery, ItemRepository, ItemSize, ItemUpdate,
    RepositoryError, RevocationRecord, TokenBlacklistRepository, User, UserRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Open a connection pool
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!(pool_size = config.pool_size, "PostgreSQL connection established");

    Ok(pool)
}

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            RepositoryError::AlreadyExists
        }
        other => RepositoryError::Database(other.to_string()),
    }
}

/// Escape LIKE wildcards so a keyword only matches literally
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    phone_number: String,
    password: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.user_id,
            phone_number: row.phone_number,
            password: row.password,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL user store
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (phone_number, password, created_at)
            VALUES ($1, $2, $3)
            RETURNING user_id, phone_number, password, created_at
            "#,
        )
        .bind(&user.phone_number)
        .bind(&user.password)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map(User::from)
        .map_err(map_sqlx_error)
    }

    async fn get(&self, user_id: i64) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT user_id, phone_number, password, created_at FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map(User::from)
        .map_err(map_sqlx_error)
    }

    async fn get_by_phone_number(&self, phone_number: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT user_id, phone_number, password, created_at FROM users WHERE phone_number = $1",
        )
        .bind(phone_number)
        .fetch_one(&self.pool)
        .await
        .map(User::from)
        .map_err(map_sqlx_error)
    }
}

// ============================================================================
// Token blacklist
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct RevocationRow {
    token: String,
    expires_at: DateTime<Utc>,
}

/// PostgreSQL revocation store
#[derive(Debug, Clone)]
pub struct PgTokenBlacklistRepository {
    pool: PgPool,
}

impl PgTokenBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TokenBlacklistRepository for PgTokenBlacklistRepository {
    async fn create(&self, record: &RevocationRecord) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO token_blacklist (token, expires_at) VALUES ($1, $2)")
            .bind(&record.token)
            .bind(record.expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get(&self, token: &str) -> Result<RevocationRecord, RepositoryError> {
        let row = sqlx::query_as::<_, RevocationRow>(
            "SELECT token, expires_at FROM token_blacklist WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(RevocationRecord {
            token: row.token,
            expires_at: row.expires_at,
        })
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Items
// ============================================================================

const ITEM_COLUMNS: &str = "item_id, user_id, item_name, description, price, cost, \
                            category, barcode, item_size, expiry_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    item_id: i64,
    user_id: i64,
    item_name: String,
    description: String,
    price: i64,
    cost: i64,
    category: String,
    barcode: String,
    item_size: String,
    expiry_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let size: ItemSize = row
            .item_size
            .parse()
            .map_err(|e: payhere_core::DomainError| RepositoryError::Database(e.to_string()))?;

        Ok(Self {
            id: row.item_id,
            user_id: row.user_id,
            name: row.item_name,
            description: row.description,
            price: row.price,
            cost: row.cost,
            category: row.category,
            barcode: row.barcode,
            expiry_at: row.expiry_at,
            size,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL item store
#[derive(Debug, Clone)]
pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count matching items with an id greater than `after`
    async fn count(&self, user_id: i64, keyword: &str, after: i64) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM items
            WHERE user_id = $1
              AND item_id > $2
              AND ($3 = '' OR item_name ILIKE '%' || $3 || '%' OR item_name_initials LIKE '%' || $3 || '%')
            "#,
        )
        .bind(user_id)
        .bind(after)
        .bind(keyword)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait::async_trait]
impl ItemRepository for PgItemRepository {
    async fn create(&self, item: Item) -> Result<Item, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items (user_id, item_name, item_name_initials, description, price, cost,
                               category, barcode, item_size, expiry_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.user_id)
        .bind(&item.name)
        .bind(item.name_initials())
        .bind(&item.description)
        .bind(item.price)
        .bind(item.cost)
        .bind(&item.category)
        .bind(&item.barcode)
        .bind(item.size.as_str())
        .bind(item.expiry_at)
        .bind(item.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Item::try_from(row)
    }

    async fn get(&self, user_id: i64, item_id: i64) -> Result<Item, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE user_id = $1 AND item_id = $2"
        ))
        .bind(user_id)
        .bind(item_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Item::try_from(row)
    }

    async fn update(
        &self,
        user_id: i64,
        item_id: i64,
        update: &ItemUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE items SET
                item_name = COALESCE($3, item_name),
                item_name_initials = COALESCE($4, item_name_initials),
                description = COALESCE($5, description),
                price = COALESCE($6, price),
                cost = COALESCE($7, cost),
                category = COALESCE($8, category),
                barcode = COALESCE($9, barcode),
                item_size = COALESCE($10, item_size),
                expiry_at = COALESCE($11, expiry_at)
            WHERE user_id = $1 AND item_id = $2
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .bind(update.name.as_deref())
        .bind(update.name.as_deref().map(initial_consonants))
        .bind(update.description.as_deref())
        .bind(update.price)
        .bind(update.cost)
        .bind(update.category.as_deref())
        .bind(update.barcode.as_deref())
        .bind(update.size.map(|size| size.as_str()))
        .bind(update.expiry_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, user_id: i64, item_id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM items WHERE user_id = $1 AND item_id = $2")
            .bind(user_id)
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find(&self, query: &ItemQuery) -> Result<ItemPage, RepositoryError> {
        let keyword = escape_like(&query.keyword);
        let total_count = self.count(query.user_id, &keyword, 0).await?;

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM items
            WHERE user_id = $1
              AND item_id > $2
              AND ($3 = '' OR item_name ILIKE '%' || $3 || '%' OR item_name_initials LIKE '%' || $3 || '%')
            ORDER BY item_id ASC
            LIMIT $4
            "#
        ))
        .bind(query.user_id)
        .bind(query.search_after)
        .bind(&keyword)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let items = rows
            .into_iter()
            .map(Item::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let search_after = items.last().map(|item| item.id).unwrap_or(0);
        let has_next = search_after > 0
            && self.count(query.user_id, &keyword, search_after).await? > 0;

        Ok(ItemPage {
            total_count,
            items,
            has_next,
            search_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("latte"), "latte");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(map_sqlx_error(sqlx::Error::RowNotFound).is_not_found());
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepositoryError::Database(_)
        ));
    }

    #[test]
    fn test_item_row_conversion() {
        let now = Utc::now();
        let row = ItemRow {
            item_id: 1,
            user_id: 2,
            item_name: "Latte".to_string(),
            description: "hot".to_string(),
            price: 5000,
            cost: 1500,
            category: "coffee".to_string(),
            barcode: "A-1".to_string(),
            item_size: "large".to_string(),
            expiry_at: now,
            created_at: now,
        };

        let item = Item::try_from(row).unwrap();
        assert_eq!(item.size, ItemSize::Large);
        assert_eq!(item.user_id, 2);
    }
}
