//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{Authenticator, PasswordConfig, TokenCodec, TokenService};
use crate::repository::{
    postgres, MemoryItemRepository, MemoryTokenBlacklistRepository, MemoryUserRepository,
    PgItemRepository, PgTokenBlacklistRepository, PgUserRepository,
};
use crate::service::{ItemService, UserService};
use payhere_core::config::AppConfig;
use payhere_core::{ItemRepository, TokenBlacklistRepository, UserRepository};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Storage collaborators the state is wired from
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub blacklist: Arc<dyn TokenBlacklistRepository>,
    pub items: Arc<dyn ItemRepository>,
}

impl Repositories {
    /// In-memory stores, for tests and local runs without a database
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryUserRepository::new()),
            blacklist: Arc::new(MemoryTokenBlacklistRepository::new()),
            items: Arc::new(MemoryItemRepository::new()),
        }
    }

    /// PostgreSQL stores; applies migrations when configured
    pub async fn postgres(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = postgres::connect(&config.database).await?;
        if config.database.run_migrations {
            postgres::run_migrations(&pool).await?;
        }

        Ok(Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            blacklist: Arc::new(PgTokenBlacklistRepository::new(pool.clone())),
            items: Arc::new(PgItemRepository::new(pool)),
        })
    }
}

/// Application state shared across handlers
///
/// Built once at startup and never mutated.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Token issue, verification and revocation
    pub tokens: TokenService,
    /// Bearer token checks for gated routes
    pub authenticator: Authenticator,
    pub users: UserService,
    pub items: ItemService,
}

impl AppState {
    /// Wire the services from configuration and storage
    pub fn new(config: AppConfig, repositories: Repositories, password_config: PasswordConfig) -> Self {
        let store_timeout = Duration::from_secs(config.auth.store_timeout_secs);

        let tokens = TokenService::new(TokenCodec::from_config(&config.auth), repositories.blacklist)
            .with_store_timeout(store_timeout);
        let authenticator = Authenticator::new(tokens.clone(), repositories.users.clone());
        let users = UserService::new(repositories.users, tokens.clone(), password_config);
        let items = ItemService::new(repositories.items, store_timeout);

        Self {
            config,
            start_time: Instant::now(),
            tokens,
            authenticator,
            users,
            items,
        }
    }

    /// State over in-memory stores with cheap password hashing
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Repositories::in_memory(), PasswordConfig::minimal())
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(AppConfig::default())
    }
}
