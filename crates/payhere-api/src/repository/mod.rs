//! Storage backends for the repository traits
//!
//! - `postgres`: sqlx-backed stores used in production
//! - `memory`: mutex-guarded maps for tests and `serve --in-memory`

pub mod memory;
pub mod postgres;

pub use memory::{MemoryItemRepository, MemoryTokenBlacklistRepository, MemoryUserRepository};
pub use postgres::{PgItemRepository, PgTokenBlacklistRepository, PgUserRepository};
