//! Service layer
//!
//! Business logic between the HTTP handlers and the repositories. Services
//! return [`AppError`](crate::error::AppError) so handlers stay thin.

pub mod item;
pub mod user;

pub use item::ItemService;
pub use user::UserService;

use payhere_core::RepositoryError;
use std::future::Future;
use std::time::Duration;

/// Run a repository call under `limit`
///
/// A call that does not finish in time fails with `RepositoryError::Database`
/// naming the operation.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| RepositoryError::Database(format!("{operation} timed out after {limit:?}")))?
}
