//! Token service layer
//!
//! Combines the [`TokenCodec`] with the revocation store: issue, verify,
//! revoke and revocation lookup. Every store call is bounded by the
//! configured store timeout and is never retried.

use super::jwt::{TokenCodec, TokenError};
use chrono::{DateTime, Utc};
use payhere_core::{RepositoryError, RevocationRecord, TokenBlacklistRepository};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default bound on a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a store call under `limit`, tagging failures with `operation`
pub(crate) async fn with_store_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, TokenError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(TokenError::Store { operation, source }),
        Err(_) => Err(TokenError::Timeout { operation }),
    }
}

/// Token service
#[derive(Clone)]
pub struct TokenService {
    codec: Arc<TokenCodec>,
    blacklist: Arc<dyn TokenBlacklistRepository>,
    store_timeout: Duration,
}

impl TokenService {
    /// Create a new token service
    pub fn new(codec: TokenCodec, blacklist: Arc<dyn TokenBlacklistRepository>) -> Self {
        Self {
            codec: Arc::new(codec),
            blacklist,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Issue a token for a user identifier
    ///
    /// No storage is touched.
    pub fn create(&self, identifier: &str) -> Result<(String, DateTime<Utc>), TokenError> {
        if identifier.is_empty() {
            return Err(TokenError::EmptyIdentifier);
        }

        self.codec.issue(identifier, Utc::now())
    }

    /// Verify a token and return its identifier and expiry
    ///
    /// This never consults the revocation store; callers that must reject
    /// revoked tokens follow up with [`TokenService::get_blacklist`].
    pub fn verify(&self, token: &str) -> Result<(String, DateTime<Utc>), TokenError> {
        if token.is_empty() {
            return Err(TokenError::EmptyToken);
        }

        self.codec.parse(token, Utc::now())
    }

    /// Revoke a token
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The token is revoked, was already revoked, or has expired
    ///   (an expired token needs no record)
    /// * `Err(TokenError)` - The token is empty or malformed, or the store failed
    pub async fn register_blacklist(&self, token: &str) -> Result<(), TokenError> {
        if token.is_empty() {
            return Err(TokenError::EmptyToken);
        }

        let expires_at = match self.verify(token) {
            Ok((_, expires_at)) => expires_at,
            Err(TokenError::Expired { expires_at }) => {
                debug!(%expires_at, "Skipping revocation of expired token");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let record = RevocationRecord::new(token, expires_at)
            .map_err(|_| TokenError::EmptyToken)?;

        match with_store_timeout(
            self.store_timeout,
            "create_blacklist",
            self.blacklist.create(&record),
        )
        .await
        {
            Ok(()) => {
                debug!(%expires_at, "Token revoked");
                Ok(())
            }
            Err(TokenError::Store {
                source: RepositoryError::AlreadyExists,
                ..
            }) => {
                debug!("Token already revoked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Look up the revocation record of a token
    ///
    /// An absent record is the common case and yields
    /// `TokenError::BlacklistNotFound`.
    pub async fn get_blacklist(&self, token: &str) -> Result<RevocationRecord, TokenError> {
        if token.is_empty() {
            return Err(TokenError::EmptyToken);
        }

        match with_store_timeout(self.store_timeout, "get_blacklist", self.blacklist.get(token))
            .await
        {
            Err(TokenError::Store {
                source: RepositoryError::NotFound,
                ..
            }) => Err(TokenError::BlacklistNotFound),
            other => other,
        }
    }

    /// Delete revocation records whose tokens have expired
    pub async fn prune_expired(&self) -> Result<u64, TokenError> {
        let deleted = with_store_timeout(
            self.store_timeout,
            "delete_expired_blacklist",
            self.blacklist.delete_expired(Utc::now()),
        )
        .await?;

        if deleted > 0 {
            info!(deleted, "Pruned expired revocation records");
        }
        Ok(deleted)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("codec", &self.codec)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryTokenBlacklistRepository;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> (TokenService, Arc<MemoryTokenBlacklistRepository>) {
        let store = Arc::new(MemoryTokenBlacklistRepository::new());
        let service = TokenService::new(TokenCodec::new("test-secret", "payhere"), store.clone());
        (service, store)
    }

    /// Blacklist store that fails every call and counts them
    #[derive(Default)]
    struct FailingBlacklist {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenBlacklistRepository for FailingBlacklist {
        async fn create(&self, _record: &RevocationRecord) -> Result<(), RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::Database("connection refused".to_string()))
        }

        async fn get(&self, _token: &str) -> Result<RevocationRecord, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::Database("connection refused".to_string()))
        }

        async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::Database("connection refused".to_string()))
        }
    }

    /// Blacklist store that never answers
    struct StalledBlacklist;

    #[async_trait::async_trait]
    impl TokenBlacklistRepository for StalledBlacklist {
        async fn create(&self, _record: &RevocationRecord) -> Result<(), RepositoryError> {
            std::future::pending().await
        }

        async fn get(&self, _token: &str) -> Result<RevocationRecord, RepositoryError> {
            std::future::pending().await
        }

        async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, RepositoryError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_create_and_verify() {
        let (service, _) = service();

        let (token, expires_at) = service.create("7").unwrap();
        let (identifier, verified_expiry) = service.verify(&token).unwrap();

        assert_eq!(identifier, "7");
        assert_eq!(verified_expiry, expires_at);
    }

    #[test]
    fn test_empty_inputs() {
        let (service, _) = service();

        assert!(matches!(service.create(""), Err(TokenError::EmptyIdentifier)));
        assert!(matches!(service.verify(""), Err(TokenError::EmptyToken)));
    }

    #[tokio::test]
    async fn test_register_and_get_blacklist() {
        let (service, store) = service();
        let (token, expires_at) = service.create("7").unwrap();

        assert!(matches!(
            service.get_blacklist(&token).await,
            Err(TokenError::BlacklistNotFound)
        ));

        service.register_blacklist(&token).await.unwrap();

        let record = service.get_blacklist(&token).await.unwrap();
        assert_eq!(record.token, token);
        assert_eq!(record.expires_at, expires_at);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_register_blacklist_is_idempotent() {
        let (service, store) = service();
        let (token, _) = service.create("7").unwrap();

        service.register_blacklist(&token).await.unwrap();
        let first = service.get_blacklist(&token).await.unwrap();

        service.register_blacklist(&token).await.unwrap();
        let second = service.get_blacklist(&token).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_register_expired_token_is_noop() {
        let (service, store) = service();
        let issued_at = Utc::now() - ChronoDuration::days(8);
        let (token, _) = service.codec().issue("7", issued_at).unwrap();

        service.register_blacklist(&token).await.unwrap();

        assert_eq!(store.len(), 0);
        assert!(matches!(
            service.get_blacklist(&token).await,
            Err(TokenError::BlacklistNotFound)
        ));
    }

    #[tokio::test]
    async fn test_register_malformed_token_fails_without_write() {
        let failing = Arc::new(FailingBlacklist::default());
        let service = TokenService::new(TokenCodec::new("test-secret", "payhere"), failing.clone());

        let result = service.register_blacklist("garbage").await;

        assert!(matches!(result, Err(TokenError::Malformed(_))));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let failing = Arc::new(FailingBlacklist::default());
        let service = TokenService::new(TokenCodec::new("test-secret", "payhere"), failing.clone());
        let (token, _) = service.create("7").unwrap();

        assert!(matches!(
            service.register_blacklist(&token).await,
            Err(TokenError::Store {
                operation: "create_blacklist",
                ..
            })
        ));
        assert!(matches!(
            service.get_blacklist(&token).await,
            Err(TokenError::Store {
                operation: "get_blacklist",
                ..
            })
        ));
        assert!(service.prune_expired().await.is_err());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_store_timeout() {
        let service = TokenService::new(
            TokenCodec::new("test-secret", "payhere"),
            Arc::new(StalledBlacklist),
        )
        .with_store_timeout(Duration::from_millis(50));
        let (token, _) = service.create("7").unwrap();

        assert!(matches!(
            service.get_blacklist(&token).await,
            Err(TokenError::Timeout {
                operation: "get_blacklist"
            })
        ));
        assert!(matches!(
            service.register_blacklist(&token).await,
            Err(TokenError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let (service, store) = service();
        let (live, _) = service.create("7").unwrap();
        service.register_blacklist(&live).await.unwrap();

        let stale = RevocationRecord::new("stale", Utc::now() - ChronoDuration::hours(1)).unwrap();
        store.create(&stale).await.unwrap();
        assert_eq!(store.len(), 2);

        assert_eq!(service.prune_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(service.get_blacklist(&live).await.is_ok());
    }
}
