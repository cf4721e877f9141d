/// Authentication middleware for protecting routes
///
/// Extracts the bearer token from the Authorization header and runs it
/// through a fixed sequence of checks, stopping at the first failure:
///
/// 1. extract the token
/// 2. verify signature, issuer and expiry
/// 3. reject revoked tokens
/// 4. resolve the user named by the token subject
///
/// On success the resolved user is added to the request extensions as
/// [`CurrentUser`].
use super::jwt::TokenError;
use super::service::{with_store_timeout, TokenService};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use payhere_core::{RepositoryError, User, UserRepository};
use std::sync::Arc;
use thiserror::Error;

/// Authenticated user attached to a request
///
/// Handlers extract it with `Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("empty token")]
    MissingToken,

    #[error("expired token")]
    ExpiredToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("blacklisted token")]
    RevokedToken,

    #[error("user not found")]
    UnknownUser,

    #[error("authentication failed: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ExpiredToken => AppError::ExpiredToken,
            AuthError::Internal(msg) => AppError::Internal(msg),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Resolves a bearer token to a user
#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenService,
    users: Arc<dyn UserRepository>,
}

impl Authenticator {
    pub fn new(tokens: TokenService, users: Arc<dyn UserRepository>) -> Self {
        Self { tokens, users }
    }

    /// Run the token checks in order and return the principal
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let (identifier, _) = self.tokens.verify(token).map_err(|e| match e {
            TokenError::Expired { .. } => AuthError::ExpiredToken,
            TokenError::EmptyToken => AuthError::MissingToken,
            TokenError::Malformed(_) => AuthError::InvalidToken,
            other => AuthError::Internal(other.to_string()),
        })?;

        match self.tokens.get_blacklist(token).await {
            Ok(_) => return Err(AuthError::RevokedToken),
            Err(TokenError::BlacklistNotFound) => {}
            Err(e) => return Err(AuthError::Internal(e.to_string())),
        }

        let user_id: i64 = identifier
            .parse()
            .map_err(|_| AuthError::Internal(format!("non-numeric subject: {identifier:?}")))?;

        match with_store_timeout(self.tokens.store_timeout(), "get_user", self.users.get(user_id))
            .await
        {
            Ok(user) => Ok(user),
            Err(TokenError::Store {
                source: RepositoryError::NotFound,
                ..
            }) => Err(AuthError::UnknownUser),
            Err(e) => Err(AuthError::Internal(e.to_string())),
        }
    }
}

/// Extract the token of an `Authorization: Bearer <token>` header
///
/// Returns `None` when the header is missing, not a bearer header or empty.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that requires a valid, unrevoked token
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use payhere_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/v1/users/me", get(me_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(request.headers())
        .map(str::to_owned)
        .unwrap_or_default();

    match state.authenticator.authenticate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        Err(e) => {
            if !matches!(e, AuthError::Internal(_)) {
                audit_log(&AuditEvent::InvalidToken {
                    ip_address: extract_ip_address(request.headers()),
                    user_agent: extract_user_agent(request.headers()),
                    reason: e.to_string(),
                });
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenCodec;
    use crate::repository::memory::{MemoryTokenBlacklistRepository, MemoryUserRepository};
    use axum::http::HeaderValue;
    use chrono::{DateTime, Duration, Utc};
    use payhere_core::{RevocationRecord, TokenBlacklistRepository};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts every call before delegating to the in-memory stores
    #[derive(Default)]
    struct Spy {
        blacklist: MemoryTokenBlacklistRepository,
        users: MemoryUserRepository,
        blacklist_calls: AtomicUsize,
        user_calls: AtomicUsize,
    }

    struct SpyBlacklist(Arc<Spy>);
    struct SpyUsers(Arc<Spy>);

    #[async_trait::async_trait]
    impl TokenBlacklistRepository for SpyBlacklist {
        async fn create(&self, record: &RevocationRecord) -> Result<(), RepositoryError> {
            self.0.blacklist_calls.fetch_add(1, Ordering::SeqCst);
            self.0.blacklist.create(record).await
        }

        async fn get(&self, token: &str) -> Result<RevocationRecord, RepositoryError> {
            self.0.blacklist_calls.fetch_add(1, Ordering::SeqCst);
            self.0.blacklist.get(token).await
        }

        async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
            self.0.blacklist_calls.fetch_add(1, Ordering::SeqCst);
            self.0.blacklist.delete_expired(now).await
        }
    }

    #[async_trait::async_trait]
    impl UserRepository for SpyUsers {
        async fn create(&self, user: User) -> Result<User, RepositoryError> {
            self.0.users.create(user).await
        }

        async fn get(&self, user_id: i64) -> Result<User, RepositoryError> {
            self.0.user_calls.fetch_add(1, Ordering::SeqCst);
            self.0.users.get(user_id).await
        }

        async fn get_by_phone_number(&self, phone_number: &str) -> Result<User, RepositoryError> {
            self.0.users.get_by_phone_number(phone_number).await
        }
    }

    impl Spy {
        fn blacklist_calls(&self) -> usize {
            self.blacklist_calls.load(Ordering::SeqCst)
        }

        fn user_calls(&self) -> usize {
            self.user_calls.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        spy: Arc<Spy>,
        tokens: TokenService,
        authenticator: Authenticator,
        user: User,
    }

    async fn fixture() -> Fixture {
        let spy = Arc::new(Spy::default());
        let tokens = TokenService::new(
            TokenCodec::new("test-secret", "payhere"),
            Arc::new(SpyBlacklist(spy.clone())),
        );
        let users: Arc<dyn UserRepository> = Arc::new(SpyUsers(spy.clone()));
        let user = users
            .create(User::new("01012341234", "hash", Utc::now()).unwrap())
            .await
            .unwrap();
        let authenticator = Authenticator::new(tokens.clone(), users);

        Fixture {
            spy,
            tokens,
            authenticator,
            user,
        }
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let f = fixture().await;
        let (token, _) = f.tokens.create(&f.user.subject()).unwrap();

        let user = f.authenticator.authenticate(&token).await.unwrap();

        assert_eq!(user.id, f.user.id);
        assert_eq!(f.spy.blacklist_calls(), 1);
        assert_eq!(f.spy.user_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_token_touches_no_store() {
        let f = fixture().await;

        let result = f.authenticator.authenticate("").await;

        assert!(matches!(result, Err(AuthError::MissingToken)));
        assert_eq!(f.spy.blacklist_calls(), 0);
        assert_eq!(f.spy.user_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_token_touches_no_store() {
        let f = fixture().await;

        let result = f.authenticator.authenticate("not-a-token").await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
        assert_eq!(f.spy.blacklist_calls(), 0);
        assert_eq!(f.spy.user_calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_touches_no_store() {
        let f = fixture().await;
        let (token, _) = f
            .tokens
            .codec()
            .issue(&f.user.subject(), Utc::now() - Duration::days(8))
            .unwrap();

        let result = f.authenticator.authenticate(&token).await;

        assert!(matches!(result, Err(AuthError::ExpiredToken)));
        assert_eq!(f.spy.blacklist_calls(), 0);
        assert_eq!(f.spy.user_calls(), 0);
    }

    #[tokio::test]
    async fn test_revoked_token_skips_user_lookup() {
        let f = fixture().await;
        let (token, _) = f.tokens.create(&f.user.subject()).unwrap();
        f.tokens.register_blacklist(&token).await.unwrap();
        let calls_before = f.spy.blacklist_calls();

        let result = f.authenticator.authenticate(&token).await;

        assert!(matches!(result, Err(AuthError::RevokedToken)));
        assert_eq!(f.spy.blacklist_calls(), calls_before + 1);
        assert_eq!(f.spy.user_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let f = fixture().await;
        let (token, _) = f.tokens.create("999").unwrap();

        let result = f.authenticator.authenticate(&token).await;

        assert!(matches!(result, Err(AuthError::UnknownUser)));
        assert_eq!(f.spy.user_calls(), 1);
    }

    #[tokio::test]
    async fn test_non_numeric_subject_is_internal() {
        let f = fixture().await;
        let (token, _) = f.tokens.create("alice").unwrap();

        let result = f.authenticator.authenticate(&token).await;

        assert!(matches!(result, Err(AuthError::Internal(_))));
        assert_eq!(f.spy.user_calls(), 0);
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(
            AppError::from(AuthError::ExpiredToken),
            AppError::ExpiredToken
        ));
        assert!(matches!(
            AppError::from(AuthError::RevokedToken),
            AppError::Unauthorized(msg) if msg == "blacklisted token"
        ));
        assert!(matches!(
            AppError::from(AuthError::Internal("db down".into())),
            AppError::Internal(_)
        ));
    }
}
