//! User account service: sign-up, sign-in, sign-out
//!
//! Author: hephaex@gmail.com

use super::bounded;
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::auth::{hash_password_with_config, verify_password, PasswordConfig, TokenService};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use payhere_core::valid::{validate_password, validate_phone_number};
use payhere_core::{RepositoryError, User, UserRepository};
use std::sync::Arc;
use tracing::debug;

/// User account service
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
    password_config: PasswordConfig,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenService,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            password_config,
        }
    }

    /// Register a new account
    ///
    /// # Returns
    ///
    /// * `Ok(User)` - The stored user
    /// * `Err(AppError::InvalidRequest)` - Invalid phone number or weak password
    /// * `Err(AppError::UserAlreadyExists)` - The phone number is taken
    pub async fn sign_up(
        &self,
        phone_number: &str,
        password: &str,
        context: &AuditContext,
    ) -> Result<User, AppError> {
        let result = self.register(phone_number, password).await;

        match &result {
            Ok(user) => audit_log(&AuditEvent::SignUpSuccess {
                user_id: user.id,
                phone_number: user.phone_number.clone(),
                ip_address: context.ip_address.clone(),
                user_agent: context.user_agent.clone(),
            }),
            Err(e) if !e.status_code().is_server_error() => {
                audit_log(&AuditEvent::SignUpFailure {
                    phone_number: phone_number.to_string(),
                    reason: e.to_string(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                })
            }
            Err(_) => {}
        }

        result
    }

    async fn register(&self, phone_number: &str, password: &str) -> Result<User, AppError> {
        validate_phone_number(phone_number)?;
        validate_password(password)?;

        let password_hash = self.hash(password).await?;
        let user = User::new(phone_number, password_hash, Utc::now())?;

        match bounded(self.tokens.store_timeout(), "create_user", self.users.create(user)).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::AlreadyExists) => Err(AppError::UserAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Authenticate with phone number and password and issue a token
    ///
    /// # Returns
    ///
    /// * `Ok((token, expires_at))` - A fresh bearer token
    /// * `Err(AppError::UserNotFound)` - No account for the phone number
    /// * `Err(AppError::PasswordMismatch)` - Wrong password
    pub async fn sign_in(
        &self,
        phone_number: &str,
        password: &str,
        context: &AuditContext,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let result = self.login(phone_number, password).await;

        match &result {
            Ok((user, _)) => audit_log(&AuditEvent::SignInSuccess {
                user_id: user.id,
                phone_number: user.phone_number.clone(),
                ip_address: context.ip_address.clone(),
                user_agent: context.user_agent.clone(),
            }),
            Err(e) if !e.status_code().is_server_error() => {
                audit_log(&AuditEvent::SignInFailure {
                    phone_number: phone_number.to_string(),
                    reason: e.to_string(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                })
            }
            Err(_) => {}
        }

        result.map(|(_, issued)| issued)
    }

    async fn login(
        &self,
        phone_number: &str,
        password: &str,
    ) -> Result<(User, (String, DateTime<Utc>)), AppError> {
        validate_phone_number(phone_number)?;

        let user = match bounded(
            self.tokens.store_timeout(),
            "get_user_by_phone_number",
            self.users.get_by_phone_number(phone_number),
        )
        .await
        {
            Ok(user) => user,
            Err(RepositoryError::NotFound) => return Err(AppError::UserNotFound),
            Err(e) => return Err(e.into()),
        };

        if !self.verify(password, &user.password).await? {
            return Err(AppError::PasswordMismatch);
        }

        let issued = self.tokens.create(&user.subject())?;
        debug!(user_id = user.id, expires_at = %issued.1, "Token issued");

        Ok((user, issued))
    }

    /// Revoke a token
    ///
    /// Revoking an already revoked or expired token succeeds.
    pub async fn sign_out(&self, token: &str, context: &AuditContext) -> Result<(), AppError> {
        self.tokens.register_blacklist(token).await?;

        audit_log(&AuditEvent::SignOut {
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
        });
        Ok(())
    }

    /// Look up a user by identifier
    pub async fn get(&self, user_id: i64) -> Result<User, AppError> {
        match bounded(self.tokens.store_timeout(), "get_user", self.users.get(user_id)).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::NotFound) => Err(AppError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let config = self.password_config.clone();

        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("tokens", &self.tokens)
            .field("password_config", &self.password_config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenCodec;
    use crate::repository::memory::{MemoryTokenBlacklistRepository, MemoryUserRepository};

    const PHONE: &str = "01012341234";
    const PASSWORD: &str = "Passw0rd!";

    fn service() -> (UserService, Arc<MemoryTokenBlacklistRepository>) {
        let blacklist = Arc::new(MemoryTokenBlacklistRepository::new());
        let tokens = TokenService::new(TokenCodec::new("test-secret", "payhere"), blacklist.clone());
        let service = UserService::new(
            Arc::new(MemoryUserRepository::new()),
            tokens,
            PasswordConfig::minimal(),
        );
        (service, blacklist)
    }

    #[tokio::test]
    async fn test_sign_up_stores_hash_only() {
        let (service, _) = service();

        let user = service
            .sign_up(PHONE, PASSWORD, &AuditContext::default())
            .await
            .unwrap();

        assert!(user.is_persisted());
        assert_ne!(user.password, PASSWORD);
        assert!(user.password.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_invalid_input() {
        let (service, _) = service();
        let context = AuditContext::default();

        let bad_phone = service.sign_up("1234", PASSWORD, &context).await;
        assert!(matches!(bad_phone, Err(AppError::InvalidRequest(_))));

        let weak = service.sign_up(PHONE, "password", &context).await;
        assert!(matches!(weak, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_phone_number() {
        let (service, _) = service();
        let context = AuditContext::default();

        service.sign_up(PHONE, PASSWORD, &context).await.unwrap();
        let result = service.sign_up(PHONE, PASSWORD, &context).await;

        assert!(matches!(result, Err(AppError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_sign_in_issues_token_for_user() {
        let (service, _) = service();
        let context = AuditContext::default();
        let user = service.sign_up(PHONE, PASSWORD, &context).await.unwrap();

        let (token, expires_at) = service.sign_in(PHONE, PASSWORD, &context).await.unwrap();
        let (subject, verified_expiry) = service.tokens.verify(&token).unwrap();

        assert_eq!(subject, user.subject());
        assert_eq!(verified_expiry, expires_at);
    }

    #[tokio::test]
    async fn test_sign_in_failures() {
        let (service, _) = service();
        let context = AuditContext::default();
        service.sign_up(PHONE, PASSWORD, &context).await.unwrap();

        let unknown = service.sign_in("01099998888", PASSWORD, &context).await;
        assert!(matches!(unknown, Err(AppError::UserNotFound)));

        let mismatch = service.sign_in(PHONE, "Wrong0rd!", &context).await;
        assert!(matches!(mismatch, Err(AppError::PasswordMismatch)));
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent() {
        let (service, blacklist) = service();
        let context = AuditContext::default();
        service.sign_up(PHONE, PASSWORD, &context).await.unwrap();
        let (token, _) = service.sign_in(PHONE, PASSWORD, &context).await.unwrap();

        service.sign_out(&token, &context).await.unwrap();
        service.sign_out(&token, &context).await.unwrap();

        assert_eq!(blacklist.len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_rejects_garbage() {
        let (service, blacklist) = service();

        let result = service.sign_out("garbage", &AuditContext::default()).await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        assert!(blacklist.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let (service, _) = service();

        assert!(matches!(service.get(42).await, Err(AppError::UserNotFound)));
    }
}
