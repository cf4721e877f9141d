//! Authentication module
//!
//! - Token codec (signing and parsing bearer tokens)
//! - Token service (issue, verify, revoke, revocation lookup)
//! - Middleware that gates protected routes
//! - Password hashing with Argon2

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::{Claims, TokenCodec, TokenError, TOKEN_LIFETIME_DAYS};
pub use middleware::{auth_middleware, extract_bearer_token, AuthError, Authenticator, CurrentUser};
pub use password::{hash_password, hash_password_with_config, verify_password, PasswordConfig};
pub use service::TokenService;
