// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod gateway;
pub mod password;
pub mod session;
mod service;
pub mod token_generator;

pub use gateway::AuthGateway;
pub use password::CredentialHasher;
pub use service::AuthService;
pub use session::{SessionInfo, SessionPolicy, TokenStore};

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
