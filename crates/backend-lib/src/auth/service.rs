use acadify_common::{LoginOutcome, NewAccount, Principal, RegistrationOutcome, Role};
use async_trait::async_trait;

use crate::error::AuthError;

/// What request handlers need from the auth core
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Check credentials and open a session
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError>;
    /// Create an account
    async fn register(&self, account: NewAccount) -> Result<RegistrationOutcome, AuthError>;
    /// Resolve a bearer token to its principal
    fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;
    /// Resolve a bearer token and require `role`
    fn authorize(&self, token: &str, role: Role) -> Result<Principal, AuthError>;
    /// Swap a live token for a new one
    fn rotate(&self, token: &str) -> Result<String, AuthError>;
    /// End a session
    fn logout(&self, token: &str);
}
