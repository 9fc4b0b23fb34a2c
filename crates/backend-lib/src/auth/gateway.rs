//! Login and registration over the pool, the directory and the token store.
use acadify_common::{LoginOutcome, NewAccount, Principal, RegistrationOutcome, Role};
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::{AuthService, CredentialHasher, TokenStore};
use crate::directory::{Activity, NewUser, UserDirectory, UserRecord};
use crate::error::AuthError;
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCEEDED};
use crate::pool::{ConnectionPool, ManageConnection};
use crate::validation::{
    validate_email, validate_name, validate_password, validate_role, ValidationError,
};

/// Default [`AuthService`]
pub struct AuthGateway<M: ManageConnection, D> {
    pool: ConnectionPool<M>,
    sessions: Arc<TokenStore>,
    hasher: CredentialHasher,
    directory: D,
    decoy_hash: String,
}

impl<M, D> AuthGateway<M, D>
where
    M: ManageConnection,
    D: UserDirectory<M::Connection>,
{
    pub fn new(
        pool: ConnectionPool<M>,
        sessions: Arc<TokenStore>,
        hasher: CredentialHasher,
        directory: D,
    ) -> Self {
        Self {
            decoy_hash: hasher.decoy_hash(),
            pool,
            sessions,
            hasher,
            directory,
        }
    }

    pub fn sessions(&self) -> &Arc<TokenStore> {
        &self.sessions
    }

    pub fn pool(&self) -> &ConnectionPool<M> {
        &self.pool
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    async fn check_credentials(
        &self,
        conn: &mut M::Connection,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let found = self.directory.find_by_email(conn, email).await?;

        // unknown emails pay for a derivation too
        let stored = found
            .as_ref()
            .map_or_else(|| self.decoy_hash.clone(), |user| user.password_hash.clone());
        let verified = self.verify_off_executor(password, stored).await?;

        match found {
            Some(user) if verified => Ok(user),
            _ => Err(AuthError::Unauthorized),
        }
    }

    async fn verify_off_executor(
        &self,
        password: &str,
        encoded: String,
    ) -> Result<bool, AuthError> {
        let hasher = self.hasher;
        let password = Zeroizing::new(password.to_owned());
        let verified =
            tokio::task::spawn_blocking(move || hasher.verify(&password, &encoded)).await?;
        Ok(verified)
    }

    async fn hash_off_executor(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher;
        let password = Zeroizing::new(password.to_owned());
        Ok(tokio::task::spawn_blocking(move || hasher.hash(&password)).await?)
    }
}

#[async_trait]
impl<M, D> AuthService for AuthGateway<M, D>
where
    M: ManageConnection,
    D: UserDirectory<M::Connection>,
{
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::InvalidPassword("Password is required".to_string()).into());
        }

        let mut conn = self.pool.acquire().await?;
        let checked = self.check_credentials(&mut *conn, &email, password).await;
        let user = match checked {
            Ok(user) => user,
            Err(err) => {
                self.pool.release(conn).await;
                counter!(LOGIN_FAILED).increment(1);
                return Err(err);
            }
        };

        if let Err(err) = self
            .directory
            .log_activity(&mut *conn, user.user_id, Activity::Login)
            .await
        {
            warn!(user_id = user.user_id, error = %err, "failed to record login activity");
        }
        self.pool.release(conn).await;

        if self.hasher.needs_rehash(&user.password_hash) {
            info!(user_id = user.user_id, "stored password hash is below the configured cost");
        }

        let token = self.sessions.create(user.user_id.to_string(), user.role);
        counter!(LOGIN_SUCCEEDED).increment(1);
        info!(user_id = user.user_id, role = %user.role, "login succeeded");

        Ok(LoginOutcome {
            user_id: user.user_id,
            role: user.role,
            token,
        })
    }

    async fn register(&self, account: NewAccount) -> Result<RegistrationOutcome, AuthError> {
        let email = validate_email(&account.email)?;
        validate_password(&account.password)?;
        let role = validate_role(&account.role)?;
        let name = validate_name(&account.name)?;

        let password_hash = self.hash_off_executor(&account.password).await?;
        let user = NewUser {
            email,
            name,
            role,
            password_hash,
        };

        let mut conn = self.pool.acquire().await?;
        let created = self.directory.create_account(&mut *conn, &user).await;
        self.pool.release(conn).await;

        let user_id = created?;
        info!(user_id, %role, "account registered");
        Ok(RegistrationOutcome { user_id, role })
    }

    fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        self.sessions.validate(token).ok_or(AuthError::Unauthorized)
    }

    fn authorize(&self, token: &str, role: Role) -> Result<Principal, AuthError> {
        let principal = self.authenticate(token)?;
        if principal.role != role {
            return Err(AuthError::Forbidden {
                required: role,
                actual: principal.role,
            });
        }
        Ok(principal)
    }

    fn rotate(&self, token: &str) -> Result<String, AuthError> {
        self.sessions.rotate(token).ok_or(AuthError::Unauthorized)
    }

    fn logout(&self, token: &str) {
        self.sessions.revoke(token);
    }
}
