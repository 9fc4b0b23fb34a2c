//! Account storage seen by the auth core.
//!
//! The gateway reaches user rows through this trait using a connection it
//! checked out of the pool, so the directory never owns connections itself.

pub mod postgres;

use acadify_common::Role;
use async_trait::async_trait;
use thiserror::Error;

pub use postgres::PgUserDirectory;

/// Errors raised by a [`UserDirectory`]
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("account already exists")]
    Duplicate,

    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Credentials row for one account
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: i64,
    pub role: Role,
    pub password_hash: String,
}

/// A validated account ready to be stored
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

/// Audit trail action recorded through `log_activity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Login,
    Registered,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Login => "LOGIN",
            Activity::Registered => "REGISTERED",
        }
    }
}

#[async_trait]
pub trait UserDirectory<C: Send>: Send + Sync {
    /// Look up the credentials row for an (already normalized) email
    async fn find_by_email(
        &self,
        conn: &mut C,
        email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    /// Store a new account together with its role profile, atomically.
    /// Returns the new user id.
    async fn create_account(&self, conn: &mut C, user: &NewUser) -> Result<i64, DirectoryError>;

    /// Append to the activity log for `user_id`
    async fn log_activity(
        &self,
        conn: &mut C,
        user_id: i64,
        activity: Activity,
    ) -> Result<(), DirectoryError>;
}
