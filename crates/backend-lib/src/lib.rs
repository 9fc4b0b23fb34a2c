// ============================
// acadify-backend/src/lib.rs
// ============================
//! Authentication, session and connection lifecycle core of the Acadify
//! records backend.

pub mod auth;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod validation;

use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthGateway, AuthService, TokenStore};
use crate::config::Settings;
use crate::directory::PgUserDirectory;
use crate::error::StartupError;
use crate::pool::{ConnectionPool, PgConnector};

pub use acadify_common::{LoginOutcome, NewAccount, Principal, RegistrationOutcome, Role};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Session registry
    pub sessions: Arc<TokenStore>,
    /// Database connections
    pub pool: ConnectionPool<PgConnector>,
    /// Loaded settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build every shared component from validated settings.
    ///
    /// Fails if any database parameter is missing or any of the initial
    /// connections cannot be opened.
    pub async fn initialize(settings: Settings) -> Result<Self, StartupError> {
        settings.validate()?;

        let connector = PgConnector::from_settings(&settings.database)?;
        let pool = ConnectionPool::initialize(connector, settings.database.pool_capacity).await?;
        let sessions = Arc::new(TokenStore::new(settings.session_policy()));
        let auth: Arc<dyn AuthService> = Arc::new(AuthGateway::new(
            pool.clone(),
            sessions.clone(),
            settings.credential_hasher(),
            PgUserDirectory,
        ));
        info!(capacity = pool.capacity(), "auth core ready");

        Ok(Self {
            auth,
            sessions,
            pool,
            settings: Arc::new(settings),
        })
    }
}
