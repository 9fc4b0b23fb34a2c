// crates/backend-lib/src/error.rs

//! Central error types for the auth core.
use acadify_common::Role;
use thiserror::Error;

use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::pool::PoolError;
use crate::validation::ValidationError;

/// Errors surfaced to the transport layer.
///
/// Bad credentials and unknown, expired or revoked tokens all map to
/// [`AuthError::Unauthorized`], so callers cannot tell them apart.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Email already registered")]
    AlreadyRegistered,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Role {actual} may not access {required} resources")]
    Forbidden { required: Role, actual: Role },

    #[error("No database connection available: {0}")]
    ResourceExhausted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status the transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 400,
            AuthError::Unauthorized => 401,
            AuthError::Forbidden { .. } => 403,
            AuthError::AlreadyRegistered => 409,
            AuthError::ResourceExhausted(_) => 503,
            AuthError::Internal(_) => 500,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VAL_001",
            AuthError::AlreadyRegistered => "AUTH_002",
            AuthError::Unauthorized => "AUTH_001",
            AuthError::Forbidden { .. } => "AUTH_003",
            AuthError::ResourceExhausted(_) => "DB_001",
            AuthError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for clients
    pub fn sanitized_message(&self) -> String {
        match self {
            // validation messages describe the caller's own input
            AuthError::Validation(err) => err.to_string(),
            AuthError::AlreadyRegistered => "Email already registered".to_string(),
            AuthError::Unauthorized => "Unauthorized".to_string(),
            AuthError::Forbidden { .. } => "Access denied".to_string(),
            AuthError::ResourceExhausted(_) => "Service temporarily unavailable".to_string(),
            AuthError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl From<PoolError> for AuthError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Connect(msg) => AuthError::ResourceExhausted(msg),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Duplicate => AuthError::AlreadyRegistered,
            DirectoryError::Backend(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("hashing task failed: {err}"))
    }
}

/// Reasons the process cannot start
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("connection pool: {0}")]
    Pool(#[from] PoolError),
}
