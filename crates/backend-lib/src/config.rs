// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Sources, later ones winning: built-in defaults, `acadify.toml`,
//! `ACADIFY_`-prefixed environment variables (`__` separates sections, e.g.
//! `ACADIFY_SESSION__INACTIVITY_TIMEOUT_SECS`), and finally `DB_URL`,
//! `DB_USER` and `DB_PASSWORD` for the database connection.
use chrono::TimeDelta;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::auth::password::{DEFAULT_ITERATIONS, MIN_ITERATIONS};
use crate::auth::{CredentialHasher, SessionPolicy};

/// Default configuration file, looked up in the working directory
pub const CONFIG_FILE: &str = "acadify.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "ACADIFY_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    pub log_level: String,
    /// Database connection parameters and pool sizing
    pub database: DatabaseSettings,
    /// Session expiry
    pub session: SessionSettings,
    /// Password hashing cost
    pub hashing: HashingSettings,
}

/// Database connection parameters
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Connections opened at startup
    pub pool_capacity: usize,
}

/// Session lifetimes, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub inactivity_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashingSettings {
    pub iterations: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
            session: SessionSettings::default(),
            hashing: HashingSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            password: None,
            pool_capacity: 20,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 30 * 60,
            max_lifetime_secs: 24 * 60 * 60,
            cleanup_interval_secs: 60 * 60,
        }
    }
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pool_capacity", &self.pool_capacity)
            .finish()
    }
}

impl Settings {
    /// Load and validate settings from the default sources
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment(Path::new(CONFIG_FILE)))
    }

    /// Like [`Settings::load`], reading `path` instead of `acadify.toml`
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::extract(Self::figment(path.as_ref()))
    }

    /// The layered provider stack behind `load`
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&["DB_URL", "DB_USER", "DB_PASSWORD"])
                    .map(|key| {
                        key.as_str()
                            .to_ascii_lowercase()
                            .replacen("db_", "database.", 1)
                            .into()
                    }),
            )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the process must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        let db = &self.database;
        for (value, name) in [
            (&db.url, "DB_URL"),
            (&db.user, "DB_USER"),
            (&db.password, "DB_PASSWORD"),
        ] {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(ConfigError::Missing(name));
            }
        }
        if db.pool_capacity == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_capacity must be at least 1".to_string(),
            ));
        }

        let session = &self.session;
        for (value, name) in [
            (session.inactivity_timeout_secs, "session.inactivity_timeout_secs"),
            (session.max_lifetime_secs, "session.max_lifetime_secs"),
            (session.cleanup_interval_secs, "session.cleanup_interval_secs"),
        ] {
            if value == 0 || value > i64::MAX as u64 / 1000 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number of seconds"
                )));
            }
        }

        if self.hashing.iterations < MIN_ITERATIONS {
            return Err(ConfigError::Invalid(format!(
                "hashing.iterations must be at least {MIN_ITERATIONS}"
            )));
        }

        Ok(())
    }

    /// Session expiry policy described by these settings
    pub fn session_policy(&self) -> SessionPolicy {
        let secs = |s: u64| TimeDelta::seconds(s as i64);
        SessionPolicy {
            inactivity_timeout: secs(self.session.inactivity_timeout_secs),
            max_lifetime: secs(self.session.max_lifetime_secs),
            cleanup_interval: secs(self.session.cleanup_interval_secs),
        }
    }

    pub fn credential_hasher(&self) -> CredentialHasher {
        CredentialHasher::new(self.hashing.iterations)
    }
}
