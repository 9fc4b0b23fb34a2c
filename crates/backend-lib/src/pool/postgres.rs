//! PostgreSQL connections for the pool.
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Executor};
use std::str::FromStr;

use super::{ManageConnection, PoolError};
use crate::config::DatabaseSettings;

/// Opens `sqlx` PostgreSQL connections from the configured parameters
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    /// Build a connector, refusing to start without every parameter.
    ///
    /// JDBC-style `jdbc:postgresql://` URLs are accepted as well.
    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self, PoolError> {
        let url = required(settings.url.as_deref(), "DB_URL")?;
        let user = required(settings.user.as_deref(), "DB_USER")?;
        let password = required(settings.password.as_deref(), "DB_PASSWORD")?;

        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| PoolError::InvalidParameter(format!("DB_URL: {e}")))?
            .username(user)
            .password(password);

        Ok(Self { options })
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, PoolError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PoolError::MissingParameter(name)),
    }
}

#[async_trait]
impl ManageConnection for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, PoolError> {
        self.options
            .connect()
            .await
            .map_err(|e| PoolError::Connect(e.to_string()))
    }

    async fn is_alive(&self, conn: &mut PgConnection) -> bool {
        conn.ping().await.is_ok()
    }

    async fn reset(&self, conn: &mut PgConnection) -> Result<(), PoolError> {
        // ROLLBACK outside a transaction only raises a warning
        conn.execute(sqlx::raw_sql("ROLLBACK; RESET ALL"))
            .await
            .map(|_| ())
            .map_err(|e| PoolError::Reset(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DatabaseSettings {
        DatabaseSettings {
            url: Some("postgres://localhost:5432/acadify".to_string()),
            user: Some("acadify".to_string()),
            password: Some("hunter22".to_string()),
            ..DatabaseSettings::default()
        }
    }

    #[test]
    fn test_connector_from_complete_settings() {
        assert!(PgConnector::from_settings(&settings()).is_ok());

        let mut jdbc = settings();
        jdbc.url = Some("jdbc:postgresql://db.internal:5432/acadify".to_string());
        assert!(PgConnector::from_settings(&jdbc).is_ok());
    }

    #[test]
    fn test_missing_parameters_are_fatal() {
        let mut no_url = settings();
        no_url.url = None;
        assert!(matches!(
            PgConnector::from_settings(&no_url),
            Err(PoolError::MissingParameter("DB_URL"))
        ));

        let mut blank_user = settings();
        blank_user.user = Some("   ".to_string());
        assert!(matches!(
            PgConnector::from_settings(&blank_user),
            Err(PoolError::MissingParameter("DB_USER"))
        ));

        let mut no_password = settings();
        no_password.password = None;
        assert!(matches!(
            PgConnector::from_settings(&no_password),
            Err(PoolError::MissingParameter("DB_PASSWORD"))
        ));
    }

    #[test]
    fn test_unparseable_url_rejected() {
        let mut bad = settings();
        bad.url = Some("not a url at all".to_string());
        assert!(matches!(
            PgConnector::from_settings(&bad),
            Err(PoolError::InvalidParameter(_))
        ));
    }
}
