//! `users` table access over a pooled PostgreSQL connection.
use acadify_common::Role;
use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use tracing::warn;

use super::{Activity, DirectoryError, NewUser, UserDirectory, UserRecord};

impl From<sqlx::Error> for DirectoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => DirectoryError::Duplicate,
            _ => DirectoryError::Backend(err.to_string()),
        }
    }
}

/// Reads and writes accounts in the records database
#[derive(Debug, Clone, Copy, Default)]
pub struct PgUserDirectory;

#[async_trait]
impl UserDirectory<PgConnection> for PgUserDirectory {
    async fn find_by_email(
        &self,
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query("SELECT user_id, role, password FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user_id: i32 = row.try_get("user_id")?;
        let role: String = row.try_get("role")?;
        let password_hash: String = row.try_get("password")?;

        let role = role.parse::<Role>().map_err(|e| {
            warn!(user_id, error = %e, "account has an unrecognised role");
            DirectoryError::Backend(e.to_string())
        })?;

        Ok(Some(UserRecord {
            user_id: i64::from(user_id),
            role,
            password_hash,
        }))
    }

    async fn create_account(
        &self,
        conn: &mut PgConnection,
        user: &NewUser,
    ) -> Result<i64, DirectoryError> {
        let mut tx = conn.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            "INSERT INTO users (email, password, role) VALUES ($1, $2, $3) RETURNING user_id",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        match user.role {
            Role::Student => {
                sqlx::query(
                    "INSERT INTO students (user_id, name, age, roll_number, stream) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(user_id)
                .bind(&user.name)
                .bind(18_i32)
                .bind(format!("STU-{user_id}"))
                .bind("General")
                .execute(&mut *tx)
                .await?;
            }
            Role::Teacher => {
                sqlx::query(
                    "INSERT INTO teachers (user_id, name, department, designation) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(user_id)
                .bind(&user.name)
                .bind("General")
                .bind("Lecturer")
                .execute(&mut *tx)
                .await?;
            }
            Role::Admin => {
                sqlx::query("INSERT INTO admins (user_id, name) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(&user.name)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        call_log_activity(&mut *tx, user_id, Activity::Registered).await?;
        tx.commit().await?;
        Ok(i64::from(user_id))
    }

    async fn log_activity(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        activity: Activity,
    ) -> Result<(), DirectoryError> {
        let user_id = i32::try_from(user_id)
            .map_err(|_| DirectoryError::Backend(format!("user id {user_id} out of range")))?;
        call_log_activity(conn, user_id, activity).await
    }
}

async fn call_log_activity(
    conn: &mut PgConnection,
    user_id: i32,
    activity: Activity,
) -> Result<(), DirectoryError> {
    sqlx::query("CALL log_activity($1, $2, $3, $4)")
        .bind(user_id)
        .bind(activity.as_str())
        .bind("users")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
