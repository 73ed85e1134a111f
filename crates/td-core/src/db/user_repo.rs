//! User profile and login-log repository.

use super::{DbError, DbPool};
use crate::auth::{LoginRecord, User};
#[cfg(feature = "database")]
use crate::auth::Role;
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for user profiles.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a profile. Fails with `DbError::Constraint` on a duplicate email.
    async fn create(&self, user: &User) -> Result<User, DbError>;

    /// Gets a profile by ID.
    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError>;

    /// Gets a profile by email, compared case-insensitively.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    /// Appends a sign-in record.
    async fn record_login(&self, record: &LoginRecord) -> Result<(), DbError>;

    /// Returns the most recent sign-ins for a user, newest first.
    async fn recent_logins(&self, user_id: Uuid, limit: u32) -> Result<Vec<LoginRecord>, DbError>;
}

/// SQLite implementation of UserRepository.
#[cfg(feature = "database")]
pub struct SqliteUserRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteUserRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> Result<User, DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_db_str())
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(user.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, full_name, role, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, full_name, role, created_at FROM users WHERE LOWER(email) = LOWER(?)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn record_login(&self, record: &LoginRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO login_logs (id, user_id, email, role, logged_in_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(&record.email)
        .bind(record.role.as_db_str())
        .bind(record.logged_in_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_logins(&self, user_id: Uuid, limit: u32) -> Result<Vec<LoginRecord>, DbError> {
        let rows: Vec<LoginRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, email, role, logged_in_at
            FROM login_logs
            WHERE user_id = ?
            ORDER BY logged_in_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LoginRecord::try_from).collect()
    }
}

/// PostgreSQL implementation of UserRepository.
#[cfg(feature = "database")]
pub struct PgUserRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgUserRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> Result<User, DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_db_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let row: Option<PgUserRow> = sqlx::query_as(
            "SELECT id, email, full_name, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row: Option<PgUserRow> = sqlx::query_as(
            "SELECT id, email, full_name, role, created_at FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn record_login(&self, record: &LoginRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO login_logs (id, user_id, email, role, logged_in_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.email)
        .bind(record.role.as_db_str())
        .bind(record.logged_in_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_logins(&self, user_id: Uuid, limit: u32) -> Result<Vec<LoginRecord>, DbError> {
        let rows: Vec<PgLoginRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, email, role, logged_in_at
            FROM login_logs
            WHERE user_id = $1
            ORDER BY logged_in_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LoginRecord::try_from).collect()
    }
}

/// Factory function to create the appropriate repository based on pool type.
#[cfg(feature = "database")]
pub fn create_user_repository(pool: &DbPool) -> Box<dyn UserRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteUserRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgUserRepository::new(pool.clone())),
    }
}

#[cfg(feature = "database")]
fn parse_role(s: &str) -> Result<Role, DbError> {
    Role::from_db_str(s).ok_or_else(|| DbError::Serialization(format!("Unknown role: {}", s)))
}

// Helper structs for SQLx row mapping

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    role: String,
    created_at: String,
}

#[cfg(feature = "database")]
impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: Uuid::parse_str(&row.id)?,
            email: row.email,
            full_name: row.full_name,
            role: parse_role(&row.role)?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)?.with_timezone(&Utc),
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgUserRow {
    id: Uuid,
    email: String,
    full_name: String,
    role: String,
    created_at: DateTime<Utc>,
}

#[cfg(feature = "database")]
impl TryFrom<PgUserRow> for User {
    type Error = DbError;

    fn try_from(row: PgUserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            role: parse_role(&row.role)?,
            created_at: row.created_at,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct LoginRow {
    id: String,
    user_id: String,
    email: String,
    role: String,
    logged_in_at: String,
}

#[cfg(feature = "database")]
impl TryFrom<LoginRow> for LoginRecord {
    type Error = DbError;

    fn try_from(row: LoginRow) -> Result<Self, Self::Error> {
        Ok(LoginRecord {
            id: Uuid::parse_str(&row.id)?,
            user_id: Uuid::parse_str(&row.user_id)?,
            email: row.email,
            role: parse_role(&row.role)?,
            logged_in_at: DateTime::parse_from_rfc3339(&row.logged_in_at)?.with_timezone(&Utc),
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgLoginRow {
    id: Uuid,
    user_id: Uuid,
    email: String,
    role: String,
    logged_in_at: DateTime<Utc>,
}

#[cfg(feature = "database")]
impl TryFrom<PgLoginRow> for LoginRecord {
    type Error = DbError;

    fn try_from(row: PgLoginRow) -> Result<Self, Self::Error> {
        Ok(LoginRecord {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            role: parse_role(&row.role)?,
            logged_in_at: row.logged_in_at,
        })
    }
}
