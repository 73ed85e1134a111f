//! Audit log repository for database operations.

use super::{DbError, DbPool};
use crate::audit::AuditLogEntry;
#[cfg(feature = "database")]
use crate::{audit::AuditAction, incident::IncidentStatus};
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for audit log persistence.
///
/// The table is append-only: there is no update or delete.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends an audit entry.
    async fn log(&self, entry: &AuditLogEntry) -> Result<(), DbError>;

    /// Gets all audit entries for an incident, newest first.
    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Vec<AuditLogEntry>, DbError>;
}

/// SQLite implementation of AuditRepository.
#[cfg(feature = "database")]
pub struct SqliteAuditRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteAuditRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn log(&self, entry: &AuditLogEntry) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, incident_id, changed_by, old_status, new_status, action, details, changed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.incident_id.to_string())
        .bind(entry.changed_by.to_string())
        .bind(entry.old_status.map(|s| s.as_db_str()))
        .bind(entry.new_status.map(|s| s.as_db_str()))
        .bind(entry.action.as_db_str())
        .bind(&entry.details)
        .bind(entry.changed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Vec<AuditLogEntry>, DbError> {
        let rows: Vec<AuditLogRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, changed_by, old_status, new_status, action, details, changed_at
            FROM audit_logs
            WHERE incident_id = ?
            ORDER BY changed_at DESC
            "#,
        )
        .bind(incident_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}

/// PostgreSQL implementation of AuditRepository.
#[cfg(feature = "database")]
pub struct PgAuditRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgAuditRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn log(&self, entry: &AuditLogEntry) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, incident_id, changed_by, old_status, new_status, action, details, changed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.incident_id)
        .bind(entry.changed_by)
        .bind(entry.old_status.map(|s| s.as_db_str()))
        .bind(entry.new_status.map(|s| s.as_db_str()))
        .bind(entry.action.as_db_str())
        .bind(&entry.details)
        .bind(entry.changed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Vec<AuditLogEntry>, DbError> {
        let rows: Vec<PgAuditLogRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, changed_by, old_status, new_status, action, details, changed_at
            FROM audit_logs
            WHERE incident_id = $1
            ORDER BY changed_at DESC
            "#,
        )
        .bind(incident_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}

/// Factory function to create the appropriate repository based on pool type.
#[cfg(feature = "database")]
pub fn create_audit_repository(pool: &DbPool) -> Box<dyn AuditRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteAuditRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgAuditRepository::new(pool.clone())),
    }
}

#[cfg(feature = "database")]
fn parse_optional_status(s: Option<String>) -> Result<Option<IncidentStatus>, DbError> {
    s.map(|s| {
        IncidentStatus::from_db_str(&s)
            .ok_or_else(|| DbError::Serialization(format!("Unknown status: {}", s)))
    })
    .transpose()
}

// Helper structs for SQLx row mapping

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct AuditLogRow {
    id: String,
    incident_id: String,
    changed_by: String,
    old_status: Option<String>,
    new_status: Option<String>,
    action: String,
    details: Option<String>,
    changed_at: String,
}

#[cfg(feature = "database")]
impl TryFrom<AuditLogRow> for AuditLogEntry {
    type Error = DbError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            id: Uuid::parse_str(&row.id)?,
            incident_id: Uuid::parse_str(&row.incident_id)?,
            changed_by: Uuid::parse_str(&row.changed_by)?,
            old_status: parse_optional_status(row.old_status)?,
            new_status: parse_optional_status(row.new_status)?,
            action: AuditAction::from_db_str(&row.action),
            details: row.details,
            changed_at: DateTime::parse_from_rfc3339(&row.changed_at)?.with_timezone(&Utc),
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgAuditLogRow {
    id: Uuid,
    incident_id: Uuid,
    changed_by: Uuid,
    old_status: Option<String>,
    new_status: Option<String>,
    action: String,
    details: Option<String>,
    changed_at: DateTime<Utc>,
}

#[cfg(feature = "database")]
impl TryFrom<PgAuditLogRow> for AuditLogEntry {
    type Error = DbError;

    fn try_from(row: PgAuditLogRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            id: row.id,
            incident_id: row.incident_id,
            changed_by: row.changed_by,
            old_status: parse_optional_status(row.old_status)?,
            new_status: parse_optional_status(row.new_status)?,
            action: AuditAction::from_db_str(&row.action),
            details: row.details,
            changed_at: row.changed_at,
        })
    }
}
