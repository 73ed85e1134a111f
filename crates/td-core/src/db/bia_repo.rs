//! BIA report repository for database operations.

use super::{DbError, DbPool};
use crate::bia::{BiaReport, BiaReportListing};
#[cfg(feature = "database")]
use crate::incident::RiskLevel;
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for BIA report persistence.
///
/// Reports are immutable once inserted. Implementations must reject a second
/// report for the same incident with `DbError::Constraint`.
#[async_trait]
pub trait BiaReportRepository: Send + Sync {
    /// Inserts a report.
    async fn create(&self, report: &BiaReport) -> Result<BiaReport, DbError>;

    /// Gets the report linked to an incident, if any.
    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Option<BiaReport>, DbError>;

    /// Lists every report with its incident title, newest first.
    async fn list(&self) -> Result<Vec<BiaReportListing>, DbError>;

    /// Counts all reports.
    async fn count(&self) -> Result<u64, DbError>;
}

/// SQLite implementation of BiaReportRepository.
#[cfg(feature = "database")]
pub struct SqliteBiaReportRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteBiaReportRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl BiaReportRepository for SqliteBiaReportRepository {
    async fn create(&self, report: &BiaReport) -> Result<BiaReport, DbError> {
        sqlx::query(
            r#"
            INSERT INTO bia_reports (id, incident_id, risk_level, operational, managerial, bia_description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.id.to_string())
        .bind(report.incident_id.to_string())
        .bind(report.risk_level.as_db_str())
        .bind(&report.operational)
        .bind(&report.managerial)
        .bind(&report.bia_description)
        .bind(report.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(report.clone())
    }

    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Option<BiaReport>, DbError> {
        let row: Option<BiaReportRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, risk_level, operational, managerial, bia_description, created_at, NULL AS incident_title
            FROM bia_reports
            WHERE incident_id = ?
            "#,
        )
        .bind(incident_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| BiaReportListing::try_from(r).map(|l| l.report))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<BiaReportListing>, DbError> {
        let rows: Vec<BiaReportRow> = sqlx::query_as(
            r#"
            SELECT b.id, b.incident_id, b.risk_level, b.operational, b.managerial, b.bia_description, b.created_at,
                   i.title AS incident_title
            FROM bia_reports b
            LEFT JOIN incidents i ON i.id = b.incident_id
            ORDER BY b.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BiaReportListing::try_from).collect()
    }

    async fn count(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bia_reports")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

/// PostgreSQL implementation of BiaReportRepository.
#[cfg(feature = "database")]
pub struct PgBiaReportRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgBiaReportRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl BiaReportRepository for PgBiaReportRepository {
    async fn create(&self, report: &BiaReport) -> Result<BiaReport, DbError> {
        sqlx::query(
            r#"
            INSERT INTO bia_reports (id, incident_id, risk_level, operational, managerial, bia_description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(report.id)
        .bind(report.incident_id)
        .bind(report.risk_level.as_db_str())
        .bind(&report.operational)
        .bind(&report.managerial)
        .bind(&report.bia_description)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;

        Ok(report.clone())
    }

    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Option<BiaReport>, DbError> {
        let row: Option<PgBiaReportRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, risk_level, operational, managerial, bia_description, created_at, NULL::text AS incident_title
            FROM bia_reports
            WHERE incident_id = $1
            "#,
        )
        .bind(incident_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| BiaReportListing::try_from(r).map(|l| l.report))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<BiaReportListing>, DbError> {
        let rows: Vec<PgBiaReportRow> = sqlx::query_as(
            r#"
            SELECT b.id, b.incident_id, b.risk_level, b.operational, b.managerial, b.bia_description, b.created_at,
                   i.title AS incident_title
            FROM bia_reports b
            LEFT JOIN incidents i ON i.id = b.incident_id
            ORDER BY b.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BiaReportListing::try_from).collect()
    }

    async fn count(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bia_reports")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

/// Factory function to create the appropriate repository based on pool type.
#[cfg(feature = "database")]
pub fn create_bia_report_repository(pool: &DbPool) -> Box<dyn BiaReportRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteBiaReportRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgBiaReportRepository::new(pool.clone())),
    }
}

#[cfg(feature = "database")]
fn parse_risk(s: &str) -> Result<RiskLevel, DbError> {
    RiskLevel::from_db_str(s)
        .ok_or_else(|| DbError::Serialization(format!("Unknown risk level: {}", s)))
}

// Helper structs for SQLx row mapping

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct BiaReportRow {
    id: String,
    incident_id: String,
    risk_level: String,
    operational: String,
    managerial: String,
    bia_description: Option<String>,
    created_at: String,
    incident_title: Option<String>,
}

#[cfg(feature = "database")]
impl TryFrom<BiaReportRow> for BiaReportListing {
    type Error = DbError;

    fn try_from(row: BiaReportRow) -> Result<Self, Self::Error> {
        Ok(BiaReportListing {
            report: BiaReport {
                id: Uuid::parse_str(&row.id)?,
                incident_id: Uuid::parse_str(&row.incident_id)?,
                risk_level: parse_risk(&row.risk_level)?,
                operational: row.operational,
                managerial: row.managerial,
                bia_description: row.bia_description,
                created_at: DateTime::parse_from_rfc3339(&row.created_at)?.with_timezone(&Utc),
            },
            incident_title: row.incident_title,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgBiaReportRow {
    id: Uuid,
    incident_id: Uuid,
    risk_level: String,
    operational: String,
    managerial: String,
    bia_description: Option<String>,
    created_at: DateTime<Utc>,
    incident_title: Option<String>,
}

#[cfg(feature = "database")]
impl TryFrom<PgBiaReportRow> for BiaReportListing {
    type Error = DbError;

    fn try_from(row: PgBiaReportRow) -> Result<Self, Self::Error> {
        Ok(BiaReportListing {
            report: BiaReport {
                id: row.id,
                incident_id: row.incident_id,
                risk_level: parse_risk(&row.risk_level)?,
                operational: row.operational,
                managerial: row.managerial,
                bia_description: row.bia_description,
                created_at: row.created_at,
            },
            incident_title: row.incident_title,
        })
    }
}
