//! Incident repository for database operations.

use super::{DbError, DbPool};
use crate::incident::{Incident, IncidentStatus, RiskLevel, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Filter criteria for listing incidents.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    /// Only incidents filed by this user.
    pub reported_by: Option<Uuid>,
    /// Filter by the BIA flag.
    pub bia_report: Option<bool>,
    /// Filter by status.
    pub status: Option<IncidentStatus>,
    /// Case-insensitive substring match on the title.
    pub title_query: Option<String>,
}

impl IncidentFilter {
    /// Incidents filed by `user_id`.
    pub fn reported_by(user_id: Uuid) -> Self {
        Self {
            reported_by: Some(user_id),
            ..Default::default()
        }
    }

    /// Incidents flagged for a BIA report.
    pub fn bia_flagged() -> Self {
        Self {
            bia_report: Some(true),
            ..Default::default()
        }
    }

    /// Incidents whose title contains `query`.
    pub fn title_contains(query: impl Into<String>) -> Self {
        Self {
            title_query: Some(query.into()),
            ..Default::default()
        }
    }

    /// Returns true if `incident` passes every set criterion.
    pub fn matches(&self, incident: &Incident) -> bool {
        if let Some(reporter) = self.reported_by {
            if incident.reported_by != reporter {
                return false;
            }
        }
        if let Some(flag) = self.bia_report {
            if incident.bia_report != flag {
                return false;
            }
        }
        if let Some(status) = self.status {
            if incident.status != status {
                return false;
            }
        }
        if let Some(query) = &self.title_query {
            let query = query.trim().to_lowercase();
            if !incident.title.to_lowercase().contains(&query) {
                return false;
            }
        }
        true
    }
}

/// Partial update for an incident.
///
/// Outer `None` leaves a column untouched; `Some(None)` clears a nullable one.
/// `updated_at` is always refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentUpdate {
    pub status: Option<IncidentStatus>,
    pub risk_level: Option<Option<RiskLevel>>,
    pub admin_solution: Option<Option<String>>,
    pub admin_notes: Option<Option<String>>,
    pub bia_report: Option<bool>,
}

impl IncidentUpdate {
    /// Returns true if no column would change.
    pub fn is_empty(&self) -> bool {
        self == &IncidentUpdate::default()
    }

    /// Applies the update to an in-memory incident.
    pub fn apply_to(&self, incident: &mut Incident, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            incident.status = status;
        }
        if let Some(risk) = self.risk_level {
            incident.risk_level = risk;
        }
        if let Some(solution) = &self.admin_solution {
            incident.admin_solution = solution.clone();
        }
        if let Some(notes) = &self.admin_notes {
            incident.admin_notes = notes.clone();
        }
        if let Some(flag) = self.bia_report {
            incident.bia_report = flag;
        }
        incident.updated_at = now;
    }
}

/// Repository trait for incident persistence.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// Inserts a new incident.
    async fn create(&self, incident: &Incident) -> Result<Incident, DbError>;

    /// Gets an incident by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Incident>, DbError>;

    /// Lists incidents matching the filter, newest first.
    async fn list(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, DbError>;

    /// Counts incidents matching the filter.
    async fn count(&self, filter: &IncidentFilter) -> Result<u64, DbError>;

    /// Counts incidents per status. Statuses with no incidents are absent.
    async fn count_by_status(&self) -> Result<HashMap<IncidentStatus, u64>, DbError>;

    /// Applies a partial update and returns the stored incident.
    async fn update(&self, id: Uuid, update: &IncidentUpdate) -> Result<Incident, DbError>;

    /// Deletes an incident. Returns false if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;
}

/// SQLite implementation of IncidentRepository.
#[cfg(feature = "database")]
pub struct SqliteIncidentRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteIncidentRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    fn where_clause(filter: &IncidentFilter) -> String {
        let mut clause = String::from(" WHERE 1=1");
        if filter.reported_by.is_some() {
            clause.push_str(" AND reported_by = ?");
        }
        if filter.bia_report.is_some() {
            clause.push_str(" AND bia_report = ?");
        }
        if filter.status.is_some() {
            clause.push_str(" AND status = ?");
        }
        if filter.title_query.is_some() {
            // LIKE is case-insensitive for ASCII in SQLite.
            clause.push_str(" AND title LIKE ? ESCAPE '\\'");
        }
        clause
    }
}

#[cfg(feature = "database")]
const SQLITE_INCIDENT_COLUMNS: &str = "id, title, description, severity, status, risk_level, admin_solution, admin_notes, reported_by, bia_report, created_at, updated_at";

/// Binds filter values in the order `where_clause` declares them.
#[cfg(feature = "database")]
macro_rules! bind_incident_filter {
    ($query:expr, $filter:expr) => {{
        let mut q = $query;
        if let Some(reporter) = $filter.reported_by {
            q = q.bind(reporter.to_string());
        }
        if let Some(flag) = $filter.bia_report {
            q = q.bind(flag);
        }
        if let Some(status) = $filter.status {
            q = q.bind(status.as_db_str());
        }
        if let Some(search) = &$filter.title_query {
            q = q.bind(super::make_like_pattern(search));
        }
        q
    }};
}

#[cfg(feature = "database")]
#[async_trait]
impl IncidentRepository for SqliteIncidentRepository {
    async fn create(&self, incident: &Incident) -> Result<Incident, DbError> {
        sqlx::query(
            r#"
            INSERT INTO incidents (id, title, description, severity, status, risk_level, admin_solution, admin_notes, reported_by, bia_report, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(incident.id.to_string())
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.severity.as_db_str())
        .bind(incident.status.as_db_str())
        .bind(incident.risk_level.map(|r| r.as_db_str()))
        .bind(&incident.admin_solution)
        .bind(&incident.admin_notes)
        .bind(incident.reported_by.to_string())
        .bind(incident.bia_report)
        .bind(incident.created_at.to_rfc3339())
        .bind(incident.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(incident.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Incident>, DbError> {
        let query = format!("SELECT {} FROM incidents WHERE id = ?", SQLITE_INCIDENT_COLUMNS);
        let row: Option<IncidentRow> = sqlx::query_as(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Incident::try_from).transpose()
    }

    async fn list(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, DbError> {
        let query = format!(
            "SELECT {} FROM incidents{} ORDER BY created_at DESC",
            SQLITE_INCIDENT_COLUMNS,
            Self::where_clause(filter)
        );
        let rows: Vec<IncidentRow> =
            bind_incident_filter!(sqlx::query_as::<_, IncidentRow>(&query), filter)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Incident::try_from).collect()
    }

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, DbError> {
        let query = format!("SELECT COUNT(*) FROM incidents{}", Self::where_clause(filter));
        let count: i64 = bind_incident_filter!(sqlx::query_scalar::<_, i64>(&query), filter)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn count_by_status(&self) -> Result<HashMap<IncidentStatus, u64>, DbError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM incidents GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_status(&status)?, count as u64)))
            .collect()
    }

    async fn update(&self, id: Uuid, update: &IncidentUpdate) -> Result<Incident, DbError> {
        let mut set_clauses = vec!["updated_at = ?"];
        let mut values: Vec<Option<String>> = vec![Some(Utc::now().to_rfc3339())];

        if let Some(status) = update.status {
            set_clauses.push("status = ?");
            values.push(Some(status.as_db_str().to_string()));
        }
        if let Some(risk) = update.risk_level {
            set_clauses.push("risk_level = ?");
            values.push(risk.map(|r| r.as_db_str().to_string()));
        }
        if let Some(solution) = &update.admin_solution {
            set_clauses.push("admin_solution = ?");
            values.push(solution.clone());
        }
        if let Some(notes) = &update.admin_notes {
            set_clauses.push("admin_notes = ?");
            values.push(notes.clone());
        }
        match update.bia_report {
            Some(true) => set_clauses.push("bia_report = 1"),
            Some(false) => set_clauses.push("bia_report = 0"),
            None => {}
        }

        let query = format!(
            "UPDATE incidents SET {} WHERE id = ?",
            set_clauses.join(", ")
        );

        let mut query_builder = sqlx::query(&query);
        for value in values {
            query_builder = query_builder.bind(value);
        }
        let result = query_builder
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Incident", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Incident", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// PostgreSQL implementation of IncidentRepository.
#[cfg(feature = "database")]
pub struct PgIncidentRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgIncidentRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl IncidentRepository for PgIncidentRepository {
    async fn create(&self, incident: &Incident) -> Result<Incident, DbError> {
        sqlx::query(
            r#"
            INSERT INTO incidents (id, title, description, severity, status, risk_level, admin_solution, admin_notes, reported_by, bia_report, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.severity.as_db_str())
        .bind(incident.status.as_db_str())
        .bind(incident.risk_level.map(|r| r.as_db_str()))
        .bind(&incident.admin_solution)
        .bind(&incident.admin_notes)
        .bind(incident.reported_by)
        .bind(incident.bia_report)
        .bind(incident.created_at)
        .bind(incident.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(incident.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Incident>, DbError> {
        let row: Option<PgIncidentRow> = sqlx::query_as(
            r#"
            SELECT id, title, description, severity, status, risk_level, admin_solution, admin_notes, reported_by, bia_report, created_at, updated_at
            FROM incidents WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Incident::try_from).transpose()
    }

    async fn list(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, DbError> {
        use super::make_like_pattern;

        let search_pattern = filter.title_query.as_deref().map(make_like_pattern);

        let rows: Vec<PgIncidentRow> = sqlx::query_as(
            r#"
            SELECT id, title, description, severity, status, risk_level, admin_solution, admin_notes, reported_by, bia_report, created_at, updated_at
            FROM incidents
            WHERE ($1::uuid IS NULL OR reported_by = $1)
              AND ($2::boolean IS NULL OR bia_report = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::text IS NULL OR title ILIKE $4)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.reported_by)
        .bind(filter.bia_report)
        .bind(filter.status.map(|s| s.as_db_str()))
        .bind(&search_pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Incident::try_from).collect()
    }

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, DbError> {
        use super::make_like_pattern;

        let search_pattern = filter.title_query.as_deref().map(make_like_pattern);

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM incidents
            WHERE ($1::uuid IS NULL OR reported_by = $1)
              AND ($2::boolean IS NULL OR bia_report = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::text IS NULL OR title ILIKE $4)
            "#,
        )
        .bind(filter.reported_by)
        .bind(filter.bia_report)
        .bind(filter.status.map(|s| s.as_db_str()))
        .bind(&search_pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn count_by_status(&self) -> Result<HashMap<IncidentStatus, u64>, DbError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM incidents GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_status(&status)?, count as u64)))
            .collect()
    }

    async fn update(&self, id: Uuid, update: &IncidentUpdate) -> Result<Incident, DbError> {
        let row: Option<PgIncidentRow> = sqlx::query_as(
            r#"
            UPDATE incidents SET
                status = COALESCE($2, status),
                risk_level = CASE WHEN $3 THEN $4 ELSE risk_level END,
                admin_solution = CASE WHEN $5 THEN $6 ELSE admin_solution END,
                admin_notes = CASE WHEN $7 THEN $8 ELSE admin_notes END,
                bia_report = COALESCE($9, bia_report),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, description, severity, status, risk_level, admin_solution, admin_notes, reported_by, bia_report, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.status.map(|s| s.as_db_str()))
        .bind(update.risk_level.is_some())
        .bind(update.risk_level.flatten().map(|r| r.as_db_str()))
        .bind(update.admin_solution.is_some())
        .bind(update.admin_solution.clone().flatten())
        .bind(update.admin_notes.is_some())
        .bind(update.admin_notes.clone().flatten())
        .bind(update.bia_report)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Incident::try_from)
            .transpose()?
            .ok_or_else(|| DbError::not_found("Incident", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Factory function to create the appropriate repository based on pool type.
#[cfg(feature = "database")]
pub fn create_incident_repository(pool: &DbPool) -> Box<dyn IncidentRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteIncidentRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgIncidentRepository::new(pool.clone())),
    }
}

#[cfg(feature = "database")]
fn parse_status(s: &str) -> Result<IncidentStatus, DbError> {
    IncidentStatus::from_db_str(s)
        .ok_or_else(|| DbError::Serialization(format!("Unknown status: {}", s)))
}

#[cfg(feature = "database")]
fn parse_severity(s: &str) -> Result<Severity, DbError> {
    Severity::from_db_str(s)
        .ok_or_else(|| DbError::Serialization(format!("Unknown severity: {}", s)))
}

#[cfg(feature = "database")]
fn parse_risk(s: Option<&str>) -> Result<Option<RiskLevel>, DbError> {
    s.map(|s| {
        RiskLevel::from_db_str(s)
            .ok_or_else(|| DbError::Serialization(format!("Unknown risk level: {}", s)))
    })
    .transpose()
}

// Helper structs for SQLx row mapping

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct IncidentRow {
    id: String,
    title: String,
    description: String,
    severity: String,
    status: String,
    risk_level: Option<String>,
    admin_solution: Option<String>,
    admin_notes: Option<String>,
    reported_by: String,
    bia_report: bool,
    created_at: String,
    updated_at: String,
}

#[cfg(feature = "database")]
impl TryFrom<IncidentRow> for Incident {
    type Error = DbError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        Ok(Incident {
            id: Uuid::parse_str(&row.id)?,
            title: row.title,
            description: row.description,
            severity: parse_severity(&row.severity)?,
            status: parse_status(&row.status)?,
            risk_level: parse_risk(row.risk_level.as_deref())?,
            admin_solution: row.admin_solution,
            admin_notes: row.admin_notes,
            reported_by: Uuid::parse_str(&row.reported_by)?,
            bia_report: row.bia_report,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)?.with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&row.updated_at)?.with_timezone(&Utc),
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgIncidentRow {
    id: Uuid,
    title: String,
    description: String,
    severity: String,
    status: String,
    risk_level: Option<String>,
    admin_solution: Option<String>,
    admin_notes: Option<String>,
    reported_by: Uuid,
    bia_report: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[cfg(feature = "database")]
impl TryFrom<PgIncidentRow> for Incident {
    type Error = DbError;

    fn try_from(row: PgIncidentRow) -> Result<Self, Self::Error> {
        Ok(Incident {
            id: row.id,
            title: row.title,
            description: row.description,
            severity: parse_severity(&row.severity)?,
            status: parse_status(&row.status)?,
            risk_level: parse_risk(row.risk_level.as_deref())?,
            admin_solution: row.admin_solution,
            admin_notes: row.admin_notes,
            reported_by: row.reported_by,
            bia_report: row.bia_report,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
