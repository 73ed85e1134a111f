//! Feedback repository for database operations.

use super::{DbError, DbPool};
#[cfg(feature = "database")]
use crate::feedback::FeedbackType;
use crate::feedback::{FeedbackEntry, FeedbackListing, FeedbackStatus};
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Partial update for a feedback entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackUpdate {
    pub admin_solution: Option<String>,
    pub status: Option<FeedbackStatus>,
}

impl FeedbackUpdate {
    /// Applies the update to an in-memory entry.
    pub fn apply_to(&self, entry: &mut FeedbackEntry) {
        if let Some(solution) = &self.admin_solution {
            entry.admin_solution = Some(solution.clone());
        }
        if let Some(status) = self.status {
            entry.status = status;
        }
    }
}

/// Repository trait for feedback persistence.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Inserts a feedback entry.
    async fn create(&self, entry: &FeedbackEntry) -> Result<FeedbackEntry, DbError>;

    /// Gets a feedback entry by ID.
    async fn get(&self, id: Uuid) -> Result<Option<FeedbackEntry>, DbError>;

    /// Lists feedback attached to any of the given incidents, oldest first.
    async fn list_for_incidents(&self, incident_ids: &[Uuid])
        -> Result<Vec<FeedbackEntry>, DbError>;

    /// Lists all feedback with its incident title, newest first.
    async fn list_all(&self) -> Result<Vec<FeedbackListing>, DbError>;

    /// Applies a partial update and returns the stored entry.
    async fn update(&self, id: Uuid, update: &FeedbackUpdate) -> Result<FeedbackEntry, DbError>;

    /// Deletes every entry attached to an incident. Returns the number removed.
    async fn delete_for_incident(&self, incident_id: Uuid) -> Result<u64, DbError>;
}

/// SQLite implementation of FeedbackRepository.
#[cfg(feature = "database")]
pub struct SqliteFeedbackRepository {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteFeedbackRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl FeedbackRepository for SqliteFeedbackRepository {
    async fn create(&self, entry: &FeedbackEntry) -> Result<FeedbackEntry, DbError> {
        sqlx::query(
            r#"
            INSERT INTO feedbacks (id, incident_id, user_id, feedback_type, feedback_text, admin_solution, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.incident_id.to_string())
        .bind(entry.user_id.to_string())
        .bind(entry.feedback_type.as_db_str())
        .bind(&entry.feedback_text)
        .bind(&entry.admin_solution)
        .bind(entry.status.as_db_str())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(entry.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FeedbackEntry>, DbError> {
        let row: Option<FeedbackRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, user_id, feedback_type, feedback_text, admin_solution, status, created_at, NULL AS incident_title
            FROM feedbacks
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| FeedbackListing::try_from(r).map(|l| l.entry))
            .transpose()
    }

    async fn list_for_incidents(
        &self,
        incident_ids: &[Uuid],
    ) -> Result<Vec<FeedbackEntry>, DbError> {
        if incident_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = incident_ids.iter().map(Uuid::to_string).collect();

        let rows: Vec<FeedbackRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, user_id, feedback_type, feedback_text, admin_solution, status, created_at, NULL AS incident_title
            FROM feedbacks
            WHERE incident_id IN (SELECT value FROM json_each(?))
            ORDER BY created_at ASC
            "#,
        )
        .bind(serde_json::to_string(&ids)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| FeedbackListing::try_from(r).map(|l| l.entry))
            .collect()
    }

    async fn list_all(&self) -> Result<Vec<FeedbackListing>, DbError> {
        let rows: Vec<FeedbackRow> = sqlx::query_as(
            r#"
            SELECT f.id, f.incident_id, f.user_id, f.feedback_type, f.feedback_text, f.admin_solution, f.status, f.created_at,
                   i.title AS incident_title
            FROM feedbacks f
            LEFT JOIN incidents i ON i.id = f.incident_id
            ORDER BY f.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FeedbackListing::try_from).collect()
    }

    async fn update(&self, id: Uuid, update: &FeedbackUpdate) -> Result<FeedbackEntry, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE feedbacks SET
                admin_solution = COALESCE(?, admin_solution),
                status = COALESCE(?, status)
            WHERE id = ?
            "#,
        )
        .bind(&update.admin_solution)
        .bind(update.status.map(|s| s.as_db_str()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Feedback", id));
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Feedback", id))
    }

    async fn delete_for_incident(&self, incident_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM feedbacks WHERE incident_id = ?")
            .bind(incident_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// PostgreSQL implementation of FeedbackRepository.
#[cfg(feature = "database")]
pub struct PgFeedbackRepository {
    pool: sqlx::PgPool,
}

#[cfg(feature = "database")]
impl PgFeedbackRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl FeedbackRepository for PgFeedbackRepository {
    async fn create(&self, entry: &FeedbackEntry) -> Result<FeedbackEntry, DbError> {
        sqlx::query(
            r#"
            INSERT INTO feedbacks (id, incident_id, user_id, feedback_type, feedback_text, admin_solution, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.incident_id)
        .bind(entry.user_id)
        .bind(entry.feedback_type.as_db_str())
        .bind(&entry.feedback_text)
        .bind(&entry.admin_solution)
        .bind(entry.status.as_db_str())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(entry.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FeedbackEntry>, DbError> {
        let row: Option<PgFeedbackRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, user_id, feedback_type, feedback_text, admin_solution, status, created_at, NULL::text AS incident_title
            FROM feedbacks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| FeedbackListing::try_from(r).map(|l| l.entry))
            .transpose()
    }

    async fn list_for_incidents(
        &self,
        incident_ids: &[Uuid],
    ) -> Result<Vec<FeedbackEntry>, DbError> {
        if incident_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<PgFeedbackRow> = sqlx::query_as(
            r#"
            SELECT id, incident_id, user_id, feedback_type, feedback_text, admin_solution, status, created_at, NULL::text AS incident_title
            FROM feedbacks
            WHERE incident_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(incident_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| FeedbackListing::try_from(r).map(|l| l.entry))
            .collect()
    }

    async fn list_all(&self) -> Result<Vec<FeedbackListing>, DbError> {
        let rows: Vec<PgFeedbackRow> = sqlx::query_as(
            r#"
            SELECT f.id, f.incident_id, f.user_id, f.feedback_type, f.feedback_text, f.admin_solution, f.status, f.created_at,
                   i.title AS incident_title
            FROM feedbacks f
            LEFT JOIN incidents i ON i.id = f.incident_id
            ORDER BY f.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FeedbackListing::try_from).collect()
    }

    async fn update(&self, id: Uuid, update: &FeedbackUpdate) -> Result<FeedbackEntry, DbError> {
        let row: Option<PgFeedbackRow> = sqlx::query_as(
            r#"
            UPDATE feedbacks SET
                admin_solution = COALESCE($2, admin_solution),
                status = COALESCE($3, status)
            WHERE id = $1
            RETURNING id, incident_id, user_id, feedback_type, feedback_text, admin_solution, status, created_at, NULL::text AS incident_title
            "#,
        )
        .bind(id)
        .bind(&update.admin_solution)
        .bind(update.status.map(|s| s.as_db_str()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| FeedbackListing::try_from(r).map(|l| l.entry))
            .transpose()?
            .ok_or_else(|| DbError::not_found("Feedback", id))
    }

    async fn delete_for_incident(&self, incident_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM feedbacks WHERE incident_id = $1")
            .bind(incident_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Factory function to create the appropriate repository based on pool type.
#[cfg(feature = "database")]
pub fn create_feedback_repository(pool: &DbPool) -> Box<dyn FeedbackRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteFeedbackRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgFeedbackRepository::new(pool.clone())),
    }
}

#[cfg(feature = "database")]
fn parse_feedback_status(s: &str) -> Result<FeedbackStatus, DbError> {
    FeedbackStatus::from_db_str(s)
        .ok_or_else(|| DbError::Serialization(format!("Unknown feedback status: {}", s)))
}

// Helper structs for SQLx row mapping

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: String,
    incident_id: String,
    user_id: String,
    feedback_type: String,
    feedback_text: String,
    admin_solution: Option<String>,
    status: String,
    created_at: String,
    incident_title: Option<String>,
}

#[cfg(feature = "database")]
impl TryFrom<FeedbackRow> for FeedbackListing {
    type Error = DbError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        Ok(FeedbackListing {
            entry: FeedbackEntry {
                id: Uuid::parse_str(&row.id)?,
                incident_id: Uuid::parse_str(&row.incident_id)?,
                user_id: Uuid::parse_str(&row.user_id)?,
                feedback_type: FeedbackType::from_db_str(&row.feedback_type),
                feedback_text: row.feedback_text,
                admin_solution: row.admin_solution,
                status: parse_feedback_status(&row.status)?,
                created_at: DateTime::parse_from_rfc3339(&row.created_at)?.with_timezone(&Utc),
            },
            incident_title: row.incident_title,
        })
    }
}

#[cfg(feature = "database")]
#[derive(sqlx::FromRow)]
struct PgFeedbackRow {
    id: Uuid,
    incident_id: Uuid,
    user_id: Uuid,
    feedback_type: String,
    feedback_text: String,
    admin_solution: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    incident_title: Option<String>,
}

#[cfg(feature = "database")]
impl TryFrom<PgFeedbackRow> for FeedbackListing {
    type Error = DbError;

    fn try_from(row: PgFeedbackRow) -> Result<Self, Self::Error> {
        Ok(FeedbackListing {
            entry: FeedbackEntry {
                id: row.id,
                incident_id: row.incident_id,
                user_id: row.user_id,
                feedback_type: FeedbackType::from_db_str(&row.feedback_type),
                feedback_text: row.feedback_text,
                admin_solution: row.admin_solution,
                status: parse_feedback_status(&row.status)?,
                created_at: row.created_at,
            },
            incident_title: row.incident_title,
        })
    }
}
