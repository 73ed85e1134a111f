//! Mock implementation of AuditRepository for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audit::AuditLogEntry;
use crate::db::{AuditRepository, DbError};

/// Mock implementation of AuditRepository using in-memory storage.
///
/// `set_failing(true)` makes every write fail, for exercising the
/// best-effort audit path.
pub struct MockAuditRepository {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
    failing: AtomicBool,
}

impl Default for MockAuditRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuditRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    /// Creates a mock repository pre-populated with entries.
    pub fn with_entries(entries: Vec<AuditLogEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Gets a snapshot of all entries in insertion order.
    pub async fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditRepository for MockAuditRepository {
    async fn log(&self, entry: &AuditLogEntry) -> Result<(), DbError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DbError::Connection("audit store unavailable".to_string()));
        }

        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Vec<AuditLogEntry>, DbError> {
        let entries = self.entries.read().await;

        let mut result: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|e| e.incident_id == incident_id)
            .cloned()
            .collect();

        result.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(result)
    }
}
