//! Mock implementation of FeedbackRepository for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{DbError, FeedbackRepository, FeedbackUpdate, IncidentRepository};
use crate::feedback::{FeedbackEntry, FeedbackListing};

/// Mock implementation of FeedbackRepository using in-memory storage.
pub struct MockFeedbackRepository {
    entries: Arc<RwLock<HashMap<Uuid, FeedbackEntry>>>,
    incidents: Option<Arc<dyn IncidentRepository>>,
}

impl Default for MockFeedbackRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFeedbackRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    /// Creates a mock repository pre-populated with entries.
    pub fn with_entries(entries: Vec<FeedbackEntry>) -> Self {
        let map: HashMap<Uuid, FeedbackEntry> = entries.into_iter().map(|e| (e.id, e)).collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
            incidents: None,
        }
    }

    /// Resolves incident titles for `list_all` through `incidents`.
    pub fn with_incident_source(mut self, incidents: Arc<dyn IncidentRepository>) -> Self {
        self.incidents = Some(incidents);
        self
    }

    /// Gets a snapshot of all entries in the mock.
    pub async fn snapshot(&self) -> Vec<FeedbackEntry> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl FeedbackRepository for MockFeedbackRepository {
    async fn create(&self, entry: &FeedbackEntry) -> Result<FeedbackEntry, DbError> {
        let mut entries = self.entries.write().await;

        if entries.contains_key(&entry.id) {
            return Err(DbError::Constraint(format!(
                "Feedback with id '{}' already exists",
                entry.id
            )));
        }

        entries.insert(entry.id, entry.clone());
        Ok(entry.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FeedbackEntry>, DbError> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn list_for_incidents(
        &self,
        incident_ids: &[Uuid],
    ) -> Result<Vec<FeedbackEntry>, DbError> {
        let entries = self.entries.read().await;

        let mut result: Vec<FeedbackEntry> = entries
            .values()
            .filter(|e| incident_ids.contains(&e.incident_id))
            .cloned()
            .collect();

        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    async fn list_all(&self) -> Result<Vec<FeedbackListing>, DbError> {
        let mut entries: Vec<FeedbackEntry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut listings = Vec::with_capacity(entries.len());
        for entry in entries {
            let incident_title = match &self.incidents {
                Some(incidents) => incidents.get(entry.incident_id).await?.map(|i| i.title),
                None => None,
            };
            listings.push(FeedbackListing {
                entry,
                incident_title,
            });
        }
        Ok(listings)
    }

    async fn update(&self, id: Uuid, update: &FeedbackUpdate) -> Result<FeedbackEntry, DbError> {
        let mut entries = self.entries.write().await;

        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("Feedback", id))?;

        update.apply_to(entry);
        Ok(entry.clone())
    }

    async fn delete_for_incident(&self, incident_id: Uuid) -> Result<u64, DbError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.incident_id != incident_id);
        Ok((before - entries.len()) as u64)
    }
}
