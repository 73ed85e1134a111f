//! Mock implementation of IncidentRepository for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{DbError, IncidentFilter, IncidentRepository, IncidentUpdate};
use crate::incident::{Incident, IncidentStatus};

/// Mock implementation of IncidentRepository using in-memory storage.
///
/// `set_failing_deletes(true)` makes `delete` fail without removing anything.
pub struct MockIncidentRepository {
    incidents: Arc<RwLock<HashMap<Uuid, Incident>>>,
    failing_deletes: AtomicBool,
}

impl Default for MockIncidentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIncidentRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self::with_incidents(Vec::new())
    }

    /// Creates a mock repository pre-populated with incidents.
    pub fn with_incidents(incidents: Vec<Incident>) -> Self {
        let map: HashMap<Uuid, Incident> = incidents.into_iter().map(|i| (i.id, i)).collect();
        Self {
            incidents: Arc::new(RwLock::new(map)),
            failing_deletes: AtomicBool::new(false),
        }
    }

    pub fn set_failing_deletes(&self, failing: bool) {
        self.failing_deletes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl IncidentRepository for MockIncidentRepository {
    async fn create(&self, incident: &Incident) -> Result<Incident, DbError> {
        let mut incidents = self.incidents.write().await;

        if incidents.contains_key(&incident.id) {
            return Err(DbError::Constraint(format!(
                "Incident with id '{}' already exists",
                incident.id
            )));
        }

        incidents.insert(incident.id, incident.clone());
        Ok(incident.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Incident>, DbError> {
        let incidents = self.incidents.read().await;
        Ok(incidents.get(&id).cloned())
    }

    async fn list(&self, filter: &IncidentFilter) -> Result<Vec<Incident>, DbError> {
        let incidents = self.incidents.read().await;

        let mut result: Vec<Incident> = incidents
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, DbError> {
        let incidents = self.incidents.read().await;
        Ok(incidents.values().filter(|i| filter.matches(i)).count() as u64)
    }

    async fn count_by_status(&self) -> Result<HashMap<IncidentStatus, u64>, DbError> {
        let incidents = self.incidents.read().await;
        let mut counts = HashMap::new();
        for incident in incidents.values() {
            *counts.entry(incident.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn update(&self, id: Uuid, update: &IncidentUpdate) -> Result<Incident, DbError> {
        let mut incidents = self.incidents.write().await;

        let incident = incidents
            .get_mut(&id)
            .ok_or_else(|| DbError::not_found("Incident", id))?;

        update.apply_to(incident, Utc::now());
        Ok(incident.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        if self.failing_deletes.load(Ordering::SeqCst) {
            return Err(DbError::Connection("incident store unavailable".to_string()));
        }
        let mut incidents = self.incidents.write().await;
        Ok(incidents.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Severity;
    use chrono::Duration;

    #[tokio::test]
    async fn test_list_is_newest_first_and_filtered() {
        let reporter = Uuid::new_v4();
        let mut older = Incident::new(reporter, "Lost Device", "phone", Severity::Low);
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = Incident::new(reporter, "Data Breach", "db dump", Severity::High);
        let other = Incident::new(Uuid::new_v4(), "Lost Device", "badge", Severity::Low);

        let repo = MockIncidentRepository::with_incidents(vec![
            older.clone(),
            newer.clone(),
            other,
        ]);

        let mine = repo.list(&IncidentFilter::reported_by(reporter)).await.unwrap();
        assert_eq!(
            mine.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );
        assert_eq!(
            repo.count(&IncidentFilter::title_contains("lost")).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_update_missing_incident() {
        let repo = MockIncidentRepository::new();
        let result = repo
            .update(Uuid::new_v4(), &IncidentUpdate::default())
            .await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let mut resolved = Incident::new(Uuid::new_v4(), "Data Breach", "x", Severity::High);
        resolved.status = IncidentStatus::Resolved;
        let repo = MockIncidentRepository::with_incidents(vec![
            resolved,
            Incident::new(Uuid::new_v4(), "Lost Device", "y", Severity::Low),
            Incident::new(Uuid::new_v4(), "Lost Device", "z", Severity::Low),
        ]);

        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(counts.get(&IncidentStatus::Open), Some(&2));
        assert_eq!(counts.get(&IncidentStatus::Resolved), Some(&1));
        assert_eq!(counts.get(&IncidentStatus::InProgress), None);
    }
}
