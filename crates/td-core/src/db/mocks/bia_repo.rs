//! Mock implementation of BiaReportRepository for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::bia::{BiaReport, BiaReportListing};
use crate::db::{BiaReportRepository, DbError, IncidentRepository};

/// Mock implementation of BiaReportRepository using in-memory storage.
///
/// Reports are keyed by incident id, so a second insert for the same incident
/// fails with `DbError::Constraint` like the UNIQUE column does.
pub struct MockBiaReportRepository {
    reports: Arc<RwLock<HashMap<Uuid, BiaReport>>>,
    incidents: Option<Arc<dyn IncidentRepository>>,
}

impl Default for MockBiaReportRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBiaReportRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self {
            reports: Arc::new(RwLock::new(HashMap::new())),
            incidents: None,
        }
    }

    /// Resolves incident titles for `list` through `incidents`.
    pub fn with_incident_source(mut self, incidents: Arc<dyn IncidentRepository>) -> Self {
        self.incidents = Some(incidents);
        self
    }

    /// Gets a snapshot of all reports in the mock.
    pub async fn snapshot(&self) -> Vec<BiaReport> {
        self.reports.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl BiaReportRepository for MockBiaReportRepository {
    async fn create(&self, report: &BiaReport) -> Result<BiaReport, DbError> {
        let mut reports = self.reports.write().await;

        if reports.contains_key(&report.incident_id) {
            return Err(DbError::Constraint(format!(
                "UNIQUE constraint failed: bia_reports.incident_id ({})",
                report.incident_id
            )));
        }

        reports.insert(report.incident_id, report.clone());
        Ok(report.clone())
    }

    async fn get_for_incident(&self, incident_id: Uuid) -> Result<Option<BiaReport>, DbError> {
        Ok(self.reports.read().await.get(&incident_id).cloned())
    }

    async fn list(&self) -> Result<Vec<BiaReportListing>, DbError> {
        let mut reports: Vec<BiaReport> = self.reports.read().await.values().cloned().collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut listings = Vec::with_capacity(reports.len());
        for report in reports {
            let incident_title = match &self.incidents {
                Some(incidents) => incidents.get(report.incident_id).await?.map(|i| i.title),
                None => None,
            };
            listings.push(BiaReportListing {
                report,
                incident_title,
            });
        }
        Ok(listings)
    }

    async fn count(&self) -> Result<u64, DbError> {
        Ok(self.reports.read().await.len() as u64)
    }
}
