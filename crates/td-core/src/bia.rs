//! Business Impact Analysis (BIA) report workflow.
//!
//! An incident becomes eligible for a BIA report once it is resolved and an
//! administrator has flagged it. Each eligible incident yields at most one
//! report; reports are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::Actor;
use crate::catalog::{self, Recommendations};
use crate::db::{BiaReportRepository, DbError, IncidentFilter, IncidentRepository, Repositories};
use crate::error::{require, TriageError, TriageResult};
use crate::incident::{Incident, RiskLevel};

/// Title shown for a report whose incident no longer exists.
pub const UNKNOWN_INCIDENT_TITLE: &str = "Unknown Incident";

/// A stored BIA report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiaReport {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub risk_level: RiskLevel,
    /// Operational impact and remediation.
    pub operational: String,
    /// Managerial impact and remediation.
    pub managerial: String,
    /// Optional free-text summary.
    pub bia_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A report together with the title of the incident it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiaReportListing {
    pub report: BiaReport,
    pub incident_title: Option<String>,
}

impl BiaReportListing {
    /// Returns the incident title, or "Unknown Incident" if the incident is gone.
    pub fn title(&self) -> &str {
        self.incident_title
            .as_deref()
            .unwrap_or(UNKNOWN_INCIDENT_TITLE)
    }
}

/// Input for creating a BIA report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBiaReport {
    pub incident_id: Uuid,
    pub risk_level: Option<RiskLevel>,
    pub operational: Option<String>,
    pub managerial: Option<String>,
    pub summary: Option<String>,
}

impl NewBiaReport {
    /// Creates a fully populated request without a summary.
    pub fn new(
        incident_id: Uuid,
        risk_level: RiskLevel,
        operational: impl Into<String>,
        managerial: impl Into<String>,
    ) -> Self {
        Self {
            incident_id,
            risk_level: Some(risk_level),
            operational: Some(operational.into()),
            managerial: Some(managerial.into()),
            summary: None,
        }
    }

    /// Sets the optional summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Governs BIA eligibility and report creation.
pub struct BiaWorkflow {
    incidents: Arc<dyn IncidentRepository>,
    reports: Arc<dyn BiaReportRepository>,
    creation_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl BiaWorkflow {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            incidents: repos.incidents.clone(),
            reports: repos.bia_reports.clone(),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lists incidents flagged for a BIA report, newest first.
    pub async fn list_eligible(&self) -> TriageResult<Vec<Incident>> {
        Ok(self.incidents.list(&IncidentFilter::bia_flagged()).await?)
    }

    /// Returns catalog recommendations for an incident type.
    pub fn recommendations_for(&self, incident_type: &str) -> Recommendations {
        catalog::recommendations_for(incident_type)
    }

    /// Pre-fills a report for an incident from its effective risk and the
    /// catalog entry for its type. Nothing is written.
    pub async fn draft_report(&self, incident_id: Uuid) -> TriageResult<NewBiaReport> {
        let incident = self
            .incidents
            .get(incident_id)
            .await?
            .ok_or_else(|| TriageError::not_found("Incident", incident_id))?;

        let recs = catalog::recommendations_for(&incident.title);
        Ok(NewBiaReport {
            incident_id,
            risk_level: Some(incident.effective_risk()),
            operational: Some(recs.operational.join("\n")),
            managerial: Some(recs.managerial.join("\n")),
            summary: None,
        })
    }

    /// Creates the BIA report for a resolved, flagged incident.
    ///
    /// Creation is serialized per incident. A uniqueness violation from the
    /// store is reported as `Duplicate` as well.
    #[instrument(skip(self, actor, request), fields(incident_id = %request.incident_id, actor = %actor.identity()))]
    pub async fn create_report(
        &self,
        actor: &Actor,
        request: NewBiaReport,
    ) -> TriageResult<BiaReport> {
        let incident_id = request.incident_id;

        if !actor.can_administer() {
            warn!("Non-admin attempted to create a BIA report");
            return Err(TriageError::PermissionDenied {
                action: "create BIA report".to_string(),
                actor: actor.identity(),
            });
        }

        let risk_level = request
            .risk_level
            .ok_or_else(|| TriageError::validation("risk level is required"))?;
        let operational = require("operational impact", request.operational.as_deref())?;
        let managerial = require("managerial impact", request.managerial.as_deref())?;
        let summary = request
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let lock = self.creation_lock(incident_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.insert_report(incident_id, risk_level, operational, managerial, summary)
                .await
        };
        self.release_lock(incident_id, lock).await;

        let report = result?;
        metrics::counter!("td_bia_reports_created_total").increment(1);
        info!(report_id = %report.id, risk_level = %report.risk_level, "BIA report created");

        Ok(report)
    }

    /// Eligibility and duplicate checks plus the insert. Runs under the
    /// incident's creation lock.
    async fn insert_report(
        &self,
        incident_id: Uuid,
        risk_level: RiskLevel,
        operational: String,
        managerial: String,
        summary: Option<String>,
    ) -> TriageResult<BiaReport> {
        let incident = self
            .incidents
            .get(incident_id)
            .await?
            .ok_or_else(|| TriageError::not_found("Incident", incident_id))?;

        if !incident.is_bia_eligible() {
            return Err(TriageError::InvalidTransition {
                incident_id,
                from: incident.status,
                reason: "incident must be resolved and flagged for BIA".to_string(),
            });
        }

        if self.reports.get_for_incident(incident_id).await?.is_some() {
            return Err(TriageError::Duplicate { incident_id });
        }

        let report = BiaReport {
            id: Uuid::new_v4(),
            incident_id,
            risk_level,
            operational,
            managerial,
            bia_description: summary,
            created_at: Utc::now(),
        };

        match self.reports.create(&report).await {
            Ok(report) => Ok(report),
            Err(DbError::Constraint(_)) => Err(TriageError::Duplicate { incident_id }),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the report for an incident, if one exists.
    pub async fn report_for(&self, incident_id: Uuid) -> TriageResult<Option<BiaReport>> {
        Ok(self.reports.get_for_incident(incident_id).await?)
    }

    /// Lists every report with its incident title, newest first.
    pub async fn list_reports(&self) -> TriageResult<Vec<BiaReportListing>> {
        Ok(self.reports.list().await?)
    }

    async fn creation_lock(&self, incident_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.creation_locks.lock().await;
        locks
            .entry(incident_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the table entry once no other caller holds or waits on it.
    async fn release_lock(&self, incident_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.creation_locks.lock().await;
        // One reference in the table plus ours.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&incident_id);
        }
    }

    #[cfg(test)]
    async fn pending_locks(&self) -> usize {
        self.creation_locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mocks::{
        MockAuditRepository, MockBiaReportRepository, MockFeedbackRepository,
        MockIncidentRepository, MockUserRepository,
    };
    use crate::incident::{IncidentStatus, Severity};

    fn repos_with(incidents: Vec<Incident>) -> Repositories {
        let incidents: Arc<dyn IncidentRepository> =
            Arc::new(MockIncidentRepository::with_incidents(incidents));
        Repositories {
            audit: Arc::new(MockAuditRepository::new()),
            bia_reports: Arc::new(
                MockBiaReportRepository::new().with_incident_source(incidents.clone()),
            ),
            feedback: Arc::new(MockFeedbackRepository::new()),
            users: Arc::new(MockUserRepository::new()),
            incidents,
        }
    }

    fn eligible_incident() -> Incident {
        let mut incident = Incident::new(
            Uuid::new_v4(),
            "Data Breach",
            "customer table exported",
            Severity::High,
        );
        incident.status = IncidentStatus::Resolved;
        incident.bia_report = true;
        incident
    }

    fn request(incident_id: Uuid) -> NewBiaReport {
        NewBiaReport::new(
            incident_id,
            RiskLevel::High,
            "Isolate affected systems.",
            "Strengthen data encryption practices.",
        )
    }

    #[tokio::test]
    async fn test_create_report_then_duplicate() {
        let incident = eligible_incident();
        let workflow = BiaWorkflow::new(&repos_with(vec![incident.clone()]));
        let admin = Actor::admin(Uuid::new_v4());

        let report = workflow
            .create_report(&admin, request(incident.id).with_summary("  Exfiltration  "))
            .await
            .unwrap();
        assert_eq!(report.incident_id, incident.id);
        assert_eq!(report.bia_description.as_deref(), Some("Exfiltration"));

        let second = workflow.create_report(&admin, request(incident.id)).await;
        assert!(matches!(
            second,
            Err(TriageError::Duplicate { incident_id }) if incident_id == incident.id
        ));
        assert_eq!(workflow.pending_locks().await, 0);
    }

    #[tokio::test]
    async fn test_create_report_requires_admin() {
        let incident = eligible_incident();
        let workflow = BiaWorkflow::new(&repos_with(vec![incident.clone()]));

        let result = workflow
            .create_report(&Actor::reporter(incident.reported_by), request(incident.id))
            .await;
        assert!(matches!(result, Err(TriageError::PermissionDenied { .. })));
        assert!(workflow.report_for(incident.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_report_validation() {
        let incident = eligible_incident();
        let workflow = BiaWorkflow::new(&repos_with(vec![incident.clone()]));
        let admin = Actor::admin(Uuid::new_v4());

        let mut missing_risk = request(incident.id);
        missing_risk.risk_level = None;
        assert!(matches!(
            workflow.create_report(&admin, missing_risk).await,
            Err(TriageError::Validation(_))
        ));

        let mut blank_managerial = request(incident.id);
        blank_managerial.managerial = Some("   ".to_string());
        assert!(matches!(
            workflow.create_report(&admin, blank_managerial).await,
            Err(TriageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_report_requires_eligibility() {
        let mut unflagged = eligible_incident();
        unflagged.bia_report = false;
        let workflow = BiaWorkflow::new(&repos_with(vec![unflagged.clone()]));
        let admin = Actor::admin(Uuid::new_v4());

        assert!(matches!(
            workflow.create_report(&admin, request(unflagged.id)).await,
            Err(TriageError::InvalidTransition { .. })
        ));
        assert!(matches!(
            workflow.create_report(&admin, request(Uuid::new_v4())).await,
            Err(TriageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_one_report() {
        let incident = eligible_incident();
        let workflow = Arc::new(BiaWorkflow::new(&repos_with(vec![incident.clone()])));
        let admin = Actor::admin(Uuid::new_v4());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let workflow = workflow.clone();
                tokio::spawn(async move { workflow.create_report(&admin, request(incident.id)).await })
            })
            .collect();

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(TriageError::Duplicate { .. }) => duplicates += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((created, duplicates), (1, 7));
        assert_eq!(workflow.pending_locks().await, 0);
    }

    #[tokio::test]
    async fn test_draft_report_uses_catalog_and_effective_risk() {
        let incident = eligible_incident();
        let workflow = BiaWorkflow::new(&repos_with(vec![incident.clone()]));

        let draft = workflow.draft_report(incident.id).await.unwrap();
        assert_eq!(draft.risk_level, Some(RiskLevel::High));
        assert!(draft
            .operational
            .unwrap()
            .starts_with("Isolate affected systems."));
        assert!(workflow.recommendations_for("printer").is_empty());
    }

    #[tokio::test]
    async fn test_list_reports_falls_back_to_unknown_title() {
        let incident = eligible_incident();
        let repos = repos_with(vec![incident.clone()]);
        let workflow = BiaWorkflow::new(&repos);
        let admin = Actor::admin(Uuid::new_v4());
        workflow
            .create_report(&admin, request(incident.id))
            .await
            .unwrap();

        let listings = workflow.list_reports().await.unwrap();
        assert_eq!(listings[0].title(), "Data Breach");

        repos.incidents.delete(incident.id).await.unwrap();
        let listings = workflow.list_reports().await.unwrap();
        assert_eq!(listings[0].title(), UNKNOWN_INCIDENT_TITLE);
    }
}
