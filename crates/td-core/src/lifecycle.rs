//! Incident lifecycle engine.
//!
//! Owns the status state machine, the administrator-managed fields and the
//! permission checks around them. Every administrator mutation is followed by
//! an audit entry; see [`crate::audit`] for its failure semantics.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditTrail};
use crate::auth::Actor;
use crate::db::{
    FeedbackRepository, IncidentFilter, IncidentRepository, IncidentUpdate, Repositories,
};
use crate::error::{require, TriageError, TriageResult};
use crate::incident::{AdminFields, Incident, IncidentStatus, NewIncident};

/// Result of [`IncidentLifecycle::set_admin_fields`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminFieldsOutcome {
    /// Every supplied field already had that value. Nothing was written.
    NoChange(Incident),
    /// The fields were written and audited.
    Updated(Incident),
}

impl AdminFieldsOutcome {
    /// Returns the incident as it now stands.
    pub fn incident(&self) -> &Incident {
        match self {
            AdminFieldsOutcome::NoChange(i) | AdminFieldsOutcome::Updated(i) => i,
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, AdminFieldsOutcome::NoChange(_))
    }
}

/// Incident lifecycle operations.
#[derive(Clone)]
pub struct IncidentLifecycle {
    incidents: Arc<dyn IncidentRepository>,
    feedback: Arc<dyn FeedbackRepository>,
    audit: AuditTrail,
}

impl IncidentLifecycle {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            incidents: repos.incidents.clone(),
            feedback: repos.feedback.clone(),
            audit: AuditTrail::new(repos.audit.clone()),
        }
    }

    /// Returns the audit trail this engine writes to.
    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    /// Files a new open incident.
    #[instrument(skip(self, request))]
    pub async fn create_incident(
        &self,
        reporter_id: Uuid,
        request: NewIncident,
    ) -> TriageResult<Incident> {
        let title = require("incident type", request.title.as_deref())?;
        let description = require("description", request.description.as_deref())?;
        let severity = request
            .severity
            .ok_or_else(|| TriageError::validation("severity is required"))?;

        let incident = Incident::new(reporter_id, title, description, severity);
        let incident = self.incidents.create(&incident).await?;

        metrics::counter!("td_incidents_created_total").increment(1);
        info!(incident_id = %incident.id, title = %incident.title, "Incident reported");

        Ok(incident)
    }

    /// Gets an incident. Reporters may only read their own.
    pub async fn get_incident(&self, actor: &Actor, incident_id: Uuid) -> TriageResult<Incident> {
        let incident = self.load(incident_id).await?;
        if !actor.can_administer() && !incident.is_reported_by(actor.id) {
            return Err(TriageError::PermissionDenied {
                action: "view incident".to_string(),
                actor: actor.identity(),
            });
        }
        Ok(incident)
    }

    /// Lists incidents, newest first. Reporters only ever see their own.
    pub async fn list_incidents(
        &self,
        actor: &Actor,
        mut filter: IncidentFilter,
    ) -> TriageResult<Vec<Incident>> {
        if !actor.can_administer() {
            filter.reported_by = Some(actor.id);
        }
        Ok(self.incidents.list(&filter).await?)
    }

    /// Case-insensitive title search.
    pub async fn search_by_title(&self, actor: &Actor, query: &str) -> TriageResult<Vec<Incident>> {
        self.list_incidents(actor, IncidentFilter::title_contains(query))
            .await
    }

    /// Lists the incidents a reporter filed, newest first.
    pub async fn list_for_reporter(&self, reporter_id: Uuid) -> TriageResult<Vec<Incident>> {
        Ok(self
            .incidents
            .list(&IncidentFilter::reported_by(reporter_id))
            .await?)
    }

    /// Moves an incident to `new_status`.
    ///
    /// Requesting the current status of an unresolved incident returns it
    /// unchanged without writing.
    #[instrument(skip(self, actor), fields(actor = %actor.identity()))]
    pub async fn set_status(
        &self,
        actor: &Actor,
        incident_id: Uuid,
        new_status: IncidentStatus,
    ) -> TriageResult<Incident> {
        self.require_admin(actor, "change incident status")?;

        let incident = self.load(incident_id).await?;
        let old_status = incident.status;

        if old_status.is_terminal() {
            return Err(TriageError::InvalidTransition {
                incident_id,
                from: old_status,
                reason: "resolved incidents cannot change status".to_string(),
            });
        }
        if old_status == new_status {
            return Ok(incident);
        }
        if !old_status.can_transition_to(new_status) {
            return Err(TriageError::InvalidTransition {
                incident_id,
                from: old_status,
                reason: format!("cannot move to {}", new_status),
            });
        }

        let update = IncidentUpdate {
            status: Some(new_status),
            ..Default::default()
        };
        let updated = self.incidents.update(incident_id, &update).await?;

        metrics::counter!("td_status_changes_total", "to" => new_status.as_db_str()).increment(1);
        info!(from = %old_status, to = %new_status, "Incident status changed");

        self.audit
            .record(
                incident_id,
                actor.id,
                Some(old_status),
                Some(new_status),
                AuditAction::StatusChange,
                None,
            )
            .await;

        Ok(updated)
    }

    /// Writes the supplied administrator fields in one update.
    ///
    /// Supplied text is trimmed; an empty string clears the field. When every
    /// supplied value equals the stored one, nothing is written and
    /// `NoChange` is returned.
    #[instrument(skip(self, actor, fields), fields(actor = %actor.identity()))]
    pub async fn set_admin_fields(
        &self,
        actor: &Actor,
        incident_id: Uuid,
        fields: AdminFields,
    ) -> TriageResult<AdminFieldsOutcome> {
        self.require_admin(actor, "edit incident fields")?;

        let incident = self.load(incident_id).await?;
        if incident.is_resolved() {
            return Err(TriageError::InvalidTransition {
                incident_id,
                from: incident.status,
                reason: "resolved incidents cannot be edited".to_string(),
            });
        }

        let update = diff_admin_fields(&incident, fields);
        if update.is_empty() {
            info!("Admin fields unchanged");
            return Ok(AdminFieldsOutcome::NoChange(incident));
        }

        let updated = self.incidents.update(incident_id, &update).await?;

        let (action, details) = match &update.admin_solution {
            Some(solution) => (AuditAction::SolutionSubmitted, solution.clone()),
            None => (AuditAction::AdminFieldsUpdated, Some(changed_fields(&update))),
        };
        info!(action = %action, "Admin fields updated");

        self.audit
            .record(incident_id, actor.id, None, None, action, details)
            .await;

        Ok(AdminFieldsOutcome::Updated(updated))
    }

    /// Flags a resolved incident for a BIA report. Flagging twice is a no-op.
    #[instrument(skip(self, actor), fields(actor = %actor.identity()))]
    pub async fn flag_for_bia(&self, actor: &Actor, incident_id: Uuid) -> TriageResult<Incident> {
        self.require_admin(actor, "flag incident for BIA")?;

        let incident = self.load(incident_id).await?;
        if !incident.is_resolved() {
            return Err(TriageError::InvalidTransition {
                incident_id,
                from: incident.status,
                reason: "only resolved incidents can be flagged for BIA".to_string(),
            });
        }
        if incident.bia_report {
            return Ok(incident);
        }

        let update = IncidentUpdate {
            bia_report: Some(true),
            ..Default::default()
        };
        let updated = self.incidents.update(incident_id, &update).await?;
        info!("Incident flagged for BIA");

        self.audit
            .record(incident_id, actor.id, None, None, AuditAction::BiaFlagged, None)
            .await;

        Ok(updated)
    }

    /// Deletes an incident and its feedback. Only the reporter may do this.
    #[instrument(skip(self))]
    pub async fn delete_incident(&self, actor_id: Uuid, incident_id: Uuid) -> TriageResult<()> {
        let incident = self.load(incident_id).await?;
        if !incident.is_reported_by(actor_id) {
            warn!("Delete rejected: actor did not report the incident");
            return Err(TriageError::PermissionDenied {
                action: "delete incident".to_string(),
                actor: actor_id.to_string(),
            });
        }

        // Incident first: a failed delete must leave the feedback thread intact.
        if !self.incidents.delete(incident_id).await? {
            return Err(TriageError::not_found("Incident", incident_id));
        }

        // SQL stores cascade; this clears stores without foreign keys.
        match self.feedback.delete_for_incident(incident_id).await {
            Ok(removed) => info!(feedback_removed = removed, "Incident deleted"),
            Err(e) => warn!(error = %e, "Incident deleted; feedback cleanup failed"),
        }

        Ok(())
    }

    async fn load(&self, incident_id: Uuid) -> TriageResult<Incident> {
        self.incidents
            .get(incident_id)
            .await?
            .ok_or_else(|| TriageError::not_found("Incident", incident_id))
    }

    fn require_admin(&self, actor: &Actor, action: &str) -> TriageResult<()> {
        if actor.can_administer() {
            Ok(())
        } else {
            warn!(action, "Permission denied");
            Err(TriageError::PermissionDenied {
                action: action.to_string(),
                actor: actor.identity(),
            })
        }
    }
}

/// Builds an update holding only the supplied fields that differ from `incident`.
fn diff_admin_fields(incident: &Incident, fields: AdminFields) -> IncidentUpdate {
    let normalize = |s: String| {
        let s = s.trim().to_string();
        (!s.is_empty()).then_some(s)
    };

    let mut update = IncidentUpdate::default();

    if let Some(solution) = fields.solution.map(normalize) {
        if solution != incident.admin_solution {
            update.admin_solution = Some(solution);
        }
    }
    if let Some(risk) = fields.risk_level {
        if Some(risk) != incident.risk_level {
            update.risk_level = Some(Some(risk));
        }
    }
    if let Some(notes) = fields.notes.map(normalize) {
        if notes != incident.admin_notes {
            update.admin_notes = Some(notes);
        }
    }

    update
}

fn changed_fields(update: &IncidentUpdate) -> String {
    let mut names = Vec::new();
    if update.risk_level.is_some() {
        names.push("risk_level");
    }
    if update.admin_notes.is_some() {
        names.push("admin_notes");
    }
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogEntry;
    use crate::bia::{BiaWorkflow, NewBiaReport};
    use crate::db::mocks::{
        MockAuditRepository, MockBiaReportRepository, MockFeedbackRepository,
        MockIncidentRepository, MockUserRepository,
    };
    use crate::db::{AuditRepository, BiaReportRepository};
    use crate::feedback::FeedbackThread;
    use crate::incident::{RiskLevel, Severity};

    struct Harness {
        lifecycle: IncidentLifecycle,
        repos: Repositories,
        incidents: Arc<MockIncidentRepository>,
        audit: Arc<MockAuditRepository>,
        admin: Actor,
    }

    impl Harness {
        fn new() -> Self {
            let incidents = Arc::new(MockIncidentRepository::new());
            let audit = Arc::new(MockAuditRepository::new());
            let repos = Repositories {
                audit: audit.clone(),
                bia_reports: Arc::new(MockBiaReportRepository::new()),
                feedback: Arc::new(MockFeedbackRepository::new()),
                users: Arc::new(MockUserRepository::new()),
                incidents: incidents.clone(),
            };
            Self {
                lifecycle: IncidentLifecycle::new(&repos),
                repos,
                incidents,
                audit,
                admin: Actor::admin(Uuid::new_v4()),
            }
        }

        async fn report(&self, title: &str, description: &str) -> Incident {
            self.lifecycle
                .create_incident(
                    Uuid::new_v4(),
                    NewIncident::new(title, description, Severity::Medium),
                )
                .await
                .unwrap()
        }

        async fn audit_entries(&self, incident_id: Uuid) -> Vec<AuditLogEntry> {
            self.audit.get_for_incident(incident_id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_incident_round_trip() {
        let h = Harness::new();
        let created = h.report("Phishing Attempt", "suspicious email").await;

        let read = h.lifecycle.get_incident(&h.admin, created.id).await.unwrap();
        assert_eq!(read.status, IncidentStatus::Open);
        assert_eq!(read.risk_level, None);
        assert_eq!(read.effective_risk(), RiskLevel::Medium);
        assert!(!read.bia_report);
    }

    #[tokio::test]
    async fn test_create_incident_validation() {
        let h = Harness::new();
        let reporter = Uuid::new_v4();

        let mut missing_severity = NewIncident::new("Lost Device", "laptop", Severity::Low);
        missing_severity.severity = None;
        assert!(matches!(
            h.lifecycle.create_incident(reporter, missing_severity).await,
            Err(TriageError::Validation(_))
        ));
        assert!(matches!(
            h.lifecycle
                .create_incident(reporter, NewIncident::new("Lost Device", "  ", Severity::Low))
                .await,
            Err(TriageError::Validation(_))
        ));
        assert!(matches!(
            h.lifecycle.create_incident(reporter, NewIncident::default()).await,
            Err(TriageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_set_status_records_audit() {
        let h = Harness::new();
        let incident = h.report("Malware Infection", "popups").await;

        let updated = h
            .lifecycle
            .set_status(&h.admin, incident.id, IncidentStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(updated.status, IncidentStatus::InProgress);
        assert!(updated.updated_at >= incident.updated_at);

        let entries = h.audit_entries(incident.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::StatusChange);
        assert_eq!(entries[0].old_status, Some(IncidentStatus::Open));
        assert_eq!(entries[0].new_status, Some(IncidentStatus::InProgress));
        assert_eq!(entries[0].changed_by, h.admin.id);
    }

    #[tokio::test]
    async fn test_set_status_requires_admin() {
        let h = Harness::new();
        let incident = h.report("Lost Device", "tablet").await;

        let result = h
            .lifecycle
            .set_status(
                &Actor::reporter(incident.reported_by),
                incident.id,
                IncidentStatus::Resolved,
            )
            .await;
        assert!(matches!(result, Err(TriageError::PermissionDenied { .. })));
        assert!(h.audit_entries(incident.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_resolved_is_absorbing() {
        let h = Harness::new();
        let incident = h.report("Data Breach", "leak").await;
        h.lifecycle
            .set_status(&h.admin, incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();

        for status in IncidentStatus::ALL {
            assert!(matches!(
                h.lifecycle.set_status(&h.admin, incident.id, status).await,
                Err(TriageError::InvalidTransition { .. })
            ));
        }
        let fields = AdminFields {
            solution: Some("Rotate keys".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            h.lifecycle
                .set_admin_fields(&h.admin, incident.id, fields)
                .await,
            Err(TriageError::InvalidTransition { .. })
        ));
        assert_eq!(h.audit_entries(incident.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_same_status_is_write_free() {
        let h = Harness::new();
        let incident = h.report("Lost Device", "phone").await;

        let same = h
            .lifecycle
            .set_status(&h.admin, incident.id, IncidentStatus::Open)
            .await
            .unwrap();
        assert_eq!(same, incident);
        assert!(h.audit_entries(incident.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_set_admin_fields_then_no_change() {
        let h = Harness::new();
        let incident = h.report("Phishing Attempt", "fake login page").await;
        let fields = AdminFields {
            solution: Some("  Reset your password. ".to_string()),
            risk_level: Some(RiskLevel::High),
            notes: Some("User clicked".to_string()),
        };

        let outcome = h
            .lifecycle
            .set_admin_fields(&h.admin, incident.id, fields.clone())
            .await
            .unwrap();
        let updated = outcome.incident().clone();
        assert!(!outcome.is_no_change());
        assert_eq!(updated.admin_solution.as_deref(), Some("Reset your password."));
        assert_eq!(updated.risk_level, Some(RiskLevel::High));

        let entries = h.audit_entries(incident.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::SolutionSubmitted);
        assert_eq!(entries[0].details.as_deref(), Some("Reset your password."));
        assert_eq!(entries[0].old_status, None);
        assert_eq!(entries[0].new_status, None);

        let again = h
            .lifecycle
            .set_admin_fields(&h.admin, incident.id, fields)
            .await
            .unwrap();
        assert_eq!(again, AdminFieldsOutcome::NoChange(updated));
        assert_eq!(h.audit_entries(incident.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_set_admin_fields_without_solution_change() {
        let h = Harness::new();
        let incident = h.report("Lost Device", "badge").await;

        let outcome = h
            .lifecycle
            .set_admin_fields(
                &h.admin,
                incident.id,
                AdminFields {
                    notes: Some("Badge deactivated".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome.incident().admin_notes.as_deref(),
            Some("Badge deactivated")
        );

        let entries = h.audit_entries(incident.id).await;
        assert_eq!(entries[0].action, AuditAction::AdminFieldsUpdated);
        assert_eq!(entries[0].details.as_deref(), Some("admin_notes"));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_undo_mutation() {
        let h = Harness::new();
        let incident = h.report("Malware Infection", "trojan").await;
        h.audit.set_failing(true);

        let updated = h
            .lifecycle
            .set_status(&h.admin, incident.id, IncidentStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(updated.status, IncidentStatus::InProgress);

        let stored = h.repos.incidents.get(incident.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IncidentStatus::InProgress);
        assert!(h.audit.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_flag_for_bia() {
        let h = Harness::new();
        let incident = h.report("Data Breach", "exposed bucket").await;

        assert!(matches!(
            h.lifecycle.flag_for_bia(&h.admin, incident.id).await,
            Err(TriageError::InvalidTransition { .. })
        ));

        h.lifecycle
            .set_status(&h.admin, incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();
        let first = h.lifecycle.flag_for_bia(&h.admin, incident.id).await.unwrap();
        let second = h.lifecycle.flag_for_bia(&h.admin, incident.id).await.unwrap();
        assert!(first.bia_report);
        assert_eq!(first, second);

        let flags: Vec<AuditLogEntry> = h
            .audit_entries(incident.id)
            .await
            .into_iter()
            .filter(|e| e.action == AuditAction::BiaFlagged)
            .collect();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].old_status, None);
        assert_eq!(flags[0].new_status, None);
    }

    #[tokio::test]
    async fn test_resolve_flag_and_report_scenario() {
        let h = Harness::new();
        let incident = h.report("Data Breach", "records exposed").await;
        let workflow = BiaWorkflow::new(&h.repos);

        h.lifecycle
            .set_status(&h.admin, incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();
        h.lifecycle.flag_for_bia(&h.admin, incident.id).await.unwrap();
        let report = workflow
            .create_report(
                &h.admin,
                NewBiaReport::new(
                    incident.id,
                    RiskLevel::High,
                    "Isolate affected systems.",
                    "Strengthen data encryption practices.",
                ),
            )
            .await
            .unwrap();

        let eligible = workflow.list_eligible().await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, incident.id);
        assert!(eligible[0].bia_report);
        assert_eq!(workflow.report_for(incident.id).await.unwrap(), Some(report));
        assert_eq!(h.repos.bia_reports.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_incident_only_by_reporter() {
        let h = Harness::new();
        let incident = h.report("Phishing Attempt", "sms").await;
        let owner = Actor::reporter(incident.reported_by);
        let thread = FeedbackThread::new(&h.repos);
        thread
            .submit_feedback(&owner, incident.id, "Question", "Is it safe?")
            .await
            .unwrap();

        let other = Uuid::new_v4();
        assert!(matches!(
            h.lifecycle.delete_incident(other, incident.id).await,
            Err(TriageError::PermissionDenied { .. })
        ));
        assert!(h.repos.incidents.get(incident.id).await.unwrap().is_some());
        assert_eq!(
            thread.feedback_for_incidents(&[incident.id]).await.unwrap()[&incident.id].len(),
            1
        );

        h.lifecycle
            .delete_incident(owner.id, incident.id)
            .await
            .unwrap();
        assert!(h.repos.incidents.get(incident.id).await.unwrap().is_none());
        assert!(thread
            .feedback_for_incidents(&[incident.id])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_feedback() {
        let h = Harness::new();
        let incident = h.report("Malware Infection", "popups").await;
        let owner = Actor::reporter(incident.reported_by);
        let thread = FeedbackThread::new(&h.repos);
        thread
            .submit_feedback(&owner, incident.id, "Question", "Still seeing popups")
            .await
            .unwrap();

        h.incidents.set_failing_deletes(true);
        assert!(matches!(
            h.lifecycle.delete_incident(owner.id, incident.id).await,
            Err(TriageError::Store(_))
        ));
        assert!(h.repos.incidents.get(incident.id).await.unwrap().is_some());
        assert_eq!(
            thread.feedback_for_incidents(&[incident.id]).await.unwrap()[&incident.id].len(),
            1
        );

        h.incidents.set_failing_deletes(false);
        h.lifecycle
            .delete_incident(owner.id, incident.id)
            .await
            .unwrap();
        assert!(thread
            .feedback_for_incidents(&[incident.id])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_reporters_see_only_their_incidents() {
        let h = Harness::new();
        let mine = h.report("Lost Device", "laptop").await;
        let _theirs = h.report("Lost Device", "phone").await;
        let me = Actor::reporter(mine.reported_by);

        let visible = h
            .lifecycle
            .list_incidents(&me, IncidentFilter::default())
            .await
            .unwrap();
        assert_eq!(visible, vec![mine.clone()]);

        let all = h.lifecycle.search_by_title(&h.admin, "lost").await.unwrap();
        assert_eq!(all.len(), 2);

        assert!(matches!(
            h.lifecycle
                .get_incident(&Actor::reporter(Uuid::new_v4()), mine.id)
                .await,
            Err(TriageError::PermissionDenied { .. })
        ));
    }
}
