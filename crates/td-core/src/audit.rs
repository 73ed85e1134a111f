//! Append-only audit trail for administrator changes.
//!
//! Every status change and solution submission is recorded after the incident
//! itself has been written. Audit writes are best-effort: a failed insert is
//! logged and counted but never undoes the mutation that triggered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::db::{AuditRepository, DbError};
use crate::incident::IncidentStatus;

/// Kind of change recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AuditAction {
    /// The incident status changed.
    StatusChange,
    /// An administrator submitted or changed the solution text.
    SolutionSubmitted,
    /// Risk level or notes changed without a solution change.
    AdminFieldsUpdated,
    /// The incident was flagged for a BIA report.
    BiaFlagged,
    /// Any label written by another tool against the same table.
    Other(String),
}

impl AuditAction {
    /// Returns the label stored in the `action` column.
    pub fn as_db_str(&self) -> &str {
        match self {
            AuditAction::StatusChange => "status_change",
            AuditAction::SolutionSubmitted => "solution_submitted",
            AuditAction::AdminFieldsUpdated => "admin_fields_updated",
            AuditAction::BiaFlagged => "bia_flagged",
            AuditAction::Other(label) => label,
        }
    }

    /// Parses a stored label. Unknown labels are kept verbatim.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "status_change" => AuditAction::StatusChange,
            "solution_submitted" => AuditAction::SolutionSubmitted,
            "admin_fields_updated" => AuditAction::AdminFieldsUpdated,
            "bia_flagged" => AuditAction::BiaFlagged,
            other => AuditAction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.as_db_str().to_string()
    }
}

impl From<String> for AuditAction {
    fn from(s: String) -> Self {
        AuditAction::from_db_str(&s)
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub incident_id: Uuid,
    /// Administrator who made the change.
    pub changed_by: Uuid,
    pub old_status: Option<IncidentStatus>,
    pub new_status: Option<IncidentStatus>,
    pub action: AuditAction,
    /// Free text, e.g. the submitted solution.
    pub details: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Creates an entry stamped now.
    pub fn new(
        incident_id: Uuid,
        changed_by: Uuid,
        old_status: Option<IncidentStatus>,
        new_status: Option<IncidentStatus>,
        action: AuditAction,
        details: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            changed_by,
            old_status,
            new_status,
            action,
            details,
            changed_at: Utc::now(),
        }
    }

    /// Returns true if this entry records a status transition.
    pub fn is_status_change(&self) -> bool {
        self.action == AuditAction::StatusChange
    }
}

/// Writes and reads the audit trail.
#[derive(Clone)]
pub struct AuditTrail {
    repo: Arc<dyn AuditRepository>,
}

impl AuditTrail {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    /// Appends an entry.
    ///
    /// Returns `None` if the store rejected the write. The failure is logged
    /// at `warn` and counted in `td_audit_write_failures_total`.
    #[instrument(skip(self, details))]
    pub async fn record(
        &self,
        incident_id: Uuid,
        changed_by: Uuid,
        old_status: Option<IncidentStatus>,
        new_status: Option<IncidentStatus>,
        action: AuditAction,
        details: Option<String>,
    ) -> Option<AuditLogEntry> {
        let entry = AuditLogEntry::new(
            incident_id,
            changed_by,
            old_status,
            new_status,
            action,
            details,
        );

        match self.repo.log(&entry).await {
            Ok(()) => Some(entry),
            Err(e) => {
                warn!(
                    incident_id = %incident_id,
                    action = %entry.action,
                    error = %e,
                    "Failed to write audit entry"
                );
                metrics::counter!("td_audit_write_failures_total").increment(1);
                None
            }
        }
    }

    /// Returns every entry for an incident, newest first.
    pub async fn list_for(&self, incident_id: Uuid) -> Result<Vec<AuditLogEntry>, DbError> {
        self.repo.get_for_incident(incident_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mocks::MockAuditRepository;
    use chrono::Duration;

    #[test]
    fn test_action_labels() {
        assert_eq!(AuditAction::StatusChange.as_db_str(), "status_change");
        assert_eq!(
            AuditAction::from_db_str("solution_submitted"),
            AuditAction::SolutionSubmitted
        );
        assert_eq!(
            AuditAction::from_db_str("imported"),
            AuditAction::Other("imported".to_string())
        );
        assert_eq!(
            serde_json::to_string(&AuditAction::BiaFlagged).unwrap(),
            "\"bia_flagged\""
        );
    }

    #[tokio::test]
    async fn test_record_appends_entry() {
        let repo = Arc::new(MockAuditRepository::new());
        let trail = AuditTrail::new(repo.clone());
        let incident_id = Uuid::new_v4();
        let admin = Uuid::new_v4();

        let entry = trail
            .record(
                incident_id,
                admin,
                Some(IncidentStatus::Open),
                Some(IncidentStatus::InProgress),
                AuditAction::StatusChange,
                None,
            )
            .await
            .unwrap();

        assert!(entry.is_status_change());
        assert_eq!(repo.snapshot().await, vec![entry]);
    }

    #[tokio::test]
    async fn test_record_swallows_store_failure() {
        let repo = Arc::new(MockAuditRepository::new());
        repo.set_failing(true);
        let trail = AuditTrail::new(repo.clone());

        let entry = trail
            .record(
                Uuid::new_v4(),
                Uuid::new_v4(),
                None,
                None,
                AuditAction::SolutionSubmitted,
                Some("Reset the password".to_string()),
            )
            .await;

        assert!(entry.is_none());
        assert!(repo.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_for_is_newest_first() {
        let incident_id = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let mut older = AuditLogEntry::new(
            incident_id,
            admin,
            Some(IncidentStatus::Open),
            Some(IncidentStatus::InProgress),
            AuditAction::StatusChange,
            None,
        );
        older.changed_at = Utc::now() - Duration::minutes(5);
        let newer = AuditLogEntry::new(
            incident_id,
            admin,
            Some(IncidentStatus::InProgress),
            Some(IncidentStatus::Resolved),
            AuditAction::StatusChange,
            None,
        );
        let other = AuditLogEntry::new(
            Uuid::new_v4(),
            admin,
            None,
            None,
            AuditAction::BiaFlagged,
            None,
        );

        let repo = Arc::new(MockAuditRepository::with_entries(vec![
            older.clone(),
            newer.clone(),
            other,
        ]));
        let trail = AuditTrail::new(repo);

        let entries = trail.list_for(incident_id).await.unwrap();
        assert_eq!(entries, vec![newer, older]);
    }
}
