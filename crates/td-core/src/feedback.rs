//! Feedback thread attached to incidents.
//!
//! Reporters comment on their own incidents; administrators reply with a
//! solution and mark entries resolved. Feedback status is independent of the
//! incident status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::Actor;
use crate::bia::UNKNOWN_INCIDENT_TITLE;
use crate::db::{FeedbackRepository, FeedbackUpdate, IncidentRepository, Repositories};
use crate::error::{require, TriageError, TriageResult};

/// Category of a feedback entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum FeedbackType {
    Suggestion,
    Issue,
    Question,
    /// Free-form category entered by an administrator.
    Other(String),
}

impl FeedbackType {
    /// Returns the stored label.
    pub fn as_db_str(&self) -> &str {
        match self {
            FeedbackType::Suggestion => "Suggestion",
            FeedbackType::Issue => "Issue",
            FeedbackType::Question => "Question",
            FeedbackType::Other(label) => label,
        }
    }

    /// Parses a stored label. Known categories match case-insensitively.
    pub fn from_db_str(s: &str) -> Self {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "suggestion" => FeedbackType::Suggestion,
            "issue" => FeedbackType::Issue,
            "question" => FeedbackType::Question,
            _ => FeedbackType::Other(s.to_string()),
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl From<FeedbackType> for String {
    fn from(t: FeedbackType) -> Self {
        t.as_db_str().to_string()
    }
}

impl From<String> for FeedbackType {
    fn from(s: String) -> Self {
        FeedbackType::from_db_str(&s)
    }
}

/// Resolution state of a feedback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FeedbackStatus {
    #[default]
    Pending,
    Resolved,
}

impl FeedbackStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "Pending",
            FeedbackStatus::Resolved => "Resolved",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(FeedbackStatus::Pending),
            "resolved" => Some(FeedbackStatus::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// A feedback entry on an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub incident_id: Uuid,
    /// Author of the entry.
    pub user_id: Uuid,
    pub feedback_type: FeedbackType,
    pub feedback_text: String,
    /// Solution sent back by an administrator.
    pub admin_solution: Option<String>,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
}

/// A feedback entry together with its incident title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackListing {
    pub entry: FeedbackEntry,
    pub incident_title: Option<String>,
}

impl FeedbackListing {
    /// Returns the incident title, or "Unknown Incident" if the incident is gone.
    pub fn title(&self) -> &str {
        self.incident_title
            .as_deref()
            .unwrap_or(UNKNOWN_INCIDENT_TITLE)
    }
}

/// Feedback operations.
#[derive(Clone)]
pub struct FeedbackThread {
    incidents: Arc<dyn IncidentRepository>,
    feedback: Arc<dyn FeedbackRepository>,
}

impl FeedbackThread {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            incidents: repos.incidents.clone(),
            feedback: repos.feedback.clone(),
        }
    }

    /// Attaches feedback to an incident.
    ///
    /// The author must be the incident's reporter or an administrator.
    /// Allowed in every incident status.
    #[instrument(skip(self, actor, feedback_type, text), fields(actor = %actor.identity()))]
    pub async fn submit_feedback(
        &self,
        actor: &Actor,
        incident_id: Uuid,
        feedback_type: &str,
        text: &str,
    ) -> TriageResult<FeedbackEntry> {
        let feedback_type = require("feedback type", Some(feedback_type))?;
        let text = require("feedback text", Some(text))?;

        let incident = self
            .incidents
            .get(incident_id)
            .await?
            .ok_or_else(|| TriageError::not_found("Incident", incident_id))?;

        if !incident.is_reported_by(actor.id) && !actor.can_administer() {
            warn!("Feedback rejected: actor did not report the incident");
            return Err(TriageError::PermissionDenied {
                action: "submit feedback".to_string(),
                actor: actor.identity(),
            });
        }

        let entry = FeedbackEntry {
            id: Uuid::new_v4(),
            incident_id,
            user_id: actor.id,
            feedback_type: FeedbackType::from_db_str(&feedback_type),
            feedback_text: text,
            admin_solution: None,
            status: FeedbackStatus::Pending,
            created_at: Utc::now(),
        };

        let entry = self.feedback.create(&entry).await?;
        metrics::counter!("td_feedback_submitted_total").increment(1);
        info!(feedback_id = %entry.id, "Feedback submitted");

        Ok(entry)
    }

    /// Sends a solution back to the reporter. Does not resolve the entry.
    #[instrument(skip(self, actor, solution), fields(actor = %actor.identity()))]
    pub async fn respond_with_solution(
        &self,
        actor: &Actor,
        feedback_id: Uuid,
        solution: &str,
    ) -> TriageResult<FeedbackEntry> {
        self.require_admin(actor, "respond to feedback")?;
        let solution = require("solution", Some(solution))?;
        self.get(feedback_id).await?;

        let update = FeedbackUpdate {
            admin_solution: Some(solution),
            status: None,
        };
        let entry = self.feedback.update(feedback_id, &update).await?;
        info!("Feedback solution submitted");

        Ok(entry)
    }

    /// Marks an entry resolved. Resolving twice is a no-op.
    #[instrument(skip(self, actor), fields(actor = %actor.identity()))]
    pub async fn mark_resolved(
        &self,
        actor: &Actor,
        feedback_id: Uuid,
    ) -> TriageResult<FeedbackEntry> {
        self.require_admin(actor, "resolve feedback")?;
        let entry = self.get(feedback_id).await?;

        if entry.status == FeedbackStatus::Resolved {
            return Ok(entry);
        }

        let update = FeedbackUpdate {
            admin_solution: None,
            status: Some(FeedbackStatus::Resolved),
        };
        let entry = self.feedback.update(feedback_id, &update).await?;
        info!("Feedback resolved");

        Ok(entry)
    }

    /// Returns feedback for the given incidents grouped by incident, each
    /// group oldest first.
    pub async fn feedback_for_incidents(
        &self,
        incident_ids: &[Uuid],
    ) -> TriageResult<HashMap<Uuid, Vec<FeedbackEntry>>> {
        let entries = self.feedback.list_for_incidents(incident_ids).await?;

        let mut grouped: HashMap<Uuid, Vec<FeedbackEntry>> = HashMap::new();
        for entry in entries {
            grouped.entry(entry.incident_id).or_default().push(entry);
        }
        Ok(grouped)
    }

    /// Lists all feedback with incident titles, newest first. Admin-only.
    pub async fn list_all(&self, actor: &Actor) -> TriageResult<Vec<FeedbackListing>> {
        self.require_admin(actor, "list all feedback")?;
        Ok(self.feedback.list_all().await?)
    }

    async fn get(&self, feedback_id: Uuid) -> TriageResult<FeedbackEntry> {
        self.feedback
            .get(feedback_id)
            .await?
            .ok_or_else(|| TriageError::not_found("Feedback", feedback_id))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mocks::{
        MockAuditRepository, MockBiaReportRepository, MockFeedbackRepository,
        MockIncidentRepository, MockUserRepository,
    };
    use crate::incident::{Incident, IncidentStatus, Severity};

    fn setup(incidents: Vec<Incident>) -> FeedbackThread {
        let incidents: Arc<dyn IncidentRepository> =
            Arc::new(MockIncidentRepository::with_incidents(incidents));
        let repos = Repositories {
            audit: Arc::new(MockAuditRepository::new()),
            bia_reports: Arc::new(MockBiaReportRepository::new()),
            feedback: Arc::new(
                MockFeedbackRepository::new().with_incident_source(incidents.clone()),
            ),
            users: Arc::new(MockUserRepository::new()),
            incidents,
        };
        FeedbackThread::new(&repos)
    }

    fn incident() -> Incident {
        Incident::new(Uuid::new_v4(), "Phishing Attempt", "fake invoice", Severity::Medium)
    }

    #[test]
    fn test_feedback_type_parsing() {
        assert_eq!(FeedbackType::from_db_str("question"), FeedbackType::Question);
        assert_eq!(
            FeedbackType::from_db_str(" Follow-up "),
            FeedbackType::Other("Follow-up".to_string())
        );
        assert_eq!(FeedbackStatus::default(), FeedbackStatus::Pending);
        assert_eq!(FeedbackStatus::from_db_str("RESOLVED"), Some(FeedbackStatus::Resolved));
    }

    #[tokio::test]
    async fn test_reporter_submits_feedback_in_any_state() {
        let mut resolved = incident();
        resolved.status = IncidentStatus::Resolved;
        let thread = setup(vec![resolved.clone()]);

        let entry = thread
            .submit_feedback(
                &Actor::reporter(resolved.reported_by),
                resolved.id,
                "Issue",
                "Still receiving the emails",
            )
            .await
            .unwrap();

        assert_eq!(entry.status, FeedbackStatus::Pending);
        assert_eq!(entry.feedback_type, FeedbackType::Issue);
        assert!(entry.admin_solution.is_none());
    }

    #[tokio::test]
    async fn test_submit_feedback_validation_and_ownership() {
        let incident = incident();
        let thread = setup(vec![incident.clone()]);
        let owner = Actor::reporter(incident.reported_by);

        assert!(matches!(
            thread.submit_feedback(&owner, incident.id, " ", "text").await,
            Err(TriageError::Validation(_))
        ));
        assert!(matches!(
            thread.submit_feedback(&owner, incident.id, "Question", "").await,
            Err(TriageError::Validation(_))
        ));
        assert!(matches!(
            thread
                .submit_feedback(&Actor::reporter(Uuid::new_v4()), incident.id, "Question", "?")
                .await,
            Err(TriageError::PermissionDenied { .. })
        ));
        assert!(thread
            .submit_feedback(&Actor::admin(Uuid::new_v4()), incident.id, "Escalation", "noted")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_respond_then_resolve_is_idempotent() {
        let incident = incident();
        let thread = setup(vec![incident.clone()]);
        let admin = Actor::admin(Uuid::new_v4());
        let entry = thread
            .submit_feedback(
                &Actor::reporter(incident.reported_by),
                incident.id,
                "Question",
                "What should I do?",
            )
            .await
            .unwrap();

        let responded = thread
            .respond_with_solution(&admin, entry.id, "Delete the message.")
            .await
            .unwrap();
        assert_eq!(responded.admin_solution.as_deref(), Some("Delete the message."));
        assert_eq!(responded.status, FeedbackStatus::Pending);

        let first = thread.mark_resolved(&admin, entry.id).await.unwrap();
        let second = thread.mark_resolved(&admin, entry.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.status, FeedbackStatus::Resolved);
    }

    #[tokio::test]
    async fn test_admin_only_operations() {
        let incident = incident();
        let thread = setup(vec![incident.clone()]);
        let reporter = Actor::reporter(incident.reported_by);
        let entry = thread
            .submit_feedback(&reporter, incident.id, "Suggestion", "Add MFA")
            .await
            .unwrap();

        assert!(matches!(
            thread.respond_with_solution(&reporter, entry.id, "x").await,
            Err(TriageError::PermissionDenied { .. })
        ));
        assert!(matches!(
            thread.mark_resolved(&reporter, entry.id).await,
            Err(TriageError::PermissionDenied { .. })
        ));
        assert!(matches!(
            thread.list_all(&reporter).await,
            Err(TriageError::PermissionDenied { .. })
        ));
        assert!(matches!(
            thread
                .mark_resolved(&Actor::admin(Uuid::new_v4()), Uuid::new_v4())
                .await,
            Err(TriageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_feedback_grouped_by_incident() {
        let a = incident();
        let b = incident();
        let thread = setup(vec![a.clone(), b.clone()]);

        for text in ["first", "second"] {
            thread
                .submit_feedback(&Actor::reporter(a.reported_by), a.id, "Issue", text)
                .await
                .unwrap();
        }
        thread
            .submit_feedback(&Actor::reporter(b.reported_by), b.id, "Issue", "other")
            .await
            .unwrap();

        let grouped = thread.feedback_for_incidents(&[a.id]).await.unwrap();
        assert_eq!(grouped.len(), 1);
        let texts: Vec<_> = grouped[&a.id].iter().map(|e| e.feedback_text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        let all = thread.list_all(&Actor::admin(Uuid::new_v4())).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|l| l.title() == "Phishing Attempt"));
    }
}
