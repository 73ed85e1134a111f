//! Incident data models for Triage Desk.
//!
//! This module defines the incident record filed by a reporter and triaged by
//! administrators, together with its status, severity and risk tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::catalog::catalog_key;
use crate::risk::classify;

/// Represents a reported security incident under triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier for this incident.
    pub id: Uuid,
    /// Incident-type label chosen by the reporter (e.g. "Data Breach").
    pub title: String,
    /// Free-text description supplied by the reporter.
    pub description: String,
    /// Severity as judged by the reporter.
    pub severity: Severity,
    /// Current triage status.
    pub status: IncidentStatus,
    /// Risk tier explicitly set by an administrator, if any.
    pub risk_level: Option<RiskLevel>,
    /// Solution text an administrator attached to the incident.
    pub admin_solution: Option<String>,
    /// Internal administrator notes.
    pub admin_notes: Option<String>,
    /// User who reported the incident.
    pub reported_by: Uuid,
    /// Whether the incident has been flagged for a BIA report.
    pub bia_report: bool,
    /// Timestamp when the incident was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last administrator change.
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Creates a new open incident.
    pub fn new(
        reported_by: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            severity,
            status: IncidentStatus::Open,
            risk_level: None,
            admin_solution: None,
            admin_notes: None,
            reported_by,
            bia_report: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the explicit risk tier, or the tier derived from the incident text.
    ///
    /// The classifier sees the type label followed by the description, so a
    /// "Phishing Attempt" with a terse description still rates `Medium`. The
    /// derived value is display-only and is never written back.
    pub fn effective_risk(&self) -> RiskLevel {
        self.risk_level
            .unwrap_or_else(|| classify(&format!("{} {}", self.title, self.description)))
    }

    /// Returns true if the risk tier was derived rather than set by an admin.
    pub fn risk_is_derived(&self) -> bool {
        self.risk_level.is_none()
    }

    /// Returns the normalized key used for recommendation lookups.
    pub fn catalog_key(&self) -> String {
        catalog_key(&self.title)
    }

    /// Returns true once the incident has reached the terminal state.
    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if the incident may be used as the source of a BIA report.
    pub fn is_bia_eligible(&self) -> bool {
        self.bia_report && self.is_resolved()
    }

    /// Returns true if `user_id` filed this incident.
    pub fn is_reported_by(&self, user_id: Uuid) -> bool {
        self.reported_by == user_id
    }
}

/// Status of an incident in the triage workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Newly reported, not yet picked up.
    Open,
    /// Being investigated by an administrator.
    InProgress,
    /// Closed out. No further status changes are accepted.
    Resolved,
}

impl IncidentStatus {
    /// All statuses in workflow order.
    pub const ALL: [IncidentStatus; 3] = [
        IncidentStatus::Open,
        IncidentStatus::InProgress,
        IncidentStatus::Resolved,
    ];

    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::InProgress => "in_progress",
            IncidentStatus::Resolved => "resolved",
        }
    }

    /// Parses a status from its stored or displayed form.
    ///
    /// Accepts "Investigating" and "In Progress" as aliases for `InProgress`.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "open" => Some(IncidentStatus::Open),
            "in_progress" | "investigating" => Some(IncidentStatus::InProgress),
            "resolved" => Some(IncidentStatus::Resolved),
            _ => None,
        }
    }

    /// Label shown to reporters and on the dashboard.
    pub fn user_label(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
            IncidentStatus::InProgress => "Investigating",
            IncidentStatus::Resolved => "Resolved",
        }
    }

    /// Returns true for the absorbing state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved)
    }

    /// Checks whether the state machine permits moving to `to`.
    pub fn can_transition_to(&self, to: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (*self, to),
            (Open, InProgress) | (Open, Resolved) | (InProgress, Open) | (InProgress, Resolved)
        )
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentStatus::Open => write!(f, "Open"),
            IncidentStatus::InProgress => write!(f, "In Progress"),
            IncidentStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s).ok_or_else(|| format!("Invalid incident status: {}", s))
    }
}

/// Severity chosen by the reporter when filing the incident.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parses a severity case-insensitively.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s).ok_or_else(|| format!("Invalid severity: {}", s))
    }
}

/// Risk tier managed by administrators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// Parses a risk tier case-insensitively.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s).ok_or_else(|| format!("Invalid risk level: {}", s))
    }
}

/// Input for filing a new incident.
///
/// Fields are optional so that a missing value can be reported as a
/// validation error rather than being unrepresentable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIncident {
    /// Incident-type label.
    pub title: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Reporter-chosen severity.
    pub severity: Option<Severity>,
}

impl NewIncident {
    /// Creates a fully populated request.
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            severity: Some(severity),
        }
    }
}

/// Administrator-managed fields of an incident.
///
/// `None` means "not supplied"; a supplied empty string clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminFields {
    /// Solution text, either free text or a canned catalog solution.
    pub solution: Option<String>,
    /// Explicit risk tier.
    pub risk_level: Option<RiskLevel>,
    /// Internal notes.
    pub notes: Option<String>,
}

impl AdminFields {
    /// Returns true if no field was supplied.
    pub fn is_empty(&self) -> bool {
        self.solution.is_none() && self.risk_level.is_none() && self.notes.is_none()
    }
}
