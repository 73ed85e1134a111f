//! # td-core
//!
//! Incident triage engine for Triage Desk.
//!
//! This crate provides the incident lifecycle state machine, the audit trail,
//! the business impact analysis (BIA) workflow, feedback threads, the keyword
//! risk classifier and the recommendation catalog, together with the
//! repositories they persist through.

pub mod audit;
pub mod auth;
pub mod bia;
pub mod catalog;
pub mod dashboard;
pub mod datetime;
pub mod db;
pub mod error;
pub mod feedback;
pub mod incident;
pub mod lifecycle;
pub mod preferences;
pub mod risk;

pub use audit::{AuditAction, AuditLogEntry, AuditTrail};
pub use auth::{
    Actor, AuthError, AuthProvider, AuthenticatedUser, LoginRecord, NewRegistration,
    RegistrationError, RegistrationPolicy, Role, SessionService, StaticAuthProvider, User,
};
pub use bia::{BiaReport, BiaReportListing, BiaWorkflow, NewBiaReport, UNKNOWN_INCIDENT_TITLE};
pub use catalog::{Recommendations, INCIDENT_TYPES};
pub use dashboard::{Dashboard, DashboardPoller, DashboardSummary, DEFAULT_REFRESH_INTERVAL};
pub use db::Repositories;
pub use error::{TriageError, TriageResult};
pub use feedback::{FeedbackEntry, FeedbackListing, FeedbackStatus, FeedbackThread, FeedbackType};
pub use incident::{AdminFields, Incident, IncidentStatus, NewIncident, RiskLevel, Severity};
pub use lifecycle::{AdminFieldsOutcome, IncidentLifecycle};
pub use preferences::{PreferencesError, PreferencesStore, UiPreferences};
pub use risk::classify;
