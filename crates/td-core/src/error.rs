//! Error types for the triage engine.

use thiserror::Error;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::db::DbError;
use crate::incident::IncidentStatus;

/// Errors returned by lifecycle, BIA, feedback and session operations.
///
/// Every variant except the dependency failures (`Store`, `Auth`) guarantees
/// that nothing was written.
#[derive(Error, Debug)]
pub enum TriageError {
    /// A required field was missing or empty.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The actor's role or ownership does not allow the operation.
    #[error("Permission denied: {action} is not allowed for {actor}")]
    PermissionDenied {
        /// The operation that was attempted.
        action: String,
        /// Identity of the actor that attempted it.
        actor: String,
    },

    /// The incident status does not allow the requested change.
    #[error("Invalid transition for incident {incident_id} in state {from}: {reason}")]
    InvalidTransition {
        incident_id: Uuid,
        from: IncidentStatus,
        reason: String,
    },

    /// A BIA report already exists for the incident.
    #[error("A BIA report already exists for incident {incident_id}")]
    Duplicate { incident_id: Uuid },

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    /// The authentication provider failed.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

impl TriageError {
    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        TriageError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        TriageError::Validation(message.into())
    }

    /// Returns true if the failure came from a collaborator rather than a rule.
    pub fn is_dependency(&self) -> bool {
        matches!(self, TriageError::Store(_) | TriageError::Auth(_))
    }
}

/// Result alias used throughout the engine.
pub type TriageResult<T> = Result<T, TriageError>;

/// Returns the trimmed value, or a validation error naming `field` if blank.
pub(crate) fn require(field: &str, value: Option<&str>) -> TriageResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(TriageError::validation(format!("{} is required", field))),
    }
}
