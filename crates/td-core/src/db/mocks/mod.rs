//! Mock implementations of repository traits for testing.
//!
//! These mocks use in-memory storage and do not require a database connection.
//! They back `Repositories::in_memory` and the engine's unit tests.

mod audit_repo;
mod bia_repo;
mod feedback_repo;
mod incident_repo;
mod user_repo;

pub use audit_repo::MockAuditRepository;
pub use bia_repo::MockBiaReportRepository;
pub use feedback_repo::MockFeedbackRepository;
pub use incident_repo::MockIncidentRepository;
pub use user_repo::MockUserRepository;
