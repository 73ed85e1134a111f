//! Database layer for Triage Desk.
//!
//! This module provides persistence for incidents, the audit trail, BIA
//! reports, feedback and user profiles using SQLx with support for both
//! SQLite (local use and tests) and PostgreSQL (hosted deployments).

mod error;
pub mod mocks;
mod pool;
mod schema;

pub mod audit_repo;
pub mod bia_repo;
pub mod feedback_repo;
pub mod incident_repo;
pub mod user_repo;

use std::sync::Arc;

pub use error::DbError;
pub use pool::{
    create_pool, create_pool_with_options, escape_like_pattern, make_like_pattern, DbPool,
    PoolOptions,
};
pub use schema::run_migrations;

// Re-export repository traits and types
pub use audit_repo::AuditRepository;
pub use bia_repo::BiaReportRepository;
pub use feedback_repo::{FeedbackRepository, FeedbackUpdate};
pub use incident_repo::{IncidentFilter, IncidentRepository, IncidentUpdate};
pub use user_repo::UserRepository;

// Re-export factory functions
#[cfg(feature = "database")]
pub use audit_repo::create_audit_repository;
#[cfg(feature = "database")]
pub use bia_repo::create_bia_report_repository;
#[cfg(feature = "database")]
pub use feedback_repo::create_feedback_repository;
#[cfg(feature = "database")]
pub use incident_repo::create_incident_repository;
#[cfg(feature = "database")]
pub use user_repo::create_user_repository;

/// The set of stores the engine services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub incidents: Arc<dyn IncidentRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub bia_reports: Arc<dyn BiaReportRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    /// Builds SQL-backed repositories sharing one pool.
    #[cfg(feature = "database")]
    pub fn from_pool(pool: &DbPool) -> Self {
        Self {
            incidents: Arc::from(create_incident_repository(pool)),
            audit: Arc::from(create_audit_repository(pool)),
            bia_reports: Arc::from(create_bia_report_repository(pool)),
            feedback: Arc::from(create_feedback_repository(pool)),
            users: Arc::from(create_user_repository(pool)),
        }
    }

    /// Builds in-memory repositories. BIA and feedback listings resolve
    /// incident titles through the in-memory incident store.
    pub fn in_memory() -> Self {
        let incidents: Arc<dyn IncidentRepository> = Arc::new(mocks::MockIncidentRepository::new());
        Self {
            audit: Arc::new(mocks::MockAuditRepository::new()),
            bia_reports: Arc::new(
                mocks::MockBiaReportRepository::new().with_incident_source(incidents.clone()),
            ),
            feedback: Arc::new(
                mocks::MockFeedbackRepository::new().with_incident_source(incidents.clone()),
            ),
            users: Arc::new(mocks::MockUserRepository::new()),
            incidents,
        }
    }
}
