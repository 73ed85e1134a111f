//! # td-observability
//!
//! Logging and metrics setup for Triage Desk.
//!
//! The engine in `td-core` emits `tracing` events and increments `metrics`
//! counters; this crate installs the subscriber and describes the counters.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{record_dashboard, register_metrics};
