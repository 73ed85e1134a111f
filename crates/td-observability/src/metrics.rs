//! Metric descriptions for Triage Desk.
//!
//! Counters are incremented by `td-core` through the `metrics` facade. They
//! are no-ops until a recorder is installed.

use metrics::{describe_counter, describe_gauge};

pub const INCIDENTS_CREATED: &str = "td_incidents_created_total";
pub const STATUS_CHANGES: &str = "td_status_changes_total";
pub const AUDIT_WRITE_FAILURES: &str = "td_audit_write_failures_total";
pub const BIA_REPORTS_CREATED: &str = "td_bia_reports_created_total";
pub const FEEDBACK_SUBMITTED: &str = "td_feedback_submitted_total";

/// Gauges set from the dashboard summary.
pub const INCIDENTS_BY_STATUS: &str = "td_incidents_by_status";
pub const BIA_REPORTS: &str = "td_bia_reports";

/// Registers metric descriptions with the installed recorder.
pub fn register_metrics() {
    describe_counter!(INCIDENTS_CREATED, "Total number of incidents reported");
    describe_counter!(
        STATUS_CHANGES,
        "Total number of incident status changes, labelled by target status"
    );
    describe_counter!(
        AUDIT_WRITE_FAILURES,
        "Audit entries that could not be written after a successful mutation"
    );
    describe_counter!(BIA_REPORTS_CREATED, "Total number of BIA reports created");
    describe_counter!(FEEDBACK_SUBMITTED, "Total number of feedback entries submitted");

    describe_gauge!(INCIDENTS_BY_STATUS, "Incidents per status at the last refresh");
    describe_gauge!(BIA_REPORTS, "BIA reports at the last refresh");
}

/// Publishes dashboard counts as gauges.
pub fn record_dashboard(open: u64, investigating: u64, resolved: u64, bia_reports: u64) {
    for (status, count) in [
        ("open", open),
        ("in_progress", investigating),
        ("resolved", resolved),
    ] {
        metrics::gauge!(INCIDENTS_BY_STATUS, "status" => status).set(count as f64);
    }
    metrics::gauge!(BIA_REPORTS).set(bia_reports as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_without_recorder_are_noops() {
        register_metrics();
        record_dashboard(1, 2, 3, 4);
    }

    #[test]
    fn test_counter_names_are_namespaced() {
        for name in [
            INCIDENTS_CREATED,
            STATUS_CHANGES,
            AUDIT_WRITE_FAILURES,
            BIA_REPORTS_CREATED,
            FEEDBACK_SUBMITTED,
        ] {
            assert!(name.starts_with("td_") && name.ends_with("_total"));
        }
    }
}
