//! Administrator dashboard summary and its refresh loop.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::Actor;
use crate::db::{BiaReportRepository, IncidentRepository, Repositories};
use crate::error::{TriageError, TriageResult};
use crate::incident::IncidentStatus;

/// Default dashboard refresh period.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Incident counts shown on the administrator dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub open: u64,
    /// Incidents in progress, labelled "Investigating".
    pub investigating: u64,
    pub resolved: u64,
    pub total_bia_reports: u64,
}

impl DashboardSummary {
    pub fn total_incidents(&self) -> u64 {
        self.open + self.investigating + self.resolved
    }
}

/// Read-only dashboard queries.
#[derive(Clone)]
pub struct Dashboard {
    incidents: Arc<dyn IncidentRepository>,
    bia_reports: Arc<dyn BiaReportRepository>,
}

impl Dashboard {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            incidents: repos.incidents.clone(),
            bia_reports: repos.bia_reports.clone(),
        }
    }

    /// Computes the current summary. Admin only.
    pub async fn summary(&self, actor: &Actor) -> TriageResult<DashboardSummary> {
        require_admin(actor)?;
        self.compute().await
    }

    /// Starts a background task refreshing the summary every `interval`.
    pub fn spawn_poller(&self, actor: &Actor, interval: Duration) -> TriageResult<DashboardPoller> {
        require_admin(actor)?;
        Ok(DashboardPoller::spawn(self.clone(), interval))
    }

    async fn compute(&self) -> TriageResult<DashboardSummary> {
        let counts = self.incidents.count_by_status().await?;
        let count = |status: IncidentStatus| counts.get(&status).copied().unwrap_or(0);

        Ok(DashboardSummary {
            open: count(IncidentStatus::Open),
            investigating: count(IncidentStatus::InProgress),
            resolved: count(IncidentStatus::Resolved),
            total_bia_reports: self.bia_reports.count().await?,
        })
    }
}

fn require_admin(actor: &Actor) -> TriageResult<()> {
    if actor.can_administer() {
        Ok(())
    } else {
        Err(TriageError::PermissionDenied {
            action: "view dashboard".to_string(),
            actor: actor.identity(),
        })
    }
}

/// Background refresh of the dashboard summary.
///
/// The latest successful summary is published on a watch channel. A failed
/// refresh keeps the previous value. Dropping the poller stops the loop as
/// well; `shutdown` also waits for it to exit.
pub struct DashboardPoller {
    summary_rx: watch::Receiver<Option<DashboardSummary>>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DashboardPoller {
    fn spawn(dashboard: Dashboard, period: Duration) -> Self {
        let (summary_tx, summary_rx) = watch::channel(None);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            info!(period_secs = period.as_secs(), "Starting dashboard poller");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match dashboard.compute().await {
                            Ok(summary) => {
                                debug!(?summary, "Dashboard refreshed");
                                summary_tx.send_replace(Some(summary));
                            }
                            Err(e) => warn!(error = %e, "Dashboard refresh failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        // A dropped poller closes the channel.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Dashboard poller shutting down");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            summary_rx,
            shutdown_tx,
            handle,
        }
    }

    /// Returns a receiver notified on every refresh.
    pub fn subscribe(&self) -> watch::Receiver<Option<DashboardSummary>> {
        self.summary_rx.clone()
    }

    /// Returns the most recent summary, if one has been computed.
    pub fn latest(&self) -> Option<DashboardSummary> {
        *self.summary_rx.borrow()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Dashboard poller task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bia::{BiaWorkflow, NewBiaReport};
    use crate::incident::{NewIncident, RiskLevel, Severity};
    use crate::lifecycle::IncidentLifecycle;
    use uuid::Uuid;

    async fn seed(repos: &Repositories, admin: &Actor) {
        let lifecycle = IncidentLifecycle::new(repos);
        let reporter = Uuid::new_v4();
        let mut ids = Vec::new();
        for title in ["Phishing Attempt", "Lost Device", "Data Breach", "Data Breach"] {
            let incident = lifecycle
                .create_incident(reporter, NewIncident::new(title, "details", Severity::High))
                .await
                .unwrap();
            ids.push(incident.id);
        }
        lifecycle
            .set_status(admin, ids[1], IncidentStatus::InProgress)
            .await
            .unwrap();
        for id in &ids[2..] {
            lifecycle
                .set_status(admin, *id, IncidentStatus::Resolved)
                .await
                .unwrap();
        }
        lifecycle.flag_for_bia(admin, ids[2]).await.unwrap();
        BiaWorkflow::new(repos)
            .create_report(
                admin,
                NewBiaReport::new(ids[2], RiskLevel::High, "Systems offline", "Notify board"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let repos = Repositories::in_memory();
        let admin = Actor::admin(Uuid::new_v4());
        seed(&repos, &admin).await;

        let summary = Dashboard::new(&repos).summary(&admin).await.unwrap();
        assert_eq!(
            summary,
            DashboardSummary {
                open: 1,
                investigating: 1,
                resolved: 2,
                total_bia_reports: 1,
            }
        );
        assert_eq!(summary.total_incidents(), 4);
    }

    #[tokio::test]
    async fn test_summary_is_admin_only() {
        let repos = Repositories::in_memory();
        let dashboard = Dashboard::new(&repos);
        let reporter = Actor::reporter(Uuid::new_v4());

        assert!(matches!(
            dashboard.summary(&reporter).await,
            Err(TriageError::PermissionDenied { .. })
        ));
        assert!(dashboard
            .spawn_poller(&reporter, DEFAULT_REFRESH_INTERVAL)
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_publishes_refreshes() {
        let repos = Repositories::in_memory();
        let admin = Actor::admin(Uuid::new_v4());
        let poller = Dashboard::new(&repos)
            .spawn_poller(&admin, DEFAULT_REFRESH_INTERVAL)
            .unwrap();
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(DashboardSummary::default()));

        IncidentLifecycle::new(&repos)
            .create_incident(
                Uuid::new_v4(),
                NewIncident::new("Lost Device", "phone", Severity::Low),
            )
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().map(|s| s.open), Some(1));
        assert_eq!(poller.latest().map(|s| s.open), Some(1));

        poller.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_poller_stops() {
        let repos = Repositories::in_memory();
        let admin = Actor::admin(Uuid::new_v4());
        let poller = Dashboard::new(&repos)
            .spawn_poller(&admin, Duration::from_secs(3600))
            .unwrap();
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        drop(poller);

        // The loop owns the sender, so the channel closes once it exits.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("poller loop still running after drop");
        assert!(closed.is_err());
    }
}
