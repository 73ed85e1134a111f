use anyhow::Result;
use colored::Colorize;
use td_core::{Dashboard, DashboardSummary};
use tracing::info;

use super::{print_json, Context};

/// Prints the dashboard summary once, or keeps refreshing it until Ctrl+C.
pub async fn cmd_summary(ctx: &Context, watch: bool) -> Result<()> {
    let dashboard = Dashboard::new(&ctx.repos);
    let operator = ctx.operator();

    if !watch {
        let summary = dashboard.summary(&operator).await?;
        publish(&summary);
        return show(ctx, &summary);
    }

    let poller = dashboard.spawn_poller(&operator, ctx.config.refresh_interval())?;
    let mut updates = poller.subscribe();
    info!(
        interval_secs = ctx.config.refresh_interval().as_secs(),
        "Watching dashboard"
    );

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = *updates.borrow_and_update();
                if let Some(summary) = latest {
                    publish(&summary);
                    show(ctx, &summary)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Stopping...".yellow());
                break;
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}

fn publish(summary: &DashboardSummary) {
    td_observability::record_dashboard(
        summary.open,
        summary.investigating,
        summary.resolved,
        summary.total_bia_reports,
    );
}

fn show(ctx: &Context, summary: &DashboardSummary) -> Result<()> {
    if ctx.is_json() {
        return print_json(summary);
    }

    println!("{}", "Triage Desk Dashboard".bold());
    println!("─────────────────────");
    println!("Open:          {}", summary.open.to_string().yellow());
    println!("Investigating: {}", summary.investigating.to_string().blue());
    println!("Resolved:      {}", summary.resolved.to_string().green());
    println!("BIA reports:   {}", summary.total_bia_reports);
    println!();
    Ok(())
}
