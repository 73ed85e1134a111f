use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use td_core::datetime::format_in;
use td_core::BiaWorkflow;
use uuid::Uuid;

use super::{print_json, short_id, Context};

#[derive(Subcommand)]
pub enum BiaCommands {
    /// List BIA reports, newest first
    List,

    /// List resolved incidents flagged for a BIA report
    Eligible,

    /// Show a pre-filled report for an incident without saving it
    Draft {
        /// Incident ID
        id: Uuid,
    },
}

pub async fn cmd_bia(action: BiaCommands, ctx: &Context) -> Result<()> {
    let workflow = BiaWorkflow::new(&ctx.repos);

    match action {
        BiaCommands::List => {
            let listings = workflow.list_reports().await?;
            if ctx.is_json() {
                return print_json(&listings);
            }
            if listings.is_empty() {
                println!("{}", "No BIA reports".yellow());
                return Ok(());
            }
            for listing in listings {
                let report = &listing.report;
                println!(
                    "{}  {:<24} risk {:<6} {}",
                    short_id(report.id),
                    listing.title().bold(),
                    report.risk_level.to_string(),
                    format_in(report.created_at, &chrono::Local).dimmed()
                );
                if let Some(summary) = &report.bia_description {
                    println!("    {}", summary);
                }
            }
            Ok(())
        }

        BiaCommands::Eligible => {
            let incidents = workflow.list_eligible().await?;
            if ctx.is_json() {
                return print_json(&incidents);
            }
            if incidents.is_empty() {
                println!("{}", "No incidents awaiting a BIA report".yellow());
                return Ok(());
            }
            for incident in incidents {
                let done = workflow.report_for(incident.id).await?.is_some();
                println!(
                    "{}  {:<24} {}",
                    short_id(incident.id),
                    incident.title,
                    if done {
                        "report filed".green().to_string()
                    } else {
                        "pending".yellow().to_string()
                    }
                );
            }
            Ok(())
        }

        BiaCommands::Draft { id } => {
            let draft = workflow.draft_report(id).await?;
            if ctx.is_json() {
                return print_json(&draft);
            }
            if let Some(risk) = draft.risk_level {
                println!("{} {}", "Risk level:".bold(), risk);
            }
            println!("{}", "Operational:".bold());
            println!("{}", draft.operational.unwrap_or_default());
            println!("{}", "Managerial:".bold());
            println!("{}", draft.managerial.unwrap_or_default());
            Ok(())
        }
    }
}
