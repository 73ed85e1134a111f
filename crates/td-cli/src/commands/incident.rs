use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use td_core::datetime::format_in;
use td_core::db::IncidentFilter;
use td_core::{
    Actor, Incident, IncidentLifecycle, IncidentStatus, PreferencesStore, RiskLevel,
};
use uuid::Uuid;

use super::{print_json, short_id, Context};

#[derive(Subcommand)]
pub enum IncidentCommands {
    /// List incidents, newest first
    List {
        /// Case-insensitive title search
        #[arg(short, long)]
        search: Option<String>,

        /// Only incidents filed by this reporter
        #[arg(short, long)]
        reporter: Option<Uuid>,

        /// Filter by status (open, investigating, resolved)
        #[arg(long)]
        status: Option<IncidentStatus>,

        /// Include incidents hidden in the local preferences
        #[arg(long)]
        all: bool,
    },

    /// Show incident details
    Show {
        /// Incident ID
        id: Uuid,
    },

    /// Show the audit trail of an incident
    Audit {
        /// Incident ID
        id: Uuid,
    },

    /// Change incident status
    SetStatus {
        /// Incident ID
        id: Uuid,

        /// New status
        status: IncidentStatus,

        /// Administrator performing the change
        #[arg(long)]
        actor: Uuid,
    },

    /// Hide an incident from local listings
    Hide {
        id: Uuid,
    },

    /// Show a hidden incident again
    Unhide {
        id: Uuid,
    },
}

pub async fn cmd_incident(action: IncidentCommands, ctx: &Context) -> Result<()> {
    let lifecycle = IncidentLifecycle::new(&ctx.repos);

    match action {
        IncidentCommands::List {
            search,
            reporter,
            status,
            all,
        } => {
            let filter = IncidentFilter {
                reported_by: reporter,
                status,
                title_query: search,
                ..Default::default()
            };
            let incidents = lifecycle.list_incidents(&ctx.operator(), filter).await?;
            let prefs = PreferencesStore::load(&ctx.config.preferences.path)?;
            let shown: Vec<&Incident> = if all {
                incidents.iter().collect()
            } else {
                prefs.visible(&incidents)
            };

            if ctx.is_json() {
                return print_json(&shown);
            }
            if shown.is_empty() {
                println!("{}", "No incidents found".yellow());
                return Ok(());
            }
            println!(
                "{:<10} {:<22} {:<8} {:<14} {:<8} {}",
                "ID".bold(),
                "TYPE".bold(),
                "SEVERITY".bold(),
                "STATUS".bold(),
                "RISK".bold(),
                "REPORTED".bold()
            );
            for incident in shown {
                println!(
                    "{:<10} {:<22} {:<8} {:<14} {:<8} {}",
                    short_id(incident.id),
                    truncate(&incident.title, 22),
                    incident.severity.to_string(),
                    colorize_status(incident.status),
                    risk_label(incident),
                    format_in(incident.created_at, &chrono::Local)
                );
            }
            let hidden = incidents.len() - prefs.visible(&incidents).len();
            if !all && hidden > 0 {
                println!("{}", format!("{} hidden (use --all)", hidden).dimmed());
            }
            Ok(())
        }

        IncidentCommands::Show { id } => {
            let incident = lifecycle.get_incident(&ctx.operator(), id).await?;
            if ctx.is_json() {
                return print_json(&incident);
            }
            print_incident(&incident);
            Ok(())
        }

        IncidentCommands::Audit { id } => {
            let entries = lifecycle.audit_trail().list_for(id).await?;
            if ctx.is_json() {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("{}", "No audit entries".yellow());
                return Ok(());
            }
            for entry in entries {
                let transition = match (entry.old_status, entry.new_status) {
                    (Some(old), Some(new)) => format!("{} -> {}", old, new),
                    _ => String::new(),
                };
                println!(
                    "{}  {:<22} {:<28} by {}",
                    format_in(entry.changed_at, &chrono::Local).dimmed(),
                    entry.action.to_string().cyan(),
                    transition,
                    short_id(entry.changed_by)
                );
                if let Some(details) = entry.details {
                    println!("    {}", details);
                }
            }
            Ok(())
        }

        IncidentCommands::SetStatus { id, status, actor } => {
            if actor.is_nil() {
                bail!("--actor must be a real administrator id");
            }
            let updated = lifecycle
                .set_status(&Actor::admin(actor), id, status)
                .await?;
            if ctx.is_json() {
                return print_json(&updated);
            }
            println!(
                "{} {} is now {}",
                "✓".green(),
                short_id(updated.id),
                colorize_status(updated.status)
            );
            Ok(())
        }

        IncidentCommands::Hide { id } => {
            let mut prefs = PreferencesStore::load(&ctx.config.preferences.path)?;
            prefs.hide(id)?;
            println!("Hidden {}", short_id(id));
            Ok(())
        }

        IncidentCommands::Unhide { id } => {
            let mut prefs = PreferencesStore::load(&ctx.config.preferences.path)?;
            prefs.unhide(id)?;
            println!("Unhidden {}", short_id(id));
            Ok(())
        }
    }
}

fn print_incident(incident: &Incident) {
    println!("{}", incident.title.bold());
    println!("─────────────────────");
    println!("ID:          {}", incident.id);
    println!("Status:      {}", colorize_status(incident.status));
    println!("Severity:    {}", incident.severity);
    println!("Risk:        {}", risk_label(incident));
    println!("Reporter:    {}", incident.reported_by);
    println!("Reported:    {}", format_in(incident.created_at, &chrono::Local));
    println!("Updated:     {}", format_in(incident.updated_at, &chrono::Local));
    println!("BIA flagged: {}", if incident.bia_report { "yes" } else { "no" });
    println!();
    println!("{}", incident.description);
    if let Some(solution) = &incident.admin_solution {
        println!();
        println!("{} {}", "Solution:".bold(), solution);
    }
    if let Some(notes) = &incident.admin_notes {
        println!("{} {}", "Notes:".bold(), notes);
    }
}

fn colorize_status(status: IncidentStatus) -> String {
    let label = status.user_label();
    match status {
        IncidentStatus::Open => label.yellow().to_string(),
        IncidentStatus::InProgress => label.blue().to_string(),
        IncidentStatus::Resolved => label.green().to_string(),
    }
}

fn risk_label(incident: &Incident) -> String {
    let risk = incident.effective_risk();
    let label = match risk {
        RiskLevel::High => risk.to_string().red().to_string(),
        RiskLevel::Medium => risk.to_string().yellow().to_string(),
        RiskLevel::Low => risk.to_string(),
    };
    if incident.risk_is_derived() {
        format!("{}*", label)
    } else {
        label
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
