use anyhow::{bail, Result};
use colored::Colorize;
use td_core::catalog::{recommendations_for, user_solutions_for};
use td_core::INCIDENT_TYPES;

use super::{print_json, OutputFormat};

/// Prints the catalog entry for an incident type. Needs no database.
pub fn cmd_catalog(incident_type: &str, format: OutputFormat) -> Result<()> {
    let recommendations = recommendations_for(incident_type);
    let solutions = user_solutions_for(incident_type);

    if recommendations.is_empty() && solutions.is_empty() {
        bail!(
            "Unknown incident type '{}'. Known types: {}",
            incident_type,
            INCIDENT_TYPES.join(", ")
        );
    }

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "incident_type": incident_type,
            "operational": recommendations.operational,
            "managerial": recommendations.managerial,
            "user_solutions": solutions,
        }));
    }

    print_section("Operational", &recommendations.operational);
    print_section("Managerial", &recommendations.managerial);
    print_section("Solutions for the reporter", &solutions);
    Ok(())
}

fn print_section(heading: &str, items: &[String]) {
    println!("{}", heading.bold());
    for item in items {
        println!("  • {}", item);
    }
    println!();
}
