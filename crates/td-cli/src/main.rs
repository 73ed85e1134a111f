//! Triage Desk CLI
//!
//! Command-line interface for the Triage Desk incident reporting and triage
//! engine.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use td_observability::LoggingConfig;

mod commands;
mod config;

use commands::{
    cmd_bia, cmd_catalog, cmd_incident, cmd_summary, cmd_user, BiaCommands, Context,
    IncidentCommands, OutputFormat, UserCommands,
};
use config::AppConfig;

#[derive(Parser)]
#[command(name = "triage-desk")]
#[command(version)]
#[command(about = "Incident reporting and triage desk", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database URL, overriding the configuration file
    #[arg(short, long, env = "DATABASE_URL")]
    database: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Show the dashboard summary
    Summary {
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Inspect and triage incidents
    Incident {
        #[command(subcommand)]
        action: IncidentCommands,
    },

    /// Business impact analysis reports
    Bia {
        #[command(subcommand)]
        action: BiaCommands,
    },

    /// Manage user profiles
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Show catalog recommendations for an incident type
    Catalog {
        /// Incident type, e.g. "Data Breach"
        incident_type: String,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Show the database password (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },

    /// Validate the configuration
    Validate,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            if cli.verbose {
                eprintln!("Using default configuration ({:#})", e);
            }
            AppConfig::default()
        }
    };
    if let Some(url) = cli.database.clone() {
        config.database.url = url;
    }

    let mut logging =
        LoggingConfig::from_settings(&config.logging.level, config.logging.json_format);
    if cli.verbose {
        logging.level = tracing::Level::DEBUG;
    }
    if let Err(e) = td_observability::init_logging_with_config(logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    td_observability::register_metrics();

    match cli.command {
        Commands::Catalog { incident_type } => cmd_catalog(&incident_type, cli.format),
        Commands::Config { action } => cmd_config(action, config, &config_path, cli.format),
        command => {
            let ctx = Context::connect(config, cli.format).await?;
            let result = run(command, &ctx).await;
            ctx.close().await;
            result
        }
    }
}

async fn run(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Migrate => cmd_migrate(ctx).await,
        Commands::Summary { watch } => cmd_summary(ctx, watch).await,
        Commands::Incident { action } => cmd_incident(action, ctx).await,
        Commands::Bia { action } => cmd_bia(action, ctx).await,
        Commands::User { action } => cmd_user(action, ctx).await,
        Commands::Catalog { .. } | Commands::Config { .. } => Ok(()),
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "triage-desk", "triage-desk") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

async fn cmd_migrate(ctx: &Context) -> Result<()> {
    println!("{}", "Running migrations...".cyan());
    td_core::db::run_migrations(&ctx.pool).await?;
    println!(
        "{} {} schema is up to date",
        "✓".green(),
        ctx.pool.db_type()
    );
    Ok(())
}

fn cmd_config(
    action: ConfigCommands,
    config: AppConfig,
    path: &std::path::Path,
    format: OutputFormat,
) -> Result<()> {
    match action {
        ConfigCommands::Show { show_secrets } => {
            let shown = if show_secrets {
                config
            } else {
                config.redact_secrets()
            };
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("{}", format!("# {}", path.display()).dimmed());
                print!("{}", serde_yaml::to_string(&shown)?);
            }
            Ok(())
        }

        ConfigCommands::Validate => {
            let problems = config.validate();
            if problems.is_empty() {
                println!("{}", "Configuration is valid".green().bold());
                return Ok(());
            }
            for problem in &problems {
                println!("{} {}", "✗".red(), problem);
            }
            bail!("{} configuration problem(s)", problems.len())
        }

        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force)", path.display());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            AppConfig::default().save(path)?;
            println!("{} Wrote {}", "✓".green(), path.display());
            Ok(())
        }
    }
}
