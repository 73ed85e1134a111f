//! Subcommand implementations.

mod bia;
mod catalog;
mod incident;
mod summary;
mod user;

pub use bia::{cmd_bia, BiaCommands};
pub use catalog::cmd_catalog;
pub use incident::{cmd_incident, IncidentCommands};
pub use summary::cmd_summary;
pub use user::{cmd_user, UserCommands};

use anyhow::{Context as _, Result};
use serde::Serialize;
use td_core::db::{create_pool_with_options, DbPool};
use td_core::{Actor, Repositories};
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;

/// Output format (text, json).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

/// Connected stores plus output settings shared by the subcommands.
pub struct Context {
    pub pool: DbPool,
    pub repos: Repositories,
    pub config: AppConfig,
    pub format: OutputFormat,
}

impl Context {
    pub async fn connect(config: AppConfig, format: OutputFormat) -> Result<Self> {
        debug!(url = %config.redact_secrets().database.url, "Connecting to database");
        let pool = create_pool_with_options(&config.database.url, config.pool_options())
            .await
            .context("Failed to connect to database")?;
        let repos = Repositories::from_pool(&pool);

        Ok(Self {
            pool,
            repos,
            config,
            format,
        })
    }

    /// The operator running the CLI has direct store access and acts as an
    /// administrator with the nil id.
    pub fn operator(&self) -> Actor {
        Actor::admin(Uuid::nil())
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}
