use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::sync::Arc;
use td_core::datetime::format_in;
use td_core::{NewRegistration, SessionService, StaticAuthProvider};
use uuid::Uuid;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create the profile for an account created in the auth provider
    Register {
        /// Account ID issued by the auth provider
        id: Uuid,

        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        /// user or admin
        #[arg(long, default_value = "user")]
        role: String,
    },

    /// Show a user's most recent sign-ins
    Logins {
        id: Uuid,

        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

pub async fn cmd_user(action: UserCommands, ctx: &Context) -> Result<()> {
    match action {
        UserCommands::Register {
            id,
            email,
            name,
            role,
        } => {
            let sessions = SessionService::new(
                Arc::new(StaticAuthProvider::new()),
                ctx.repos.users.clone(),
            )
            .with_policy(ctx.config.registration_policy());

            let user = sessions
                .register_profile(id, &NewRegistration::new(email, name, role))
                .await?;
            if ctx.is_json() {
                return print_json(&user);
            }
            println!(
                "{} Registered {} <{}> as {}",
                "✓".green(),
                user.full_name,
                user.email,
                user.role
            );
            Ok(())
        }

        UserCommands::Logins { id, limit } => {
            let logins = ctx.repos.users.recent_logins(id, limit).await?;
            if ctx.is_json() {
                return print_json(&logins);
            }
            if logins.is_empty() {
                println!("{}", "No sign-ins recorded".yellow());
            }
            for login in logins {
                println!(
                    "{}  {} ({})",
                    format_in(login.logged_in_at, &chrono::Local),
                    login.email,
                    login.role
                );
            }
            Ok(())
        }
    }
}
