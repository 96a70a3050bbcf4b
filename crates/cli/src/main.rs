//! Staple CLI - database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! staple migrate
//!
//! # Create an account
//! staple user create -e reader@example.com -p 'correct horse'
//!
//! # Change an account's quota
//! staple user set-quota -e reader@example.com -n 50
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create an account
//! - `user set-quota` - Change an account's staple quota

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "staple")]
#[command(author, version, about = "Staple CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Initial password
        #[arg(short, long)]
        password: String,
    },
    /// Set how many active staples an account may hold (1-100)
    SetQuota {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// New quota
        #[arg(short = 'n', long)]
        max_staples: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create { email, password } => {
                commands::user::create(&email, &password).await?;
            }
            UserAction::SetQuota { email, max_staples } => {
                commands::user::set_quota(&email, max_staples).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_quota() {
        let cli = Cli::try_parse_from([
            "staple",
            "user",
            "set-quota",
            "-e",
            "reader@example.com",
            "-n",
            "50",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::SetQuota { max_staples: 50, .. }
            })
        ));
    }
}
