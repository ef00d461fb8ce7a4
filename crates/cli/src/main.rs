//! Palermo CLI - session database and API maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table
//! palermo-cli migrate
//!
//! # Delete expired sessions (and the carts stored in them)
//! palermo-cli sessions prune
//!
//! # Check the Palermo API and summarize the catalog
//! palermo-cli api-status
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create or update the session table
//! - `sessions prune` - Delete expired session records
//! - `api-status` - Fetch the catalog and report stock levels

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "palermo-cli")]
#[command(author, version, about = "Palermo storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the session table
    Migrate,
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Check the Palermo API and summarize the catalog
    ApiStatus {
        /// List every product with its stock level
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Delete expired session records
    Prune,
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
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::Sessions { action } => match action {
            SessionAction::Prune => commands::migrate::prune_sessions().await?,
        },
        Commands::ApiStatus { verbose } => {
            let report = commands::api_status::run(verbose).await?;
            tracing::info!("{report}");
        }
    }
    Ok(())
}
