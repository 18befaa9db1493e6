//! ItzAI CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Create the config directory and a default config.toml
//! - `ask`      — Load documents and ask questions about them
//! - `status`   — Show configuration and default document status
//! - `doctor`   — Diagnose setup problems
//! - `config`   — Validate, show, or locate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "itzai",
    about = "ItzAI — clinical record assistant grounded in your documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Ask questions about a clinical history
    Ask {
        /// Clinical history PDF (defaults to documents.history_path)
        #[arg(long)]
        history: Option<PathBuf>,

        /// Treatment protocol PDF
        #[arg(long)]
        protocol: Option<PathBuf>,

        /// Include the treatment protocol in the prompt
        #[arg(long)]
        use_protocol: bool,

        /// Ask a single question instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show system status
    Status,

    /// Diagnose system health
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Parse and validate config.toml
    Validate,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Ask {
            history,
            protocol,
            use_protocol,
            message,
        } => {
            let options = commands::ask::AskOptions {
                history,
                protocol,
                use_protocol,
                message,
            };
            commands::ask::run(options).await?
        }
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
