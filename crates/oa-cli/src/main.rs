//! ovpn-admin CLI
//!
//! Single binary for OpenVPN client administration:
//! - Reconciliation service (tracks who is connected)
//! - Certificate lifecycle (issue, revoke, profile download)
//! - Inspection commands (list, stats, parse)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ovpn_admin::commands;

#[derive(Parser)]
#[command(name = "ovpn-admin")]
#[command(author, version, about = "OpenVPN client certificate and connection manager")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "OVPN_ADMIN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconciliation service in the foreground
    Serve,

    /// List registered clients
    List {
        /// Show detailed information
        #[arg(short, long)]
        long: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show aggregate traffic across all clients
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Issue a certificate for a new client
    Issue {
        /// Client name (letters, digits, '-' and '_')
        name: String,
    },

    /// Revoke a client's certificate and remove it
    Revoke {
        /// Client name
        name: String,
        /// Print the steps without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run one reconciliation cycle against the status report
    Reconcile,

    /// Parse a status report file and print its sessions
    Parse {
        /// Status report to parse
        file: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Render a client's connection profile
    Profile {
        /// Client name
        name: String,
        /// Write the profile to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve => {
            let coordinator = commands::open_coordinator(config_path).await?;
            commands::serve_command(&coordinator).await
        }
        Commands::List { long, json } => {
            let coordinator = commands::open_coordinator(config_path).await?;
            commands::list_command(&coordinator, long, json).await
        }
        Commands::Stats { json } => {
            let coordinator = commands::open_coordinator(config_path).await?;
            commands::stats_command(&coordinator, json).await
        }
        Commands::Issue { name } => {
            let coordinator = commands::open_coordinator(config_path).await?;
            commands::issue_command(&coordinator, &name).await
        }
        Commands::Revoke {
            name,
            dry_run: true,
        } => {
            // Only needs the configuration, never touches the registry
            let config = commands::load_admin_config(config_path)?;
            commands::revoke_plan_command(&config, &name)
        }
        Commands::Revoke { name, .. } => {
            let coordinator = commands::open_coordinator(config_path).await?;
            commands::revoke_command(&coordinator, &name).await
        }
        Commands::Reconcile => {
            let coordinator = commands::open_coordinator(config_path).await?;
            commands::reconcile_command(&coordinator).await
        }
        Commands::Profile { name, output } => {
            let coordinator = commands::open_coordinator(config_path).await?;
            commands::profile_command(&coordinator, &name, output.as_deref()).await
        }
        Commands::Parse { file, json } => commands::parse_command(&file, json),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Path => commands::config_path(config_path),
            ConfigAction::Init { force } => commands::config_init(config_path, force),
        },
    }
}
