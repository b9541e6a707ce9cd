use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod session_file;

use commands::{
    AuthCommand, ConfigCommand, PaymentCommand, PropertyCommand, RepairCommand, SyncCommand,
    TenantCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "propsync")]
#[command(version)]
#[command(about = "Manage rental properties and sync them with a spreadsheet", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to or out of the spreadsheet account
    Auth(AuthCommand),

    /// Manage properties
    Property(PropertyCommand),

    /// Manage tenants
    Tenant(TenantCommand),

    /// Record and track rent payments
    Payment(PaymentCommand),

    /// Manage repair requests
    Repair(RepairCommand),

    /// Sync with the remote spreadsheet
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "propsync=warn,propsync_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match &cli.command {
        Commands::Auth(cmd) => cmd.run(&config)?,
        Commands::Property(cmd) => cmd.run(&config)?,
        Commands::Tenant(cmd) => cmd.run(&config)?,
        Commands::Payment(cmd) => cmd.run(&config)?,
        Commands::Repair(cmd) => cmd.run(&config)?,
        Commands::Sync(cmd) => cmd.run(&config)?,
        Commands::Config(cmd) => cmd.run(&config)?,
    }

    Ok(())
}
