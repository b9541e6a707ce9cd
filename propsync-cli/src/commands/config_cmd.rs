use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::Path;

use super::OutputFormat;
use crate::config::Config;

const DEFAULT_CONFIG: &str = r#"# propsync configuration

# Where store.json and session.json live (default: platform data dir)
# data_dir: ~/.local/share/propsync

# OAuth client registered with Google. The redirect URI must be
# http://127.0.0.1:<redirect_port>/callback
oauth:
  # client_id: ""
  # client_secret: ""
  redirect_port: 8765

sheets:
  # Id of the spreadsheet document to sync with
  # document_id: ""
  timeout_secs: 30

retry:
  max_retries: 3
  initial_backoff_ms: 500
  max_backoff_ms: 8000
"#;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!(
                            "document_id: {}",
                            config.document_id.value.as_deref().unwrap_or("(not set)")
                        );
                        println!("  source: {}", config.document_id.source);
                        println!();

                        println!(
                            "oauth: {}",
                            if config.oauth.is_configured() {
                                "configured"
                            } else {
                                "not configured"
                            }
                        );
                        println!("  redirect_uri: {}", config.oauth.redirect_uri());
                        println!();

                        println!("sheets.api_base: {}", config.sheets.api_base);
                        println!("sheets.timeout_secs: {}", config.sheets.timeout_secs);
                        println!(
                            "retry: {} retries, {}ms to {}ms backoff",
                            config.retry.max_retries,
                            config.retry.initial_backoff_ms,
                            config.retry.max_backoff_ms
                        );
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                // Check if config already exists
                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'propsync config show' to view current configuration.");
                    return Ok(());
                }

                write_default_config(&config_path)?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to set your OAuth client and document id.");
                Ok(())
            }
        }
    }
}

fn write_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())
}
