mod auth;
mod config_cmd;
mod payment;
mod property;
mod repair;
mod sync_cmd;
mod tenant;

pub use auth::AuthCommand;
pub use config_cmd::ConfigCommand;
pub use payment::PaymentCommand;
pub use property::PropertyCommand;
pub use repair::RepairCommand;
pub use sync_cmd::SyncCommand;
pub use tenant::TenantCommand;

use chrono::NaiveDate;
use clap::ValueEnum;
use std::io::{self, Write};

use propsync_core::{LocalStore, SnapshotStorage, StorageError};

use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// The Local Store as persisted in the data directory.
pub struct Workspace {
    storage: SnapshotStorage,
    pub store: LocalStore,
}

impl Workspace {
    pub fn open(config: &Config) -> Result<Self, StorageError> {
        let storage = SnapshotStorage::new(config.data_dir.value.clone());
        let store = storage.open_store()?;
        Ok(Self { storage, store })
    }

    pub fn save(&self) -> Result<(), StorageError> {
        self.storage.save_store(&self.store)
    }
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", value))
}

/// Asks a yes/no question; anything but "y" is a no.
pub(crate) fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
