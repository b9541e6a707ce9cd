//! Sync CLI commands for reconciling the Local Store with the spreadsheet.

use clap::{Args, Subcommand};
use std::sync::Arc;

use propsync_core::{
    GoogleSheetsClient, RemoteAdapter, RemoteError, SessionManager, StorageError, SyncEngine,
    SyncError, SyncMode,
};

use super::auth::{oauth_client, LoginError};
use super::Workspace;
use crate::config::Config;
use crate::session_file::StoredSession;

/// Sync with the remote spreadsheet
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,

    /// Sync mode (push, pull, merge)
    #[arg(long, short, default_value = "merge")]
    mode: String,

    /// Confirm a pull, which discards local records missing from the remote
    #[arg(long, short)]
    yes: bool,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and local record counts
    Status,
}

impl SyncCommand {
    pub fn run(&self, config: &Config) -> Result<(), SyncCommandError> {
        if let Some(SyncSubcommand::Status) = &self.command {
            return status(config);
        }

        let mode: SyncMode = self.mode.parse().map_err(SyncCommandError::Usage)?;
        if mode.is_destructive() && !self.yes {
            println!("Pull replaces the Local Store with the remote contents.");
            println!("Local records that were never pushed will be lost.");
            println!("Re-run with --yes to continue, or use --mode merge.");
            return Ok(());
        }

        // Use tokio runtime for async operations
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?;
        rt.block_on(sync(config, mode))
    }
}

async fn sync(config: &Config, mode: SyncMode) -> Result<(), SyncCommandError> {
    let document_id = config
        .document_id
        .value
        .clone()
        .ok_or(SyncCommandError::NoDocument)?;

    let session_path = config.session_path();
    let stored = StoredSession::load(&session_path)
        .map_err(|e| SyncCommandError::Session(e.to_string()))?
        .ok_or(SyncCommandError::NotLoggedIn)?;

    let sessions = Arc::new(SessionManager::new(oauth_client(config)?));
    sessions
        .resume(&stored.user_id, stored.bundle.clone())
        .await
        .map_err(SyncError::Auth)?;

    let api = GoogleSheetsClient::new(config.sheets.api_base.clone(), config.sheets.timeout())?;
    let remote = RemoteAdapter::new(api).with_retry(config.retry.policy());

    let workspace = Workspace::open(config)?;
    let engine = SyncEngine::new(
        workspace.store.clone(),
        sessions.clone(),
        remote,
        stored.user_id.clone(),
        document_id.clone(),
    );

    println!("Syncing with document {} ({})...", document_id, mode);
    let result = engine.sync(mode).await;

    // Keep whatever the session manager holds now, including refreshed tokens.
    if let Some(bundle) = sessions.export(&stored.user_id) {
        if bundle != stored.bundle {
            let refreshed = StoredSession {
                user_id: stored.user_id.clone(),
                bundle,
            };
            if let Err(e) = refreshed.save(&session_path) {
                tracing::warn!("failed to persist refreshed session: {}", e);
            }
        }
    }

    if let Ok(_) | Err(SyncError::PartialFailureAfterLocalCommit(_)) = &result {
        workspace.save()?;
    }

    let summary = result?;
    println!();
    println!("{}", summary);
    Ok(())
}

fn status(config: &Config) -> Result<(), SyncCommandError> {
    println!("Sync Configuration");
    println!("==================");
    println!();

    match &config.document_id.value {
        Some(id) => println!("Document:  {}", id),
        None => {
            println!("Document:  not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  sheets:");
            println!("    document_id: \"<spreadsheet id>\"");
            println!();
            println!("Or set environment variable:");
            println!("  PROPSYNC_DOCUMENT_ID");
        }
    }

    let stored = StoredSession::load(&config.session_path())
        .map_err(|e| SyncCommandError::Session(e.to_string()))?;
    match stored {
        Some(stored) => println!(
            "Account:   {}",
            stored
                .bundle
                .account_email
                .as_deref()
                .unwrap_or(&stored.user_id)
        ),
        None => println!("Account:   not logged in"),
    }

    let workspace = Workspace::open(config)?;
    println!("Local:     {}", workspace.store.counts());
    Ok(())
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    Sync(SyncError),
    Remote(RemoteError),
    Login(LoginError),
    Storage(StorageError),
    Session(String),
    Usage(String),
    NoDocument,
    NotLoggedIn,
    RuntimeError(String),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::Sync(SyncError::Auth(e)) if e.requires_login() => {
                write!(f, "{}\nRun 'propsync auth login' to sign in again.", e)
            }
            SyncCommandError::Sync(e) => write!(f, "{}", e),
            SyncCommandError::Remote(e) => write!(f, "{}", e),
            SyncCommandError::Login(e) => write!(f, "{}", e),
            SyncCommandError::Storage(e) => write!(f, "{}", e),
            SyncCommandError::Session(e) => write!(f, "Session error: {}", e),
            SyncCommandError::Usage(e) => write!(f, "{}", e),
            SyncCommandError::NoDocument => write!(
                f,
                "No document configured. Set sheets.document_id in config or PROPSYNC_DOCUMENT_ID."
            ),
            SyncCommandError::NotLoggedIn => {
                write!(f, "Not logged in. Run 'propsync auth login' first.")
            }
            SyncCommandError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::Sync(e) => Some(e),
            SyncCommandError::Remote(e) => Some(e),
            SyncCommandError::Login(e) => Some(e),
            SyncCommandError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::Sync(e)
    }
}

impl From<RemoteError> for SyncCommandError {
    fn from(e: RemoteError) -> Self {
        SyncCommandError::Remote(e)
    }
}

impl From<LoginError> for SyncCommandError {
    fn from(e: LoginError) -> Self {
        SyncCommandError::Login(e)
    }
}

impl From<StorageError> for SyncCommandError {
    fn from(e: StorageError) -> Self {
        SyncCommandError::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propsync_core::AuthError;

    #[test]
    fn test_auth_error_suggests_login() {
        let err = SyncCommandError::from(SyncError::Auth(AuthError::RefreshFailed(
            "invalid_grant".to_string(),
        )));
        assert!(err.to_string().contains("propsync auth login"));
    }

    #[test]
    fn test_transient_auth_error_does_not_suggest_login() {
        let err = SyncCommandError::from(SyncError::Auth(AuthError::Http(
            "connection refused".to_string(),
        )));
        assert!(!err.to_string().contains("auth login"));
    }

    #[test]
    fn test_invalid_mode_is_usage_error() {
        let err = "sideways"
            .parse::<SyncMode>()
            .map_err(SyncCommandError::Usage)
            .unwrap_err();
        assert!(err.to_string().contains("Valid values"));
    }
}
