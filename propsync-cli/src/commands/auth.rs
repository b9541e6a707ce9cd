//! Authentication commands for the propsync CLI.
//!
//! Login runs the OAuth authorization-code flow through a local callback
//! server and stores the resulting session bundle in the data directory.

use axum::{extract::Query, response::Html, routing::get, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use clap::{Args, Subcommand};
use rand::Rng;
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio::sync::oneshot;

use propsync_core::{GoogleOAuthClient, OAuthConfig, SessionManager};

use crate::config::Config;
use crate::session_file::StoredSession;

/// How long to wait for the browser to come back to the callback server
const LOGIN_TIMEOUT_SECS: u64 = 300;

/// Authentication commands
#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand)]
enum AuthSubcommand {
    /// Log in with the spreadsheet provider (opens a consent URL)
    Login,
    /// Log out (remove the stored session)
    Logout,
    /// Show authentication status
    Status,
}

impl AuthCommand {
    pub fn run(&self, config: &Config) -> Result<(), LoginError> {
        match &self.command {
            AuthSubcommand::Login => {
                // Use tokio runtime for async operations
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(login(config))
            }
            AuthSubcommand::Logout => logout(config),
            AuthSubcommand::Status => status(config),
        }
    }
}

/// Errors that can occur during authentication
#[derive(Debug)]
pub enum LoginError {
    /// I/O error
    IoError(io::Error),
    /// The authorization server rejected the exchange
    Auth(propsync_core::AuthError),
    /// Consent was denied in the browser
    Denied(String),
    /// The callback carried a different state than the one we sent
    StateMismatch,
    /// Session file could not be written
    SessionFile(String),
    /// Timeout waiting for callback
    Timeout,
    /// OAuth client not configured
    NotConfigured,
}

impl std::fmt::Display for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginError::IoError(e) => write!(f, "I/O error: {}", e),
            LoginError::Auth(e) => write!(f, "{}", e),
            LoginError::Denied(reason) => write!(f, "Authorization denied: {}", reason),
            LoginError::StateMismatch => {
                write!(f, "Callback state did not match; login aborted")
            }
            LoginError::SessionFile(e) => write!(f, "Failed to save session: {}", e),
            LoginError::Timeout => write!(f, "Timed out waiting for authentication"),
            LoginError::NotConfigured => write!(
                f,
                "OAuth client not configured. Set oauth.client_id and oauth.client_secret in config."
            ),
        }
    }
}

impl std::error::Error for LoginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoginError::IoError(e) => Some(e),
            LoginError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LoginError {
    fn from(e: io::Error) -> Self {
        LoginError::IoError(e)
    }
}

impl From<propsync_core::AuthError> for LoginError {
    fn from(e: propsync_core::AuthError) -> Self {
        LoginError::Auth(e)
    }
}

/// Builds the OAuth client from config.
pub(crate) fn oauth_client(config: &Config) -> Result<GoogleOAuthClient, LoginError> {
    let (client_id, client_secret) = match (&config.oauth.client_id, &config.oauth.client_secret) {
        (Some(id), Some(secret)) => (id.clone(), secret.clone()),
        _ => return Err(LoginError::NotConfigured),
    };
    let mut oauth = OAuthConfig::google(client_id, client_secret, config.oauth.redirect_uri());
    oauth.timeout = config.sheets.timeout();
    Ok(GoogleOAuthClient::new(oauth)?)
}

/// Random value tying the callback to this login attempt.
fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Query parameters on the OAuth redirect
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Interactive login flow
async fn login(config: &Config) -> Result<(), LoginError> {
    let client = oauth_client(config)?;
    let state = generate_state();

    // Create channel to receive the result
    let (tx, rx) = oneshot::channel::<CallbackParams>();
    let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

    // The redirect URI registered with the provider is fixed, so bind its port
    let listener =
        tokio::net::TcpListener::bind(("127.0.0.1", config.oauth.redirect_port)).await?;

    let tx_clone = tx.clone();
    let server_handle = tokio::spawn(async move {
        let app = Router::new().route(
            "/callback",
            get(move |Query(params): Query<CallbackParams>| {
                let tx = tx_clone.clone();
                async move {
                    let sender = tx
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .take();
                    if let Some(tx) = sender {
                        let _ = tx.send(params);
                    }

                    Html(
                        r#"<!DOCTYPE html>
<html>
<head><title>propsync</title></head>
<body>
<h1>Authorization received</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>"#,
                    )
                }
            }),
        );

        if let Err(e) = axum::serve(listener, app).await {
            tracing::warn!("callback server stopped: {}", e);
        }
    });

    println!("Open this URL in your browser to authorize propsync:");
    println!();
    println!("  {}", client.authorization_url(&state));
    println!();
    println!(
        "Waiting for authorization (timeout: {} minutes)",
        LOGIN_TIMEOUT_SECS / 60
    );

    let result =
        tokio::time::timeout(std::time::Duration::from_secs(LOGIN_TIMEOUT_SECS), rx).await;

    // Shutdown server
    server_handle.abort();

    let params = match result {
        Ok(Ok(params)) => params,
        Ok(Err(_)) | Err(_) => return Err(LoginError::Timeout),
    };

    if let Some(error) = params.error {
        return Err(LoginError::Denied(error));
    }
    if params.state.as_deref() != Some(state.as_str()) {
        return Err(LoginError::StateMismatch);
    }
    let code = params
        .code
        .ok_or_else(|| LoginError::Denied("no authorization code returned".to_string()))?;

    let manager = SessionManager::new(client);
    let session = manager.exchange_code(&code).await?;

    let stored = StoredSession {
        user_id: session.user_id.clone(),
        bundle: session.to_bundle(),
    };
    stored
        .save(&config.session_path())
        .map_err(|e| LoginError::SessionFile(e.to_string()))?;

    println!(
        "Authenticated as {}",
        session.account_email.as_deref().unwrap_or(&session.user_id)
    );
    Ok(())
}

/// Remove the stored session
fn logout(config: &Config) -> Result<(), LoginError> {
    if StoredSession::remove(&config.session_path())? {
        println!("Logged out. Sync disabled until you log in again.");
    } else {
        println!("Already logged out (no session).");
    }
    Ok(())
}

/// Show authentication status
fn status(config: &Config) -> Result<(), LoginError> {
    let stored = StoredSession::load(&config.session_path())
        .map_err(|e| LoginError::SessionFile(e.to_string()))?;

    let Some(stored) = stored else {
        if config.oauth.is_configured() {
            println!("Not logged in. Run 'propsync auth login' to authenticate.");
        } else {
            println!("Not configured. Set oauth.client_id and oauth.client_secret in config first.");
        }
        return Ok(());
    };

    let who = stored
        .bundle
        .account_email
        .as_deref()
        .unwrap_or(&stored.user_id);
    println!("Logged in as {}", who);

    match Utc
        .timestamp_millis_opt(stored.bundle.expiry_epoch_millis)
        .single()
    {
        Some(expiry) if expiry > Utc::now() => println!("Access token valid until {}", expiry),
        Some(expiry) => println!("Access token expired at {} (refreshed on next sync)", expiry),
        None => println!("Access token expiry unknown"),
    }
    if stored.bundle.refresh_token.is_none() {
        println!("No refresh token stored; log in again when the access token expires.");
    }
    Ok(())
}
