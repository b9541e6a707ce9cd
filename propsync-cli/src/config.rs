use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use propsync_core::remote::GOOGLE_SHEETS_API_BASE;
use propsync_core::RetryPolicy;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// OAuth client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    /// Port of the local callback server used by `auth login`
    pub redirect_port: u16,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_port: 8765,
        }
    }
}

impl OAuthSettings {
    /// Returns true if both client id and secret are set
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.redirect_port)
    }
}

/// Spreadsheet backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub api_base: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            api_base: GOOGLE_SHEETS_API_BASE.to_string(),
            timeout_secs: 30,
        }
    }
}

impl SheetsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Backoff for rate-limited spreadsheet calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding store.json and session.json
    pub data_dir: ConfigValue<PathBuf>,
    /// Id of the remote spreadsheet document
    pub document_id: ConfigValue<Option<String>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub oauth: OAuthSettings,
    pub sheets: SheetsSettings,
    pub retry: RetrySettings,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    oauth: Option<OAuthSettings>,
    sheets: Option<SheetsFile>,
    retry: Option<RetrySettings>,
}

/// `sheets` section as written in the file; `document_id` is tracked
/// separately with its source.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SheetsFile {
    document_id: Option<String>,
    #[serde(flatten)]
    settings: SheetsSettings,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut document_id = ConfigValue::new(None, ConfigSource::Default);
        let mut config_file = None;
        let mut oauth = OAuthSettings::default();
        let mut sheets = SheetsSettings::default();
        let mut retry = RetrySettings::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(oauth_config) = file_config.oauth {
                oauth = oauth_config;
            }
            if let Some(sheets_file) = file_config.sheets {
                if let Some(id) = sheets_file.document_id {
                    document_id = ConfigValue::new(Some(id), ConfigSource::File);
                }
                sheets = sheets_file.settings;
            }
            if let Some(retry_config) = file_config.retry {
                retry = retry_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("PROPSYNC_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(id) = std::env::var("PROPSYNC_DOCUMENT_ID") {
            document_id = ConfigValue::new(Some(id), ConfigSource::Environment);
        }
        if let Ok(id) = std::env::var("PROPSYNC_CLIENT_ID") {
            oauth.client_id = Some(id);
        }
        if let Ok(secret) = std::env::var("PROPSYNC_CLIENT_SECRET") {
            oauth.client_secret = Some(secret);
        }

        Ok(Self {
            data_dir,
            document_id,
            config_file,
            oauth,
            sheets,
            retry,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/propsync/
    /// - macOS: ~/Library/Application Support/propsync/
    /// - Windows: %APPDATA%/propsync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("propsync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/propsync/
    /// - macOS: ~/Library/Application Support/propsync/
    /// - Windows: %APPDATA%/propsync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("propsync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    /// Path of the persisted session bundle
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.value.join("session.json")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
