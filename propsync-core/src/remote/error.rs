/// Errors raised by the Remote Adapter and the spreadsheet backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// Missing sheets could not be created.
    #[error("Failed to create sheets: {0}")]
    SchemaCreateFailed(String),
    #[error("Failed to read {range}: {reason}")]
    ReadFailed { range: String, reason: String },
    /// The sheet's remote state is indeterminate after this error.
    #[error("Failed to write {range}: {reason}")]
    WriteFailed { range: String, reason: String },
    /// The backend answered HTTP 429.
    #[error("Rate limited by the spreadsheet backend")]
    RateLimited,
    /// The backend could not be reached.
    #[error("Spreadsheet backend unreachable: {0}")]
    Http(String),
}

impl RemoteError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::RateLimited)
    }
}
