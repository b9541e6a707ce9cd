use crate::auth::AuthError;
use crate::remote::RemoteError;

/// Errors returned by a sync cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Another sync is running for this engine.
    #[error("A sync is already in progress")]
    InProgress,
    /// No valid session could be obtained; nothing was touched.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The remote could not be read. The Local Store is unchanged.
    #[error("Sync aborted before any change: {0}")]
    AbortedBeforeMutation(#[source] RemoteError),
    /// The Local Store holds the merged result but the remote write failed.
    /// Running merge again is safe and completes the sync.
    #[error("Local changes saved but remote update failed: {0}. Run merge again.")]
    PartialFailureAfterLocalCommit(#[source] RemoteError),
    /// A push failed. The Local Store is unchanged.
    #[error("Push failed: {0}")]
    Remote(#[source] RemoteError),
}

impl SyncError {
    /// Returns true if the Local Store was not modified by the failed sync.
    pub fn local_untouched(&self) -> bool {
        !matches!(self, SyncError::PartialFailureAfterLocalCommit(_))
    }
}
