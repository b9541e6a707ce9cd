//! Authentication error types.

/// Errors that can occur while obtaining or refreshing an OAuth session.
///
/// None of these are retried automatically; the caller must restart the
/// authorization flow for everything except `Http`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// The authorization server rejected the authorization code.
    #[error("Authorization code rejected: {0}")]
    InvalidGrant(String),
    /// The session has expired and carries no refresh token.
    #[error("Session expired and no refresh token is available. Log in again.")]
    NoRefreshToken,
    /// The authorization server rejected the refresh token.
    #[error("Token refresh rejected: {0}. Log in again.")]
    RefreshFailed(String),
    /// No session is stored for this user.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),
    /// The authorization server could not be reached or answered unexpectedly.
    #[error("Authorization server error: {0}")]
    Http(String),
}

impl AuthError {
    /// Returns true if the user has to go through the consent flow again.
    pub fn requires_login(&self) -> bool {
        !matches!(self, AuthError::Http(_))
    }
}
