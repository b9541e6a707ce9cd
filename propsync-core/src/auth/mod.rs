//! OAuth session management.

mod error;
mod manager;
mod provider;
mod session;

pub use error::AuthError;
pub use manager::SessionManager;
pub use provider::{
    AuthProvider, GoogleOAuthClient, OAuthConfig, TokenGrant, UserInfo, DEFAULT_SCOPES,
    GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL,
};
pub use session::{Session, SessionBundle, SessionState};

#[cfg(test)]
pub(crate) use manager::testing;
