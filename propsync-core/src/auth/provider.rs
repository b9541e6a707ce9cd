//! Authorization server access: code exchange, token refresh, user info.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::AuthError;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Scopes needed to read and write the spreadsheet and identify the account.
pub const DEFAULT_SCOPES: &[&str] = &[
    "openid",
    "email",
    "https://www.googleapis.com/auth/spreadsheets",
];

/// Tokens returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// Identity of the account that granted consent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The authorization server, as seen by the session manager.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchanges an authorization code for tokens.
    ///
    /// Returns `AuthError::InvalidGrant` if the server rejects the code.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError>;

    /// Obtains a fresh access token.
    ///
    /// Returns `AuthError::RefreshFailed` if the server rejects the token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;

    /// Looks up the account behind an access token.
    async fn user_info(&self, access_token: &str) -> Result<UserInfo, AuthError>;
}

/// OAuth client registration and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    pub timeout: Duration,
}

impl OAuthConfig {
    /// Google endpoints with the default scopes.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Error body returned by OAuth endpoints.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthErrorBody {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{} ({})", self.error, description),
            None => self.error.clone(),
        }
    }
}

/// Which token-endpoint call is being made, for error mapping.
#[derive(Debug, Clone, Copy)]
enum Grant {
    Code,
    Refresh,
}

/// [`AuthProvider`] backed by Google's OAuth 2.0 endpoints.
#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Builds the consent URL the user must visit.
    ///
    /// Requests offline access with a forced consent prompt so the token
    /// endpoint always returns a refresh token.
    pub fn authorization_url(&self, state: &str) -> String {
        let scope = self.config.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
        )
    }

    async fn token_request(
        &self,
        grant: Grant,
        params: &[(&str, &str)],
    ) -> Result<TokenGrant, AuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenGrant>()
                .await
                .map_err(|e| AuthError::Http(format!("invalid token response: {}", e)));
        }

        if status.is_client_error() {
            let reason = match response.json::<OAuthErrorBody>().await {
                Ok(body) => body.describe(),
                Err(_) => format!("HTTP {}", status),
            };
            tracing::warn!(?grant, %status, %reason, "token endpoint rejected request");
            return Err(match grant {
                Grant::Code => AuthError::InvalidGrant(reason),
                Grant::Refresh => AuthError::RefreshFailed(reason),
            });
        }

        Err(AuthError::Http(format!(
            "token endpoint returned HTTP {}",
            status
        )))
    }
}

#[async_trait]
impl AuthProvider for GoogleOAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        self.token_request(
            Grant::Code,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        self.token_request(
            Grant::Refresh,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ],
        )
        .await
    }

    async fn user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Http(format!(
                "user-info endpoint returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<UserInfo>()
            .await
            .map_err(|e| AuthError::Http(format!("invalid user-info response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleOAuthClient {
        GoogleOAuthClient::new(OAuthConfig::google(
            "client-123",
            "secret",
            "http://127.0.0.1:8765/callback",
        ))
        .unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let url = client().authorization_url("xyz");
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8765%2Fcallback"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("spreadsheets"));
    }

    #[test]
    fn test_token_grant_deserialize_without_refresh() {
        let grant: TokenGrant =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3599,"token_type":"Bearer"}"#)
                .unwrap();
        assert_eq!(grant.access_token, "a");
        assert!(grant.refresh_token.is_none());
        assert_eq!(grant.expires_in, 3599);
    }

    #[test]
    fn test_error_body_describe() {
        let body: OAuthErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        )
        .unwrap();
        assert_eq!(
            body.describe(),
            "invalid_grant (Token has been expired or revoked.)"
        );
    }
}
