use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::provider::TokenGrant;

/// An authenticated user's OAuth tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expiry: DateTime<Utc>,
    pub account_email: Option<String>,
}

impl Session {
    /// Builds a session from a token grant issued at `now`.
    pub fn from_grant(
        user_id: impl Into<String>,
        grant: TokenGrant,
        account_email: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            id_token: grant.id_token,
            expiry: now + Duration::seconds(grant.expires_in),
            account_email,
        }
    }

    /// Rebuilds a session from a persisted bundle.
    pub fn from_bundle(user_id: impl Into<String>, bundle: SessionBundle) -> Self {
        let expiry = Utc
            .timestamp_millis_opt(bundle.expiry_epoch_millis)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            user_id: user_id.into(),
            access_token: bundle.access_token,
            refresh_token: bundle.refresh_token,
            id_token: bundle.id_token,
            expiry,
            account_email: bundle.account_email,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Applies a refresh grant. A grant without a refresh token keeps the
    /// current one.
    pub(crate) fn apply_refresh(&mut self, grant: TokenGrant, now: DateTime<Utc>) {
        self.access_token = grant.access_token;
        if grant.refresh_token.is_some() {
            self.refresh_token = grant.refresh_token;
        }
        if grant.id_token.is_some() {
            self.id_token = grant.id_token;
        }
        self.expiry = now + Duration::seconds(grant.expires_in);
    }

    pub fn to_bundle(&self) -> SessionBundle {
        SessionBundle {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            id_token: self.id_token.clone(),
            expiry_epoch_millis: self.expiry.timestamp_millis(),
            account_email: self.account_email.clone(),
        }
    }
}

/// Opaque, persistable form of a session.
///
/// Where this is kept (file, cookie, keychain) is up to the caller; the
/// manager only produces and accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBundle {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub expiry_epoch_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
}

/// Lifecycle state of a user's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session stored.
    Unauthenticated,
    /// Session stored; it may still need a refresh before use.
    Active,
    /// A refresh call is in flight.
    Refreshing,
    /// The authorization server rejected the refresh token.
    Revoked,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
            SessionState::Active => write!(f, "active"),
            SessionState::Refreshing => write!(f, "refreshing"),
            SessionState::Revoked => write!(f, "revoked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_in: i64, refresh: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: "access".to_string(),
            refresh_token: refresh.map(str::to_string),
            id_token: None,
            expires_in,
        }
    }

    #[test]
    fn test_from_grant_sets_expiry() {
        let now = Utc::now();
        let session = Session::from_grant("u1", grant(3600, Some("r")), None, now);
        assert_eq!(session.expiry, now + Duration::seconds(3600));
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_apply_refresh_keeps_refresh_token() {
        let now = Utc::now();
        let mut session = Session::from_grant("u1", grant(0, Some("r1")), None, now);
        let mut refreshed = grant(60, None);
        refreshed.access_token = "access2".to_string();

        session.apply_refresh(refreshed, now);

        assert_eq!(session.access_token, "access2");
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
        assert_eq!(session.expiry, now + Duration::seconds(60));
    }

    #[test]
    fn test_bundle_roundtrip_preserves_millis() {
        let now = Utc.timestamp_millis_opt(1_750_000_000_123).unwrap();
        let session = Session::from_grant(
            "u1",
            grant(10, Some("r")),
            Some("a@example.com".to_string()),
            now,
        );

        let bundle = session.to_bundle();
        assert_eq!(bundle.expiry_epoch_millis, 1_750_000_010_123);

        let json = serde_json::to_string(&bundle).unwrap();
        assert!(json.contains("expiryEpochMillis"));

        let restored = Session::from_bundle("u1", serde_json::from_str(&json).unwrap());
        assert_eq!(restored, session);
    }
}
