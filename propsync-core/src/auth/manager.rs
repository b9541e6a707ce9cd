//! Per-user session map with inline, serialized token refresh.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use super::error::AuthError;
use super::provider::AuthProvider;
use super::session::{Session, SessionBundle, SessionState};

#[derive(Debug)]
struct SlotEntry {
    session: Session,
    state: SessionState,
}

/// One user's session.
///
/// `refresh_lock` is held across the whole check-and-refresh so a single
/// user's session is never refreshed by two callers at once. `entry` is only
/// locked for short, non-async reads and writes.
#[derive(Debug)]
struct UserSlot {
    refresh_lock: tokio::sync::Mutex<()>,
    entry: Mutex<SlotEntry>,
}

impl UserSlot {
    fn new(session: Session) -> Self {
        Self {
            refresh_lock: tokio::sync::Mutex::new(()),
            entry: Mutex::new(SlotEntry {
                session,
                state: SessionState::Active,
            }),
        }
    }

    fn with_entry<R>(&self, f: impl FnOnce(&mut SlotEntry) -> R) -> R {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut entry)
    }
}

/// Holds every authenticated user's session, keyed by user id.
///
/// Sessions enter the map only through [`SessionManager::install`].
/// Different users refresh independently.
pub struct SessionManager<P> {
    provider: P,
    sessions: Mutex<HashMap<String, Arc<UserSlot>>>,
    /// Users with a sync cycle in flight.
    syncing: Mutex<HashSet<String>>,
}

impl<P> SessionManager<P> {
    /// Claims the single sync writer for `user_id`. Returns false if another
    /// cycle already holds it.
    pub fn begin_sync(&self, user_id: &str) -> bool {
        self.syncing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string())
    }

    pub fn end_sync(&self, user_id: &str) {
        self.syncing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
    }

    pub fn is_syncing(&self, user_id: &str) -> bool {
        self.syncing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(user_id)
    }
}

impl<P: AuthProvider> SessionManager<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            sessions: Mutex::new(HashMap::new()),
            syncing: Mutex::new(HashSet::new()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn slot(&self, user_id: &str) -> Option<Arc<UserSlot>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    /// Stores `session` as a fresh Active session, replacing any previous
    /// one. A Revoked session is only replaced when `over_revoked` is set.
    ///
    /// The slot is looked up or inserted under one map lock. After waiting
    /// out any refresh in flight, the slot is written only if it is still the
    /// one in the map; otherwise the lookup starts over.
    async fn install(&self, session: Session, over_revoked: bool) -> Result<(), AuthError> {
        let user_id = session.user_id.clone();
        loop {
            let slot = {
                let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
                match sessions.entry(user_id.clone()) {
                    Entry::Vacant(vacant) => {
                        vacant.insert(Arc::new(UserSlot::new(session)));
                        return Ok(());
                    }
                    Entry::Occupied(occupied) => occupied.get().clone(),
                }
            };

            // Wait out any refresh in flight so it cannot overwrite us.
            let _guard = slot.refresh_lock.lock().await;

            let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            let current = sessions
                .get(&user_id)
                .is_some_and(|installed| Arc::ptr_eq(installed, &slot));
            if !current {
                continue;
            }
            return slot.with_entry(|entry| {
                if entry.state == SessionState::Revoked && !over_revoked {
                    return Err(AuthError::RefreshFailed(
                        "session was revoked; log in again".to_string(),
                    ));
                }
                entry.session = session;
                entry.state = SessionState::Active;
                Ok(())
            });
        }
    }

    /// Exchanges an authorization code and stores the resulting session.
    ///
    /// The user id is the account's subject identifier (or its email when the
    /// subject is empty).
    pub async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        let grant = self.provider.exchange_code(code).await?;
        let info = self.provider.user_info(&grant.access_token).await?;

        let user_id = if info.sub.is_empty() {
            info.email.clone().unwrap_or_default()
        } else {
            info.sub.clone()
        };
        if user_id.is_empty() {
            return Err(AuthError::Http(
                "user-info response carried no account identifier".to_string(),
            ));
        }

        let session = Session::from_grant(user_id, grant, info.email, now);
        tracing::info!(user_id = %session.user_id, "session established");
        self.install(session.clone(), true).await?;
        Ok(session)
    }

    /// Resumes a session from a persisted bundle.
    ///
    /// Fails with `RefreshFailed` if the user's session is Revoked; only a
    /// new code exchange brings a revoked user back.
    pub async fn resume(
        &self,
        user_id: &str,
        bundle: SessionBundle,
    ) -> Result<Session, AuthError> {
        let session = Session::from_bundle(user_id, bundle);
        self.install(session.clone(), false).await?;
        tracing::debug!(user_id, expiry = %session.expiry, "session resumed");
        Ok(session)
    }

    /// Returns a session whose access token is valid for the next call.
    ///
    /// An expired session is refreshed inline, exactly once. A rejected
    /// refresh leaves the stored tokens untouched and marks the session
    /// Revoked; later calls fail without contacting the server.
    pub async fn get_valid_session(&self, user_id: &str) -> Result<Session, AuthError> {
        let slot = self
            .slot(user_id)
            .ok_or_else(|| AuthError::NotAuthenticated(user_id.to_string()))?;

        let _guard = slot.refresh_lock.lock().await;

        let (session, state) = slot.with_entry(|entry| (entry.session.clone(), entry.state));
        if state == SessionState::Revoked {
            return Err(AuthError::RefreshFailed(
                "session was revoked; log in again".to_string(),
            ));
        }

        let now = Utc::now();
        if !session.is_expired_at(now) {
            return Ok(session);
        }

        let refresh_token = session
            .refresh_token
            .clone()
            .ok_or(AuthError::NoRefreshToken)?;

        tracing::debug!(user_id, "access token expired, refreshing");
        slot.with_entry(|entry| entry.state = SessionState::Refreshing);

        match self.provider.refresh(&refresh_token).await {
            Ok(grant) => {
                let refreshed = slot.with_entry(|entry| {
                    entry.session.apply_refresh(grant, Utc::now());
                    entry.state = SessionState::Active;
                    entry.session.clone()
                });
                tracing::info!(user_id, expiry = %refreshed.expiry, "access token refreshed");
                Ok(refreshed)
            }
            Err(e @ AuthError::RefreshFailed(_)) => {
                tracing::warn!(user_id, error = %e, "refresh rejected, session revoked");
                slot.with_entry(|entry| entry.state = SessionState::Revoked);
                Err(e)
            }
            Err(e) => {
                slot.with_entry(|entry| entry.state = SessionState::Active);
                Err(e)
            }
        }
    }

    /// Drops the stored session (logout).
    pub fn invalidate(&self, user_id: &str) {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        if removed.is_some() {
            tracing::info!(user_id, "session invalidated");
        }
    }

    /// Current lifecycle state for `user_id`.
    pub fn state(&self, user_id: &str) -> SessionState {
        match self.slot(user_id) {
            Some(slot) => slot.with_entry(|entry| entry.state),
            None => SessionState::Unauthenticated,
        }
    }

    /// Stored session for `user_id`, without any validity check.
    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.slot(user_id)
            .map(|slot| slot.with_entry(|entry| entry.session.clone()))
    }

    /// Persistable bundle for `user_id`.
    pub fn export(&self, user_id: &str) -> Option<SessionBundle> {
        self.session(user_id).map(|session| session.to_bundle())
    }

    /// Ids of every user with a stored session.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_exchange_code_stores_session() {
        let manager = SessionManager::new(FakeProvider::default());

        let session = manager.exchange_code("good-code").await.unwrap();

        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.account_email.as_deref(), Some("owner@example.com"));
        assert_eq!(manager.state("user-1"), SessionState::Active);
        assert_eq!(manager.session("user-1").unwrap(), session);
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let manager = SessionManager::new(FakeProvider::default());

        let result = manager.exchange_code("bad-code").await;

        assert!(matches!(result, Err(AuthError::InvalidGrant(_))));
        assert_eq!(manager.state("user-1"), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_valid_session_is_not_refreshed() {
        let manager = SessionManager::new(FakeProvider::default());
        manager.resume("u1", live_bundle()).await.unwrap();

        let session = manager.get_valid_session("u1").await.unwrap();

        assert_eq!(session.access_token, "live");
        assert_eq!(manager.provider().refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_session_refreshes_exactly_once() {
        let manager = SessionManager::new(FakeProvider::default());
        manager.resume("u1", expired_bundle(Some("refresh-1"))).await.unwrap();

        let session = manager.get_valid_session("u1").await.unwrap();

        assert_eq!(manager.provider().refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.access_token, "access-refreshed-1");
        assert!(session.expiry > Utc::now());
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));

        // Second call reuses the refreshed token.
        manager.get_valid_session("u1").await.unwrap();
        assert_eq!(manager.provider().refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let manager = SessionManager::new(FakeProvider::default());
        manager.resume("u1", expired_bundle(None)).await.unwrap();

        let result = manager.get_valid_session("u1").await;

        assert_eq!(result, Err(AuthError::NoRefreshToken));
        assert_eq!(manager.provider().refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_refresh_revokes_and_keeps_tokens() {
        let provider = FakeProvider {
            reject_refresh: true,
            ..Default::default()
        };
        let manager = SessionManager::new(provider);
        let before = manager
            .resume("u1", expired_bundle(Some("refresh-1")))
            .await
            .unwrap();

        let result = manager.get_valid_session("u1").await;

        assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
        assert_eq!(manager.session("u1").unwrap(), before);
        assert_eq!(manager.state("u1"), SessionState::Revoked);

        // Revoked is terminal: no further refresh attempts.
        let again = manager.get_valid_session("u1").await;
        assert!(matches!(again, Err(AuthError::RefreshFailed(_))));
        assert_eq!(manager.provider().refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exchange_after_revoked_reactivates() {
        let provider = FakeProvider {
            reject_refresh: true,
            ..Default::default()
        };
        let manager = SessionManager::new(provider);
        manager.resume("user-1", expired_bundle(Some("r"))).await.unwrap();
        let _ = manager.get_valid_session("user-1").await;
        assert_eq!(manager.state("user-1"), SessionState::Revoked);

        manager.exchange_code("good-code").await.unwrap();

        assert_eq!(manager.state("user-1"), SessionState::Active);
        let session = manager.get_valid_session("user-1").await.unwrap();
        assert_eq!(session.access_token, "access-1");
    }

    #[tokio::test]
    async fn test_resume_does_not_reactivate_revoked_session() {
        let provider = FakeProvider {
            reject_refresh: true,
            ..Default::default()
        };
        let manager = SessionManager::new(provider);
        let revoked = manager
            .resume("u1", expired_bundle(Some("r")))
            .await
            .unwrap();
        let _ = manager.get_valid_session("u1").await;
        assert_eq!(manager.state("u1"), SessionState::Revoked);

        let result = manager.resume("u1", live_bundle()).await;

        assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
        assert_eq!(manager.state("u1"), SessionState::Revoked);
        assert_eq!(manager.session("u1").unwrap(), revoked);
    }

    #[tokio::test]
    async fn test_resume_after_invalidate_during_refresh_is_kept() {
        let provider = FakeProvider {
            refresh_delay_ms: 200,
            ..Default::default()
        };
        let manager = SessionManager::new(provider);
        manager
            .resume("u1", expired_bundle(Some("r")))
            .await
            .unwrap();

        // The refresh holds the slot; resume waits on it while logout drops
        // the slot from the map.
        let (_, resumed, _) = tokio::join!(
            manager.get_valid_session("u1"),
            async {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                manager.resume("u1", live_bundle()).await
            },
            async {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                manager.invalidate("u1");
            }
        );

        assert!(resumed.is_ok());
        assert_eq!(manager.state("u1"), SessionState::Active);
        let session = manager.get_valid_session("u1").await.unwrap();
        assert_eq!(session.access_token, "live");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_installs_leave_one_slot() {
        let manager = Arc::new(SessionManager::new(FakeProvider::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.resume("u1", live_bundle()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(manager.user_ids(), vec!["u1".to_string()]);
        assert_eq!(manager.state("u1"), SessionState::Active);
    }

    #[tokio::test]
    async fn test_unreachable_refresh_does_not_revoke() {
        let provider = FakeProvider {
            refresh_unreachable: true,
            ..Default::default()
        };
        let manager = SessionManager::new(provider);
        manager.resume("u1", expired_bundle(Some("r"))).await.unwrap();

        let result = manager.get_valid_session("u1").await;

        assert!(matches!(result, Err(AuthError::Http(_))));
        assert_eq!(manager.state("u1"), SessionState::Active);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_authenticated() {
        let manager = SessionManager::new(FakeProvider::default());
        let result = manager.get_valid_session("nobody").await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated(_))));
    }

    #[tokio::test]
    async fn test_invalidate_drops_session() {
        let manager = SessionManager::new(FakeProvider::default());
        manager.resume("u1", live_bundle()).await.unwrap();

        manager.invalidate("u1");

        assert_eq!(manager.state("u1"), SessionState::Unauthenticated);
        assert!(manager.export("u1").is_none());
        assert!(manager.get_valid_session("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_export_matches_resumed_bundle() {
        let manager = SessionManager::new(FakeProvider::default());
        let bundle = live_bundle();
        manager.resume("u1", bundle.clone()).await.unwrap();

        assert_eq!(manager.export("u1"), Some(bundle));
        assert_eq!(manager.user_ids(), vec!["u1".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_refresh() {
        let provider = FakeProvider {
            refresh_delay_ms: 50,
            ..Default::default()
        };
        let manager = Arc::new(SessionManager::new(provider));
        manager.resume("u1", expired_bundle(Some("r"))).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.get_valid_session("u1").await
            }));
        }
        for handle in handles {
            let session = handle.await.unwrap().unwrap();
            assert_eq!(session.access_token, "access-refreshed-1");
        }

        assert_eq!(manager.provider().refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_users_refresh_independently() {
        let provider = FakeProvider {
            refresh_delay_ms: 20,
            ..Default::default()
        };
        let manager = Arc::new(SessionManager::new(provider));
        manager.resume("u1", expired_bundle(Some("r"))).await.unwrap();
        manager.resume("u2", expired_bundle(Some("r"))).await.unwrap();

        let (a, b) = tokio::join!(
            manager.get_valid_session("u1"),
            manager.get_valid_session("u2")
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(manager.provider().refresh_calls.load(Ordering::SeqCst), 2);
    }
}
