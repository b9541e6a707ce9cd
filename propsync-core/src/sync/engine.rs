use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::auth::{AuthProvider, Session, SessionManager};
use crate::remote::{RemoteAdapter, RemoteError, SheetsApi};
use crate::store::{CollectionCounts, LocalStore, Snapshot};

use super::error::SyncError;
use super::summary::{SyncMode, SyncSummary};

/// Holds the user's sync claim in the session manager until dropped, so every
/// engine for the same user sees the cycle in flight.
struct InFlightGuard<'a, P> {
    sessions: &'a SessionManager<P>,
    user_id: &'a str,
}

impl<'a, P> InFlightGuard<'a, P> {
    fn acquire(sessions: &'a SessionManager<P>, user_id: &'a str) -> Result<Self, SyncError> {
        if !sessions.begin_sync(user_id) {
            return Err(SyncError::InProgress);
        }
        Ok(Self { sessions, user_id })
    }
}

impl<P> Drop for InFlightGuard<'_, P> {
    fn drop(&mut self) {
        self.sessions.end_sync(self.user_id);
    }
}

/// Records of `remote` whose ids do not appear in `local`, in remote order.
/// Only the first remote record with a given id is kept, matching what the
/// store adopts.
fn remote_only<T: Clone>(local: &[T], remote: &[T], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    let mut known: HashSet<&str> = local.iter().map(&id_of).collect();
    remote
        .iter()
        .filter(|record| known.insert(id_of(*record)))
        .cloned()
        .collect()
}

/// Remote-only records for every collection.
fn unseen(local: &Snapshot, remote: &Snapshot) -> Snapshot {
    Snapshot {
        properties: remote_only(&local.properties, &remote.properties, |p| p.id.as_str()),
        tenants: remote_only(&local.tenants, &remote.tenants, |t| t.id.as_str()),
        payments: remote_only(&local.payments, &remote.payments, |p| p.id.as_str()),
        repair_requests: remote_only(&local.repair_requests, &remote.repair_requests, |r| {
            r.id.as_str()
        }),
    }
}

/// `local` followed by `extra`, per collection.
fn union(mut local: Snapshot, extra: &Snapshot) -> Snapshot {
    local.properties.extend(extra.properties.iter().cloned());
    local.tenants.extend(extra.tenants.iter().cloned());
    local.payments.extend(extra.payments.iter().cloned());
    local
        .repair_requests
        .extend(extra.repair_requests.iter().cloned());
    local
}

/// Reconciles one user's Local Store with one remote document.
///
/// Only one cycle per user runs at a time, across every engine sharing the
/// same [`SessionManager`]; a second request while one is in flight fails
/// with [`SyncError::InProgress`]. Local Store CRUD may continue during
/// a cycle.
pub struct SyncEngine<P, A> {
    store: LocalStore,
    sessions: Arc<SessionManager<P>>,
    remote: RemoteAdapter<A>,
    user_id: String,
    document_id: String,
    schema_ready: AtomicBool,
}

impl<P: AuthProvider, A: SheetsApi> SyncEngine<P, A> {
    pub fn new(
        store: LocalStore,
        sessions: Arc<SessionManager<P>>,
        remote: RemoteAdapter<A>,
        user_id: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sessions,
            remote,
            user_id: user_id.into(),
            document_id: document_id.into(),
            schema_ready: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn remote(&self) -> &RemoteAdapter<A> {
        &self.remote
    }

    pub fn sessions(&self) -> &Arc<SessionManager<P>> {
        &self.sessions
    }

    pub fn is_syncing(&self) -> bool {
        self.sessions.is_syncing(&self.user_id)
    }

    /// Runs one sync cycle in `mode`.
    pub async fn sync(&self, mode: SyncMode) -> Result<SyncSummary, SyncError> {
        match mode {
            SyncMode::Push => self.push().await,
            SyncMode::Pull => self.pull().await,
            SyncMode::Merge => self.merge().await,
        }
    }

    async fn session(&self) -> Result<Session, SyncError> {
        Ok(self.sessions.get_valid_session(&self.user_id).await?)
    }

    async fn ensure_schema(&self, session: &Session) -> Result<(), RemoteError> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.remote.ensure_schema(session, &self.document_id).await?;
        self.schema_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Overwrites the remote with the Local Store.
    pub async fn push(&self) -> Result<SyncSummary, SyncError> {
        let _guard = InFlightGuard::acquire(self.sessions.as_ref(), &self.user_id)?;
        let session = self.session().await?;
        self.ensure_schema(&session).await.map_err(SyncError::Remote)?;

        let local = self.store.snapshot();
        let written = self
            .remote
            .write_all(&session, &self.document_id, &local)
            .await
            .map_err(SyncError::Remote)?;

        tracing::info!(document_id = %self.document_id, %written, "push complete");
        Ok(SyncSummary {
            mode: SyncMode::Push,
            adopted: CollectionCounts::default(),
            written,
            local: local.counts(),
        })
    }

    /// Replaces the Local Store with the remote contents.
    ///
    /// Unsynced local edits are lost.
    pub async fn pull(&self) -> Result<SyncSummary, SyncError> {
        let _guard = InFlightGuard::acquire(self.sessions.as_ref(), &self.user_id)?;
        let session = self.session().await?;
        self.ensure_schema(&session)
            .await
            .map_err(SyncError::AbortedBeforeMutation)?;

        let remote = self
            .remote
            .read_all(&session, &self.document_id)
            .await
            .map_err(SyncError::AbortedBeforeMutation)?;
        let adopted = remote.counts();
        self.store.replace_all(remote);

        tracing::info!(document_id = %self.document_id, %adopted, "pull complete");
        Ok(SyncSummary {
            mode: SyncMode::Pull,
            adopted,
            written: CollectionCounts::default(),
            local: self.store.counts(),
        })
    }

    /// Two-way merge by id; the local value wins wherever both sides have a
    /// record.
    ///
    /// Remote-only records are adopted into the Local Store in one
    /// transition, then the union is written back. Running merge twice with
    /// no local edits in between changes nothing the second time.
    pub async fn merge(&self) -> Result<SyncSummary, SyncError> {
        let _guard = InFlightGuard::acquire(self.sessions.as_ref(), &self.user_id)?;
        let session = self.session().await?;
        self.ensure_schema(&session)
            .await
            .map_err(SyncError::AbortedBeforeMutation)?;

        let local = self.store.snapshot();
        let remote = self
            .remote
            .read_all(&session, &self.document_id)
            .await
            .map_err(SyncError::AbortedBeforeMutation)?;

        let incoming = unseen(&local, &remote);
        let adopted = self.store.adopt(incoming.clone());
        let merged = union(local, &incoming);
        tracing::debug!(%adopted, merged = %merged.counts(), "merged remote records");

        let written = self
            .remote
            .write_all(&session, &self.document_id, &merged)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "remote write failed after local commit");
                SyncError::PartialFailureAfterLocalCommit(e)
            })?;

        tracing::info!(document_id = %self.document_id, %adopted, %written, "merge complete");
        Ok(SyncSummary {
            mode: SyncMode::Merge,
            adopted,
            written,
            local: self.store.counts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{expired_bundle, live_bundle, FakeProvider};
    use crate::auth::{AuthError, SessionState};
    use crate::models::{Payment, Property, PropertyStatus, RepairRequest, Tenant};
    use crate::remote::testing::MemorySheets;
    use crate::remote::{encode_rows, RetryPolicy, SheetRecord};
    use chrono::NaiveDate;
    use std::time::Duration;

    type Engine = SyncEngine<FakeProvider, MemorySheets>;

    async fn engine_with(store: LocalStore, sheets: MemorySheets) -> Engine {
        let sessions = Arc::new(SessionManager::new(FakeProvider::default()));
        sessions.resume("u1", live_bundle()).await.unwrap();
        let remote = RemoteAdapter::new(sheets).with_retry(RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        });
        SyncEngine::new(store, sessions, remote, "u1", "doc-1")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    fn p1() -> Property {
        Property::new("1 Main St", 1000.0)
            .with_id("P1")
            .with_status(PropertyStatus::Occupied)
    }

    fn remote_properties(engine: &Engine) -> Vec<Property> {
        let rows = engine.remote().api().rows(Property::SHEET);
        crate::remote::decode_rows::<Property>(&rows).0
    }

    #[tokio::test]
    async fn test_merge_pushes_local_to_empty_remote() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let engine = engine_with(store.clone(), MemorySheets::default()).await;

        let summary = engine.merge().await.unwrap();

        assert_eq!(remote_properties(&engine), vec![p1()]);
        assert_eq!(store.list_properties(), vec![p1()]);
        assert_eq!(summary.adopted.total(), 0);
        assert_eq!(summary.written.properties, 1);
    }

    #[tokio::test]
    async fn test_merge_adopts_remote_only_records() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        let p2 = Property::new("2 Oak Ave", 900.0).with_id("P2");
        sheets.set_rows(Property::SHEET, encode_rows(&[p2.clone()]));
        let engine = engine_with(store.clone(), sheets).await;

        let summary = engine.merge().await.unwrap();

        assert_eq!(store.list_properties(), vec![p1(), p2.clone()]);
        assert_eq!(remote_properties(&engine), vec![p1(), p2]);
        assert_eq!(summary.adopted.properties, 1);
    }

    #[tokio::test]
    async fn test_merge_local_wins_on_conflict() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let mut local = p1();
        local.rent = 1200.0;
        store.update_property(local.clone()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        sheets.set_rows(Property::SHEET, encode_rows(&[p1()]));
        let engine = engine_with(store.clone(), sheets).await;

        engine.merge().await.unwrap();

        assert_eq!(store.get_property("P1").unwrap().rent, 1200.0);
        assert_eq!(remote_properties(&engine)[0].rent, 1200.0);
    }

    #[tokio::test]
    async fn test_merge_is_a_fixed_point() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        store
            .add_payment(Payment::new("P1", 1000.0, date()).with_id("pay1").with_amount_paid(250.5))
            .unwrap();
        let sheets = MemorySheets::with_all_sheets();
        sheets.set_rows(
            Property::SHEET,
            encode_rows(&[Property::new("9 Elm", 700.0).with_id("P9")]),
        );
        let engine = engine_with(store.clone(), sheets).await;

        engine.merge().await.unwrap();
        let local_after_first = store.snapshot();
        let remote_after_first = engine.remote().api().sheets.lock().unwrap().clone();

        let second = engine.merge().await.unwrap();

        assert_eq!(store.snapshot(), local_after_first);
        assert_eq!(*engine.remote().api().sheets.lock().unwrap(), remote_after_first);
        assert_eq!(second.adopted.total(), 0);
    }

    #[tokio::test]
    async fn test_expired_session_refreshes_once_before_remote_calls() {
        let sessions = Arc::new(SessionManager::new(FakeProvider::default()));
        sessions.resume("u1", expired_bundle(Some("refresh-1"))).await.unwrap();
        let engine = SyncEngine::new(
            LocalStore::new(),
            Arc::clone(&sessions),
            RemoteAdapter::new(MemorySheets::default()),
            "u1",
            "doc-1",
        );

        engine.merge().await.unwrap();

        assert_eq!(sessions.provider().refresh_calls.load(Ordering::SeqCst), 1);
        let tokens = engine.remote().api().tokens.lock().unwrap().clone();
        assert!(!tokens.is_empty());
        assert!(tokens.iter().all(|t| t == "access-refreshed-1"));
    }

    #[tokio::test]
    async fn test_auth_failure_touches_nothing() {
        let provider = FakeProvider {
            reject_refresh: true,
            ..Default::default()
        };
        let sessions = Arc::new(SessionManager::new(provider));
        sessions.resume("u1", expired_bundle(Some("r"))).await.unwrap();
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let engine = SyncEngine::new(
            store.clone(),
            Arc::clone(&sessions),
            RemoteAdapter::new(MemorySheets::default()),
            "u1",
            "doc-1",
        );

        let result = engine.merge().await;

        assert!(matches!(result, Err(SyncError::Auth(AuthError::RefreshFailed(_)))));
        assert_eq!(sessions.state("u1"), SessionState::Revoked);
        assert!(engine.remote().api().tokens.lock().unwrap().is_empty());
        assert_eq!(store.list_properties(), vec![p1()]);
        assert!(!engine.is_syncing());
    }

    #[tokio::test]
    async fn test_read_failure_aborts_before_mutation() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        sheets.fail_reads.store(true, Ordering::SeqCst);
        let engine = engine_with(store.clone(), sheets).await;
        let before = store.snapshot();

        let result = engine.merge().await;

        assert!(matches!(result, Err(SyncError::AbortedBeforeMutation(_))));
        assert!(result.unwrap_err().local_untouched());
        assert_eq!(store.snapshot(), before);
        assert_eq!(engine.remote().api().write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_failure_after_commit_then_recovers() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        let p2 = Property::new("2 Oak Ave", 900.0).with_id("P2");
        sheets.set_rows(Property::SHEET, encode_rows(&[p2.clone()]));
        sheets.fail_writes.store(true, Ordering::SeqCst);
        let engine = engine_with(store.clone(), sheets).await;

        let result = engine.merge().await;

        assert!(matches!(
            result,
            Err(SyncError::PartialFailureAfterLocalCommit(RemoteError::WriteFailed { .. }))
        ));
        assert_eq!(store.list_properties(), vec![p1(), p2.clone()]);

        engine.remote().api().fail_writes.store(false, Ordering::SeqCst);
        engine.remote().api().set_rows(Property::SHEET, encode_rows(&[p2.clone()]));
        let summary = engine.merge().await.unwrap();

        assert_eq!(summary.adopted.total(), 0);
        assert_eq!(remote_properties(&engine), vec![p1(), p2]);
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_rejected() {
        let engine = engine_with(LocalStore::new(), MemorySheets::default()).await;
        let _held = InFlightGuard::acquire(engine.sessions.as_ref(), &engine.user_id).unwrap();

        assert_eq!(engine.merge().await, Err(SyncError::InProgress));
        assert_eq!(engine.push().await, Err(SyncError::InProgress));
        assert_eq!(engine.pull().await, Err(SyncError::InProgress));
    }

    #[tokio::test]
    async fn test_second_engine_for_same_user_is_rejected() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sessions = Arc::new(SessionManager::new(FakeProvider::default()));
        sessions.resume("u1", live_bundle()).await.unwrap();

        // The first engine backs off on a 429, leaving its cycle in flight.
        let slow = MemorySheets::with_all_sheets();
        slow.rate_limits.store(1, Ordering::SeqCst);
        let first = SyncEngine::new(
            store.clone(),
            Arc::clone(&sessions),
            RemoteAdapter::new(slow).with_retry(RetryPolicy {
                max_retries: 2,
                initial_backoff: Duration::from_millis(20),
                max_backoff: Duration::from_millis(20),
            }),
            "u1",
            "doc-1",
        );
        let second = SyncEngine::new(
            store.clone(),
            Arc::clone(&sessions),
            RemoteAdapter::new(MemorySheets::with_all_sheets()),
            "u1",
            "doc-1",
        );

        let (a, b) = tokio::join!(first.merge(), second.merge());

        assert!(a.is_ok());
        assert_eq!(b, Err(SyncError::InProgress));
        assert!(second.remote().api().tokens.lock().unwrap().is_empty());
        assert!(!first.is_syncing());
        assert!(!second.is_syncing());
        assert!(second.merge().await.is_ok());
    }

    #[tokio::test]
    async fn test_other_user_syncs_while_one_is_in_flight() {
        let sessions = Arc::new(SessionManager::new(FakeProvider::default()));
        sessions.resume("u1", live_bundle()).await.unwrap();
        sessions.resume("u2", live_bundle()).await.unwrap();
        assert!(sessions.begin_sync("u1"));

        let engine = SyncEngine::new(
            LocalStore::new(),
            Arc::clone(&sessions),
            RemoteAdapter::new(MemorySheets::with_all_sheets()),
            "u2",
            "doc-2",
        );

        assert!(engine.merge().await.is_ok());
        assert!(sessions.is_syncing("u1"));
        sessions.end_sync("u1");
        assert!(!sessions.is_syncing("u1"));
    }

    #[tokio::test]
    async fn test_duplicate_remote_ids_adopt_first_and_settle() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        let first = Property::new("first", 900.0).with_id("P2");
        let second = Property::new("second", 950.0).with_id("P2");
        sheets.set_rows(Property::SHEET, encode_rows(&[first.clone(), second]));
        let engine = engine_with(store.clone(), sheets).await;

        let summary = engine.merge().await.unwrap();

        assert_eq!(store.list_properties(), vec![p1(), first.clone()]);
        assert_eq!(remote_properties(&engine), vec![p1(), first]);
        assert_eq!(summary.adopted.properties, 1);
        assert_eq!(summary.written.properties, 2);

        let rows_after_first = engine.remote().api().rows(Property::SHEET);
        let local_after_first = store.snapshot();
        let again = engine.merge().await.unwrap();

        assert_eq!(again.adopted.total(), 0);
        assert_eq!(engine.remote().api().rows(Property::SHEET), rows_after_first);
        assert_eq!(store.snapshot(), local_after_first);
    }

    #[tokio::test]
    async fn test_guard_released_after_failure() {
        let sheets = MemorySheets::default();
        sheets.fail_reads.store(true, Ordering::SeqCst);
        let engine = engine_with(LocalStore::new(), sheets).await;

        assert!(engine.merge().await.is_err());
        assert!(!engine.is_syncing());

        engine.remote().api().fail_reads.store(false, Ordering::SeqCst);
        assert!(engine.merge().await.is_ok());
    }

    #[tokio::test]
    async fn test_push_overwrites_remote() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        sheets.set_rows(
            Property::SHEET,
            encode_rows(&[Property::new("Gone", 1.0).with_id("OLD")]),
        );
        let engine = engine_with(store.clone(), sheets).await;

        let summary = engine.sync(SyncMode::Push).await.unwrap();

        assert_eq!(remote_properties(&engine), vec![p1()]);
        assert_eq!(summary.mode, SyncMode::Push);
        assert_eq!(summary.written.properties, 1);
        assert_eq!(engine.remote().api().read_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_failure_is_remote_error() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        sheets.fail_writes.store(true, Ordering::SeqCst);
        let engine = engine_with(store.clone(), sheets).await;

        let result = engine.push().await;

        assert!(matches!(result, Err(SyncError::Remote(_))));
        assert_eq!(store.list_properties(), vec![p1()]);
    }

    #[tokio::test]
    async fn test_pull_replaces_local() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let sheets = MemorySheets::with_all_sheets();
        let p2 = Property::new("2 Oak Ave", 900.0).with_id("P2");
        let t = Tenant::new("P2", "Bo", date(), date(), 900.0).with_id("T1");
        let r = RepairRequest::new("T1", "P2", "Door", date()).with_id("R1");
        sheets.set_rows(Property::SHEET, encode_rows(&[p2.clone()]));
        sheets.set_rows(Tenant::SHEET, encode_rows(&[t.clone()]));
        sheets.set_rows(RepairRequest::SHEET, encode_rows(&[r.clone()]));
        let engine = engine_with(store.clone(), sheets).await;

        let summary = engine.sync(SyncMode::Pull).await.unwrap();

        assert_eq!(store.list_properties(), vec![p2]);
        assert_eq!(store.list_tenants(), vec![t]);
        assert_eq!(store.list_repair_requests(), vec![r]);
        assert_eq!(summary.local.properties, 1);
        assert_eq!(engine.remote().api().write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schema_checked_once_per_engine() {
        let engine = engine_with(LocalStore::new(), MemorySheets::default()).await;

        engine.merge().await.unwrap();
        engine.push().await.unwrap();
        engine.pull().await.unwrap();

        assert_eq!(engine.remote().api().add_sheets_calls.load(Ordering::SeqCst), 1);
        let calls = engine.remote().api().tokens.lock().unwrap().len();
        // list + create + 4 reads + 8 writes (merge) + 8 writes (push) + 4 reads (pull)
        assert_eq!(calls, 26);
    }

    #[tokio::test]
    async fn test_schema_failure_aborts_merge() {
        let sheets = MemorySheets::default();
        sheets.fail_schema.store(true, Ordering::SeqCst);
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let engine = engine_with(store.clone(), sheets).await;

        let result = engine.merge().await;

        assert!(matches!(
            result,
            Err(SyncError::AbortedBeforeMutation(RemoteError::SchemaCreateFailed(_)))
        ));
        assert_eq!(store.list_properties(), vec![p1()]);
    }

    #[tokio::test]
    async fn test_rate_limited_merge_succeeds_after_retries() {
        let sheets = MemorySheets::with_all_sheets();
        sheets.rate_limits.store(2, Ordering::SeqCst);
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let engine = engine_with(store, sheets).await;

        engine.merge().await.unwrap();

        assert_eq!(remote_properties(&engine), vec![p1()]);
    }

    #[tokio::test]
    async fn test_local_edit_during_cycle_survives_adoption() {
        let store = LocalStore::new();
        store.add_property(p1()).unwrap();
        let local = store.snapshot();

        // Remote carries P2; locally P2 was created after the snapshot.
        let remote_p2 = Property::new("remote", 1.0).with_id("P2");
        let local_p2 = Property::new("local", 2.0).with_id("P2");
        store.add_property(local_p2.clone()).unwrap();
        let remote = Snapshot {
            properties: vec![remote_p2],
            ..Default::default()
        };

        let incoming = unseen(&local, &remote);
        let adopted = store.adopt(incoming);

        assert_eq!(adopted.properties, 0);
        assert_eq!(store.get_property("P2").unwrap(), local_p2);
    }

    #[test]
    fn test_unseen_keeps_remote_order() {
        let local = Snapshot {
            properties: vec![p1()],
            ..Default::default()
        };
        let remote = Snapshot {
            properties: vec![
                Property::new("c", 1.0).with_id("C"),
                p1(),
                Property::new("a", 1.0).with_id("A"),
            ],
            ..Default::default()
        };

        let ids: Vec<_> = unseen(&local, &remote)
            .properties
            .into_iter()
            .map(|p| p.id)
            .collect();

        assert_eq!(ids, vec!["C", "A"]);
    }
}
