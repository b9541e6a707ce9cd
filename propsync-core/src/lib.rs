//! Propsync Core Library
//!
//! Property-management records kept in a Local Store and reconciled with a
//! spreadsheet document through an OAuth-authorized API.

pub mod auth;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;

pub use auth::{
    AuthError, AuthProvider, GoogleOAuthClient, OAuthConfig, Session, SessionBundle,
    SessionManager, SessionState,
};
pub use models::{
    Payment, PaymentStatus, Property, PropertyStatus, RepairPriority, RepairRequest, RepairStatus,
    Tenant,
};
pub use remote::{GoogleSheetsClient, RemoteAdapter, RemoteError, RetryPolicy, SheetsApi};
pub use store::{CollectionCounts, LocalStore, Snapshot, SnapshotStorage, StorageError, StoreError};
pub use sync::{SyncEngine, SyncError, SyncMode, SyncSummary};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
