//! Sync Engine: push, pull and local-wins merge between the Local Store and
//! the remote document.

mod engine;
mod error;
mod summary;

pub use engine::SyncEngine;
pub use error::SyncError;
pub use summary::{SyncMode, SyncSummary};
