//! Remote Adapter: maps the four collections onto sheets of a remote
//! spreadsheet document.

mod codec;
mod error;
mod retry;
mod sheets;

pub use codec::{column_letter, decode_rows, encode_rows, RowError, SheetRecord};
pub use error::RemoteError;
pub use retry::RetryPolicy;
pub use sheets::{GoogleSheetsClient, SheetsApi, GOOGLE_SHEETS_API_BASE};

use crate::auth::Session;
use crate::models::{Payment, Property, RepairRequest, Tenant};
use crate::store::{CollectionCounts, Snapshot};

/// Titles of the sheets the adapter reads and writes.
pub const SHEET_TITLES: [&str; 4] = [
    Property::SHEET,
    Tenant::SHEET,
    Payment::SHEET,
    RepairRequest::SHEET,
];

/// Translates collections to and from sheet rows over a [`SheetsApi`].
///
/// Rate-limited calls are retried according to the adapter's
/// [`RetryPolicy`]; every other error is returned as-is.
pub struct RemoteAdapter<A> {
    api: A,
    retry: RetryPolicy,
}

impl<A: SheetsApi> RemoteAdapter<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Creates whichever of the four sheets are missing, in one batch.
    ///
    /// Returns the titles that were created.
    pub async fn ensure_schema(
        &self,
        session: &Session,
        document_id: &str,
    ) -> Result<Vec<String>, RemoteError> {
        let token = session.access_token.as_str();
        let existing = self
            .retry
            .run("list sheets", || self.api.sheet_titles(token, document_id))
            .await?;

        let missing: Vec<String> = SHEET_TITLES
            .iter()
            .filter(|title| !existing.iter().any(|e| e == *title))
            .map(|title| title.to_string())
            .collect();

        if missing.is_empty() {
            tracing::debug!(document_id, "all sheets present");
            return Ok(missing);
        }

        self.retry
            .run("create sheets", || {
                self.api.add_sheets(token, document_id, &missing)
            })
            .await?;
        tracing::info!(document_id, created = ?missing, "created missing sheets");
        Ok(missing)
    }

    async fn read_sheet<T: SheetRecord>(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Vec<T>, RemoteError> {
        let range = T::range();
        let rows = self
            .retry
            .run(&range, || self.api.read_range(token, document_id, &range))
            .await?;
        let (records, skipped) = decode_rows::<T>(&rows);
        tracing::debug!(sheet = T::SHEET, records = records.len(), skipped, "read sheet");
        Ok(records)
    }

    /// Reads all four collections.
    pub async fn read_all(
        &self,
        session: &Session,
        document_id: &str,
    ) -> Result<Snapshot, RemoteError> {
        let token = session.access_token.as_str();
        Ok(Snapshot {
            properties: self.read_sheet(token, document_id).await?,
            tenants: self.read_sheet(token, document_id).await?,
            payments: self.read_sheet(token, document_id).await?,
            repair_requests: self.read_sheet(token, document_id).await?,
        })
    }

    async fn write_sheet<T: SheetRecord>(
        &self,
        token: &str,
        document_id: &str,
        records: &[T],
    ) -> Result<usize, RemoteError> {
        let range = T::range();
        let rows = encode_rows(records);
        self.retry
            .run(&range, || self.api.clear_range(token, document_id, &range))
            .await?;
        self.retry
            .run(&range, || self.api.write_range(token, document_id, &range, &rows))
            .await?;
        tracing::debug!(sheet = T::SHEET, records = records.len(), "wrote sheet");
        Ok(records.len())
    }

    /// Overwrites every sheet so it mirrors `snapshot` exactly.
    ///
    /// On error the sheet being written is indeterminate; retry the whole
    /// call.
    pub async fn write_all(
        &self,
        session: &Session,
        document_id: &str,
        snapshot: &Snapshot,
    ) -> Result<CollectionCounts, RemoteError> {
        let token = session.access_token.as_str();
        Ok(CollectionCounts {
            properties: self
                .write_sheet(token, document_id, &snapshot.properties)
                .await?,
            tenants: self.write_sheet(token, document_id, &snapshot.tenants).await?,
            payments: self.write_sheet(token, document_id, &snapshot.payments).await?,
            repair_requests: self
                .write_sheet(token, document_id, &snapshot.repair_requests)
                .await?,
        })
    }
}
