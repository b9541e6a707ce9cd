//! Spreadsheet backend: the [`SheetsApi`] trait and its Google Sheets v4
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::RemoteError;

pub const GOOGLE_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

/// Range-level access to a spreadsheet document.
///
/// Every call carries the caller's bearer access token.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Titles of all sheets in the document.
    async fn sheet_titles(&self, token: &str, document_id: &str) -> Result<Vec<String>, RemoteError>;

    /// Creates all `titles` in a single batched request.
    async fn add_sheets(
        &self,
        token: &str,
        document_id: &str,
        titles: &[String],
    ) -> Result<(), RemoteError>;

    /// Reads every non-empty row in `range`. Rows are padded to the width of
    /// the first row.
    async fn read_range(
        &self,
        token: &str,
        document_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, RemoteError>;

    async fn clear_range(&self, token: &str, document_id: &str, range: &str)
        -> Result<(), RemoteError>;

    /// Writes `rows` starting at the top-left of `range`, overwriting.
    async fn write_range(
        &self,
        token: &str,
        document_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), RemoteError>;
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

/// Which call failed, for error mapping.
#[derive(Debug, Clone, Copy)]
enum Op {
    Schema,
    Read,
    Write,
}

impl Op {
    fn error(self, range: &str, reason: String) -> RemoteError {
        match self {
            Op::Schema => RemoteError::SchemaCreateFailed(reason),
            Op::Read => RemoteError::ReadFailed {
                range: range.to_string(),
                reason,
            },
            Op::Write => RemoteError::WriteFailed {
                range: range.to_string(),
                reason,
            },
        }
    }
}

/// Google Sheets v4 REST client.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    api_base: String,
    http: reqwest::Client,
}

impl GoogleSheetsClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn document_url(&self, document_id: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.api_base,
            urlencoding::encode(document_id)
        )
    }

    fn values_url(&self, document_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.document_url(document_id),
            urlencoding::encode(range)
        )
    }

    /// Sends `request` and maps failures for `op`.
    async fn send(
        &self,
        op: Op,
        range: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                RemoteError::Http(e.to_string())
            } else {
                op.error(range, e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(?op, range, %status, %body, "sheets request failed");
        Err(op.error(range, format!("HTTP {}", status)))
    }
}

/// Cell values come back as JSON strings, numbers or booleans.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The backend drops trailing empty cells; restore them up to the width of
/// the first row.
pub(crate) fn pad_rows(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    for row in rows.iter_mut().skip(1) {
        if row.len() < width {
            row.resize(width, String::new());
        }
    }
    rows
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn sheet_titles(&self, token: &str, document_id: &str) -> Result<Vec<String>, RemoteError> {
        let request = self
            .http
            .get(self.document_url(document_id))
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(token);
        let response = self.send(Op::Schema, "", request).await?;
        let meta: SpreadsheetMeta = response
            .json()
            .await
            .map_err(|e| RemoteError::SchemaCreateFailed(format!("invalid metadata: {}", e)))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn add_sheets(
        &self,
        token: &str,
        document_id: &str,
        titles: &[String],
    ) -> Result<(), RemoteError> {
        let requests: Vec<Value> = titles
            .iter()
            .map(|title| json!({ "addSheet": { "properties": { "title": title } } }))
            .collect();
        let request = self
            .http
            .post(format!("{}:batchUpdate", self.document_url(document_id)))
            .bearer_auth(token)
            .json(&json!({ "requests": requests }));
        self.send(Op::Schema, "", request).await?;
        Ok(())
    }

    async fn read_range(
        &self,
        token: &str,
        document_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, RemoteError> {
        let request = self
            .http
            .get(self.values_url(document_id, range))
            .query(&[("majorDimension", "ROWS")])
            .bearer_auth(token);
        let response = self.send(Op::Read, range, request).await?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| Op::Read.error(range, format!("invalid response: {}", e)))?;

        let rows = body
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        Ok(pad_rows(rows))
    }

    async fn clear_range(
        &self,
        token: &str,
        document_id: &str,
        range: &str,
    ) -> Result<(), RemoteError> {
        let request = self
            .http
            .post(format!("{}:clear", self.values_url(document_id, range)))
            .bearer_auth(token)
            .json(&json!({}));
        self.send(Op::Write, range, request).await?;
        Ok(())
    }

    async fn write_range(
        &self,
        token: &str,
        document_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), RemoteError> {
        let request = self
            .http
            .put(self.values_url(document_id, range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values: rows,
            });
        self.send(Op::Write, range, request).await?;
        Ok(())
    }
}
