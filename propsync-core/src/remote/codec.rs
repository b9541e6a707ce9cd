//! Row encoding for the four sheets.
//!
//! Every cell is a plain string. Numbers use Rust's shortest round-trip
//! formatting, dates are `YYYY-MM-DD`, and an absent optional is an empty
//! cell.

use chrono::NaiveDate;

use crate::models::{Payment, Property, RepairRequest, Tenant};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a row could not be decoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("expected {expected} columns, found {found}")]
    Width { expected: usize, found: usize },
    #[error("column '{column}' has invalid value '{value}'")]
    Field { column: &'static str, value: String },
}

/// A domain record stored as one row of a named sheet.
pub trait SheetRecord: Sized {
    /// Sheet title in the remote document.
    const SHEET: &'static str;
    /// Header row, in column order.
    const HEADERS: &'static [&'static str];

    fn to_row(&self) -> Vec<String>;

    /// Decodes a row that has exactly `HEADERS.len()` cells.
    fn from_cells(cells: &[String]) -> Result<Self, RowError>;

    /// A1 range covering every column of the sheet.
    fn range() -> String {
        format!("{}!A:{}", Self::SHEET, column_letter(Self::HEADERS.len()))
    }

    fn header_row() -> Vec<String> {
        Self::HEADERS.iter().map(|h| h.to_string()).collect()
    }

    fn from_row(row: &[String]) -> Result<Self, RowError> {
        if row.len() != Self::HEADERS.len() {
            return Err(RowError::Width {
                expected: Self::HEADERS.len(),
                found: row.len(),
            });
        }
        Self::from_cells(row)
    }
}

/// Spreadsheet column letter for a 1-based index (1 = A, 27 = AA).
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Decodes every data row of a sheet, skipping malformed ones.
///
/// `rows` includes the header row when present. Returns the decoded records
/// and the number of rows skipped.
pub fn decode_rows<T: SheetRecord>(rows: &[Vec<String>]) -> (Vec<T>, usize) {
    let Some((header, data)) = rows.split_first() else {
        return (Vec::new(), 0);
    };
    if header.as_slice() != T::header_row().as_slice() {
        tracing::warn!(sheet = T::SHEET, ?header, "unexpected header row, decoding by position");
    }

    let mut records = Vec::with_capacity(data.len());
    let mut skipped = 0;
    for (index, row) in data.iter().enumerate() {
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        match T::from_row(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                // +2: one for the header, one for 1-based numbering.
                tracing::warn!(sheet = T::SHEET, row = index + 2, error = %e, "skipping malformed row");
            }
        }
    }
    (records, skipped)
}

/// Header row plus one row per record.
pub fn encode_rows<T: SheetRecord>(records: &[T]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(T::header_row());
    rows.extend(records.iter().map(SheetRecord::to_row));
    rows
}

fn number(value: f64) -> String {
    value.to_string()
}

fn date(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn parse_number(column: &'static str, cell: &str) -> Result<f64, RowError> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid(column, cell))
}

fn parse_date(column: &'static str, cell: &str) -> Result<NaiveDate, RowError> {
    NaiveDate::parse_from_str(cell.trim(), DATE_FORMAT).map_err(|_| invalid(column, cell))
}

fn parse_optional_date(column: &'static str, cell: &str) -> Result<Option<NaiveDate>, RowError> {
    if cell.trim().is_empty() {
        Ok(None)
    } else {
        parse_date(column, cell).map(Some)
    }
}

fn parse_optional(cell: &str) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

fn parse_enum<T: std::str::FromStr>(column: &'static str, cell: &str) -> Result<T, RowError> {
    cell.parse::<T>().map_err(|_| invalid(column, cell))
}

fn require_id(column: &'static str, cell: &str) -> Result<String, RowError> {
    if cell.is_empty() {
        Err(invalid(column, cell))
    } else {
        Ok(cell.to_string())
    }
}

fn invalid(column: &'static str, cell: &str) -> RowError {
    RowError::Field {
        column,
        value: cell.to_string(),
    }
}

impl SheetRecord for Property {
    const SHEET: &'static str = "Properties";
    const HEADERS: &'static [&'static str] =
        &["id", "address", "city", "state", "zipcode", "rent", "status"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.address.clone(),
            self.city.clone(),
            self.state.clone(),
            self.zipcode.clone(),
            number(self.rent),
            self.status.as_str().to_string(),
        ]
    }

    fn from_cells(c: &[String]) -> Result<Self, RowError> {
        Ok(Property {
            id: require_id("id", &c[0])?,
            address: c[1].clone(),
            city: c[2].clone(),
            state: c[3].clone(),
            zipcode: c[4].clone(),
            rent: parse_number("rent", &c[5])?,
            status: parse_enum("status", &c[6])?,
        })
    }
}

impl SheetRecord for Tenant {
    const SHEET: &'static str = "Tenants";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "propertyId",
        "name",
        "email",
        "phone",
        "leaseStart",
        "leaseEnd",
        "rentAmount",
        "paymentMethod",
    ];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.property_id.clone(),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            date(self.lease_start),
            date(self.lease_end),
            number(self.rent_amount),
            self.payment_method.clone(),
        ]
    }

    fn from_cells(c: &[String]) -> Result<Self, RowError> {
        Ok(Tenant {
            id: require_id("id", &c[0])?,
            property_id: require_id("propertyId", &c[1])?,
            name: c[2].clone(),
            email: c[3].clone(),
            phone: c[4].clone(),
            lease_start: parse_date("leaseStart", &c[5])?,
            lease_end: parse_date("leaseEnd", &c[6])?,
            rent_amount: parse_number("rentAmount", &c[7])?,
            payment_method: c[8].clone(),
        })
    }
}

impl SheetRecord for Payment {
    const SHEET: &'static str = "Payments";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "propertyId",
        "tenantId",
        "amount",
        "amountPaid",
        "date",
        "status",
        "method",
        "rentMonth",
    ];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.property_id.clone(),
            optional(self.tenant_id.as_deref()),
            number(self.amount),
            number(self.amount_paid),
            date(self.date),
            self.status().as_str().to_string(),
            self.method.clone(),
            self.rent_month.clone(),
        ]
    }

    /// The status column is informational; status is recomputed from the
    /// amounts.
    fn from_cells(c: &[String]) -> Result<Self, RowError> {
        let amount = parse_number("amount", &c[3])?;
        let mut payment = Payment::new(
            require_id("propertyId", &c[1])?,
            amount,
            parse_date("date", &c[5])?,
        )
        .with_id(require_id("id", &c[0])?)
        .with_amount_paid(parse_number("amountPaid", &c[4])?)
        .with_method(c[7].clone())
        .with_rent_month(c[8].clone());
        payment.tenant_id = parse_optional(&c[2]);
        Ok(payment)
    }
}

impl SheetRecord for RepairRequest {
    const SHEET: &'static str = "RepairRequests";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "tenantId",
        "propertyId",
        "title",
        "description",
        "priority",
        "status",
        "dateSubmitted",
        "dateResolved",
        "category",
        "closeNotes",
    ];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.tenant_id.clone(),
            self.property_id.clone(),
            self.title.clone(),
            self.description.clone(),
            self.priority.as_str().to_string(),
            self.status.as_str().to_string(),
            date(self.date_submitted),
            self.date_resolved.map(date).unwrap_or_default(),
            self.category.clone(),
            optional(self.close_notes.as_deref()),
        ]
    }

    fn from_cells(c: &[String]) -> Result<Self, RowError> {
        Ok(RepairRequest {
            id: require_id("id", &c[0])?,
            tenant_id: require_id("tenantId", &c[1])?,
            property_id: require_id("propertyId", &c[2])?,
            title: c[3].clone(),
            description: c[4].clone(),
            priority: parse_enum("priority", &c[5])?,
            status: parse_enum("status", &c[6])?,
            date_submitted: parse_date("dateSubmitted", &c[7])?,
            date_resolved: parse_optional_date("dateResolved", &c[8])?,
            category: c[9].clone(),
            close_notes: parse_optional(&c[10]),
        })
    }
}
