mod payment;
mod property;
mod repair_request;
mod tenant;

pub use payment::{Payment, PaymentStatus};
pub use property::{Property, PropertyStatus};
pub use repair_request::{RepairPriority, RepairRequest, RepairStatus};
pub use tenant::Tenant;

use uuid::Uuid;

/// Generates a fresh opaque entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Error returned when a status or enum string cannot be parsed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
