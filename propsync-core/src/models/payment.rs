use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{new_id, ParseEnumError};

/// Payment status, derived from the amount due and the amount paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    PartiallyPaid,
    NotPaidYet,
}

impl PaymentStatus {
    /// Derives the status from `(amount, amount_paid)`.
    ///
    /// Non-positive payments are `NotPaidYet`; anything paid against nothing
    /// due counts as `Paid`.
    pub fn derive(amount: f64, amount_paid: f64) -> Self {
        if amount_paid <= 0.0 {
            PaymentStatus::NotPaidYet
        } else if amount_paid < amount {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Paid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::PartiallyPaid => "PartiallyPaid",
            PaymentStatus::NotPaidYet => "NotPaidYet",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-', '_'], "").as_str() {
            "paid" => Ok(PaymentStatus::Paid),
            "partiallypaid" => Ok(PaymentStatus::PartiallyPaid),
            "notpaidyet" => Ok(PaymentStatus::NotPaidYet),
            _ => Err(ParseEnumError::new("payment status", s)),
        }
    }
}

/// A rent payment against a property.
///
/// `status` is private: it is recomputed by [`Payment::refresh_status`] on
/// every mutation and can only be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub property_id: String,
    pub tenant_id: Option<String>,
    pub amount: f64,
    pub amount_paid: f64,
    pub date: NaiveDate,
    status: PaymentStatus,
    pub method: String,
    pub rent_month: String,
}

impl Payment {
    pub fn new(property_id: impl Into<String>, amount: f64, date: NaiveDate) -> Self {
        Self {
            id: new_id(),
            property_id: property_id.into(),
            tenant_id: None,
            amount,
            amount_paid: 0.0,
            date,
            status: PaymentStatus::derive(amount, 0.0),
            method: String::new(),
            rent_month: date.format("%Y-%m").to_string(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_amount_paid(mut self, amount_paid: f64) -> Self {
        self.amount_paid = amount_paid;
        self.refresh_status();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_rent_month(mut self, rent_month: impl Into<String>) -> Self {
        self.rent_month = rent_month.into();
        self
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Recomputes `status` from the current amounts.
    pub fn refresh_status(&mut self) {
        self.status = PaymentStatus::derive(self.amount, self.amount_paid);
    }

    pub fn balance(&self) -> f64 {
        (self.amount - self.amount_paid).max(0.0)
    }
}

impl fmt::Display for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Payment for {} ({})", self.rent_month, self.date)?;
        writeln!(f, "Amount: {:.2}", self.amount)?;
        writeln!(f, "Paid: {:.2}", self.amount_paid)?;
        writeln!(f, "Status: {}", self.status)?;
        if !self.method.is_empty() {
            writeln!(f, "Method: {}", self.method)?;
        }
        writeln!(f, "Property: {}", self.property_id)?;
        if let Some(tenant_id) = &self.tenant_id {
            writeln!(f, "Tenant: {}", tenant_id)?;
        }
        write!(f, "ID: {}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[test]
    fn test_status_paid() {
        assert_eq!(PaymentStatus::derive(1000.0, 1000.0), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::derive(1000.0, 1200.0), PaymentStatus::Paid);
    }

    #[test]
    fn test_status_partially_paid() {
        assert_eq!(
            PaymentStatus::derive(1000.0, 0.01),
            PaymentStatus::PartiallyPaid
        );
        assert_eq!(
            PaymentStatus::derive(1000.0, 999.0),
            PaymentStatus::PartiallyPaid
        );
    }

    #[test]
    fn test_status_not_paid_yet() {
        assert_eq!(PaymentStatus::derive(1000.0, 0.0), PaymentStatus::NotPaidYet);
        assert_eq!(PaymentStatus::derive(0.0, 0.0), PaymentStatus::NotPaidYet);
    }

    #[test]
    fn test_new_payment_is_not_paid_yet() {
        let payment = Payment::new("p1", 1000.0, date());
        assert_eq!(payment.status(), PaymentStatus::NotPaidYet);
        assert_eq!(payment.rent_month, "2025-03");
    }

    #[test]
    fn test_status_follows_amount_paid() {
        let mut payment = Payment::new("p1", 1000.0, date()).with_amount_paid(400.0);
        assert_eq!(payment.status(), PaymentStatus::PartiallyPaid);
        assert_eq!(payment.balance(), 600.0);

        payment.amount_paid = 1000.0;
        payment.refresh_status();
        assert_eq!(payment.status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "partially paid".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::PartiallyPaid
        );
        assert_eq!(
            "NotPaidYet".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::NotPaidYet
        );
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }
}
