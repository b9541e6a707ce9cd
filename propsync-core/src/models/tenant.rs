use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::new_id;

/// A tenant leasing one property.
///
/// `lease_renewal` is derived from `lease_end` and is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub property_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub lease_start: NaiveDate,
    pub lease_end: NaiveDate,
    pub rent_amount: f64,
    pub payment_method: String,
}

impl Tenant {
    pub fn new(
        property_id: impl Into<String>,
        name: impl Into<String>,
        lease_start: NaiveDate,
        lease_end: NaiveDate,
        rent_amount: f64,
    ) -> Self {
        Self {
            id: new_id(),
            property_id: property_id.into(),
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            lease_start,
            lease_end,
            rent_amount,
            payment_method: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_contact(mut self, email: impl Into<String>, phone: impl Into<String>) -> Self {
        self.email = email.into();
        self.phone = phone.into();
        self
    }

    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = method.into();
        self
    }

    /// Last day of the month before `lease_end`.
    pub fn lease_renewal(&self) -> Option<NaiveDate> {
        self.lease_end.with_day(1).and_then(|first| first.pred_opt())
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        if !self.email.is_empty() {
            writeln!(f, "Email: {}", self.email)?;
        }
        if !self.phone.is_empty() {
            writeln!(f, "Phone: {}", self.phone)?;
        }
        writeln!(f, "Lease: {} to {}", self.lease_start, self.lease_end)?;
        if let Some(renewal) = self.lease_renewal() {
            writeln!(f, "Renewal due: {}", renewal)?;
        }
        writeln!(f, "Rent: {:.2}", self.rent_amount)?;
        writeln!(f, "Property: {}", self.property_id)?;
        write!(f, "ID: {}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tenant_new() {
        let tenant = Tenant::new("p1", "Ada", date(2025, 1, 1), date(2025, 12, 31), 950.0);
        assert_eq!(tenant.property_id, "p1");
        assert_eq!(tenant.name, "Ada");
        assert!(tenant.email.is_empty());
    }

    #[test]
    fn test_lease_renewal_mid_month() {
        let tenant = Tenant::new("p1", "Ada", date(2025, 1, 1), date(2025, 6, 15), 950.0);
        assert_eq!(tenant.lease_renewal(), Some(date(2025, 5, 31)));
    }

    #[test]
    fn test_lease_renewal_crosses_year() {
        let tenant = Tenant::new("p1", "Ada", date(2024, 1, 1), date(2025, 1, 31), 950.0);
        assert_eq!(tenant.lease_renewal(), Some(date(2024, 12, 31)));
    }

    #[test]
    fn test_lease_renewal_leap_february() {
        let tenant = Tenant::new("p1", "Ada", date(2023, 3, 1), date(2024, 3, 1), 950.0);
        assert_eq!(tenant.lease_renewal(), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_lease_renewal_not_serialized() {
        let tenant = Tenant::new("p1", "Ada", date(2025, 1, 1), date(2025, 6, 15), 950.0);
        let json = serde_json::to_string(&tenant).unwrap();
        assert!(!json.contains("lease_renewal"));
    }
}
