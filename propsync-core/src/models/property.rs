use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{new_id, ParseEnumError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    #[default]
    Vacant,
    Occupied,
    Maintenance,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Vacant => "vacant",
            PropertyStatus::Occupied => "occupied",
            PropertyStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PropertyStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vacant" => Ok(PropertyStatus::Vacant),
            "occupied" => Ok(PropertyStatus::Occupied),
            "maintenance" => Ok(PropertyStatus::Maintenance),
            _ => Err(ParseEnumError::new("property status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub rent: f64,
    pub status: PropertyStatus,
}

impl Property {
    pub fn new(address: impl Into<String>, rent: f64) -> Self {
        Self {
            id: new_id(),
            address: address.into(),
            city: String::new(),
            state: String::new(),
            zipcode: String::new(),
            rent,
            status: PropertyStatus::Vacant,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_location(
        mut self,
        city: impl Into<String>,
        state: impl Into<String>,
        zipcode: impl Into<String>,
    ) -> Self {
        self.city = city.into();
        self.state = state.into();
        self.zipcode = zipcode.into();
        self
    }

    pub fn with_status(mut self, status: PropertyStatus) -> Self {
        self.status = status;
        self
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.address)?;
        writeln!(f, "{}", "=".repeat(self.address.len()))?;
        if !self.city.is_empty() {
            writeln!(f, "{}, {} {}", self.city, self.state, self.zipcode)?;
        }
        writeln!(f, "Rent: {:.2}", self.rent)?;
        writeln!(f, "Status: {}", self.status)?;
        write!(f, "ID: {}", self.id)
    }
}
