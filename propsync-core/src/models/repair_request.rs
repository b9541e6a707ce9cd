use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{new_id, ParseEnumError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStatus {
    #[default]
    Submitted,
    InProgress,
    Completed,
}

impl RepairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::Submitted => "submitted",
            RepairStatus::InProgress => "in-progress",
            RepairStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RepairStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "submitted" => Ok(RepairStatus::Submitted),
            "in-progress" => Ok(RepairStatus::InProgress),
            "completed" => Ok(RepairStatus::Completed),
            _ => Err(ParseEnumError::new("repair status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepairPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl RepairPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairPriority::Low => "low",
            RepairPriority::Medium => "medium",
            RepairPriority::High => "high",
            RepairPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for RepairPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RepairPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RepairPriority::Low),
            "medium" => Ok(RepairPriority::Medium),
            "high" => Ok(RepairPriority::High),
            "urgent" => Ok(RepairPriority::Urgent),
            _ => Err(ParseEnumError::new("repair priority", s)),
        }
    }
}

/// A maintenance request raised by a tenant for a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairRequest {
    pub id: String,
    pub tenant_id: String,
    pub property_id: String,
    pub title: String,
    pub description: String,
    pub priority: RepairPriority,
    pub status: RepairStatus,
    pub date_submitted: NaiveDate,
    pub date_resolved: Option<NaiveDate>,
    pub category: String,
    pub close_notes: Option<String>,
}

impl RepairRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        property_id: impl Into<String>,
        title: impl Into<String>,
        date_submitted: NaiveDate,
    ) -> Self {
        Self {
            id: new_id(),
            tenant_id: tenant_id.into(),
            property_id: property_id.into(),
            title: title.into(),
            description: String::new(),
            priority: RepairPriority::default(),
            status: RepairStatus::Submitted,
            date_submitted,
            date_resolved: None,
            category: String::new(),
            close_notes: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: RepairPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Marks the request completed on `date`, with optional closing notes.
    pub fn resolve(mut self, date: NaiveDate, notes: Option<String>) -> Self {
        self.status = RepairStatus::Completed;
        self.date_resolved = Some(date);
        self.close_notes = notes;
        self
    }
}

impl fmt::Display for RepairRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.title, self.priority)?;
        writeln!(f, "{}", "=".repeat(self.title.len()))?;
        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
        }
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Submitted: {}", self.date_submitted)?;
        if let Some(resolved) = self.date_resolved {
            writeln!(f, "Resolved: {}", resolved)?;
        }
        if let Some(notes) = &self.close_notes {
            writeln!(f, "Notes: {}", notes)?;
        }
        write!(f, "ID: {}", self.id)
    }
}
