use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::CollectionCounts;

/// Direction of a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Local overwrites remote.
    Push,
    /// Remote overwrites local.
    Pull,
    /// Union by id, local wins on conflict.
    #[default]
    Merge,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Push => "push",
            SyncMode::Pull => "pull",
            SyncMode::Merge => "merge",
        }
    }

    /// Pull discards unsynced local edits.
    pub fn is_destructive(&self) -> bool {
        matches!(self, SyncMode::Pull)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "push" => Ok(SyncMode::Push),
            "pull" => Ok(SyncMode::Pull),
            "merge" => Ok(SyncMode::Merge),
            _ => Err(format!(
                "Invalid sync mode: '{}'. Valid values: push, pull, merge",
                s
            )),
        }
    }
}

/// Outcome of a successful sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub mode: SyncMode,
    /// Records taken from the remote into the Local Store.
    pub adopted: CollectionCounts,
    /// Records written to the remote.
    pub written: CollectionCounts,
    /// Local Store size after the cycle.
    pub local: CollectionCounts,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sync ({}) complete", self.mode)?;
        if self.mode != SyncMode::Push {
            writeln!(f, "  from remote: {}", self.adopted)?;
        }
        if self.mode != SyncMode::Pull {
            writeln!(f, "  to remote:   {}", self.written)?;
        }
        write!(f, "  local:       {}", self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_mode_parse() {
        assert_eq!("push".parse::<SyncMode>().unwrap(), SyncMode::Push);
        assert_eq!(" PULL ".parse::<SyncMode>().unwrap(), SyncMode::Pull);
        assert_eq!("Merge".parse::<SyncMode>().unwrap(), SyncMode::Merge);
        assert!("both".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_default_mode_is_merge() {
        assert_eq!(SyncMode::default(), SyncMode::Merge);
        assert!(SyncMode::Pull.is_destructive());
        assert!(!SyncMode::Merge.is_destructive());
    }

    #[test]
    fn test_summary_display_hides_unused_direction() {
        let summary = SyncSummary {
            mode: SyncMode::Push,
            adopted: CollectionCounts::default(),
            written: CollectionCounts {
                properties: 2,
                ..Default::default()
            },
            local: CollectionCounts::default(),
        };
        let text = summary.to_string();
        assert!(text.contains("Sync (push) complete"));
        assert!(text.contains("to remote"));
        assert!(!text.contains("from remote"));
    }
}
