use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One accepted contribution in the public audit trail.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    display_name: String,
    contribution_hash: String,
    sequence_number: u64,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

impl LogEntry {
    #[inline]
    pub fn new(display_name: &str, contribution_hash: &str, sequence_number: u64, timestamp: OffsetDateTime) -> Self {
        Self {
            display_name: display_name.to_string(),
            contribution_hash: contribution_hash.to_string(),
            sequence_number,
            timestamp,
        }
    }

    #[inline]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[inline]
    pub fn contribution_hash(&self) -> &str {
        &self.contribution_hash
    }

    #[inline]
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    #[inline]
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }
}
