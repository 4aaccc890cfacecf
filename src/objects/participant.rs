use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use time::OffsetDateTime;

static NEXT_PARTICIPANT_ID: AtomicU64 = AtomicU64::new(1);

const ANONYMOUS: &str = "anonymous";

/// The identifier of a single connection. A reconnect is a new participant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Returns a fresh, process-unique participant ID.
    #[inline]
    pub fn next() -> Self {
        ParticipantId(NEXT_PARTICIPANT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant-{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipantState {
    Queued,
    ActiveTurn,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Participant {
    id: ParticipantId,
    display_name: String,
    joined_at: OffsetDateTime,
}

impl Participant {
    /// Creates a new participant for a fresh connection.
    ///
    /// The display name is self-reported and unverified. It is trimmed,
    /// stripped of control characters, and truncated to `maximum_length` characters.
    pub fn new(display_name: &str, maximum_length: usize) -> Self {
        Self {
            id: ParticipantId::next(),
            display_name: sanitize_display_name(display_name, maximum_length),
            joined_at: OffsetDateTime::now_utc(),
        }
    }

    #[inline]
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    #[inline]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[inline]
    pub fn joined_at(&self) -> OffsetDateTime {
        self.joined_at
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

fn sanitize_display_name(display_name: &str, maximum_length: usize) -> String {
    let sanitized: String = display_name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(maximum_length)
        .collect();

    match sanitized.trim().is_empty() {
        true => ANONYMOUS.to_string(),
        false => sanitized.trim().to_string(),
    }
}
