use crate::environment::ContributionParameters;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A message from the coordinator to one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// The participant's 1-based place in the queue. Informational only.
    #[serde(rename_all = "camelCase")]
    QueuePosition { position: usize, queue_length: usize },
    /// The participant holds the active turn and should transform the given artifact.
    #[serde(rename_all = "camelCase")]
    YourTurn {
        artifact: String,
        sequence: u64,
        parameters: ContributionParameters,
        #[serde(with = "time::serde::rfc3339")]
        deadline: OffsetDateTime,
    },
    /// The submission was verified and published at the given location.
    #[serde(rename_all = "camelCase")]
    Accepted { artifact: String, sequence: u64, hash: String },
    /// The submission failed verification, or the turn could not be served.
    Rejected { reason: String },
    /// The turn deadline passed without a submission.
    TimedOut,
    /// A protocol error that does not end the session.
    Error { reason: String },
}

impl ServerEvent {
    /// Returns `true` if this event ends the participant's session.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerEvent::Accepted { .. } | ServerEvent::Rejected { .. } | ServerEvent::TimedOut
        )
    }

    /// Returns the wire name of this event, for logging.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::QueuePosition { .. } => "queuePosition",
            ServerEvent::YourTurn { .. } => "yourTurn",
            ServerEvent::Accepted { .. } => "accepted",
            ServerEvent::Rejected { .. } => "rejected",
            ServerEvent::TimedOut => "timedOut",
            ServerEvent::Error { .. } => "error",
        }
    }
}
