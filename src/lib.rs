pub mod apis;
pub mod commands;
pub mod coordinator;
pub mod environment;
pub mod logger;
pub mod notifications;
pub mod objects;
pub mod storage;

pub use coordinator::*;
pub use coordinator_state::{CeremonyPhase, CoordinatorStatus};
pub use objects::{Participant, ParticipantId};
pub use storage::Storage;

mod coordinator_state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;
