pub mod dummy;
pub use dummy::*;

pub mod event;
pub use event::*;

use crate::objects::ParticipantId;

/// The observer interface through which the coordinator reaches connected participants.
///
/// The coordinator never holds a transport handle. It only addresses participants by ID,
/// so any push channel (websocket, server-sent events, polling) can sit behind this trait.
pub trait Notifier: Send + Sync {
    /// Delivers an event to the given participant. Delivery is best effort.
    fn notify(&self, participant: ParticipantId, event: ServerEvent);
}
