use crate::{
    notifications::{Notifier, ServerEvent},
    objects::ParticipantId,
};

use tracing::trace;

/// A notifier that drops every event.
pub struct Dummy;

impl Notifier for Dummy {
    fn notify(&self, participant: ParticipantId, event: ServerEvent) {
        trace!("Dropping {} for {}", event.name(), participant);
    }
}
