use crate::{
    notifications::{Notifier, ServerEvent},
    objects::ParticipantId,
};

use std::sync::Mutex;

/// A notifier that records every event, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(ParticipantId, ServerEvent)>>,
}

impl RecordingNotifier {
    /// Returns every event delivered so far.
    pub fn events(&self) -> Vec<(ParticipantId, ServerEvent)> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the events delivered to the given participant.
    pub fn events_for(&self, participant: ParticipantId) -> Vec<ServerEvent> {
        self.events()
            .into_iter()
            .filter(|(id, _)| *id == participant)
            .map(|(_, event)| event)
            .collect()
    }

    /// Returns the last event delivered to the given participant.
    pub fn last_for(&self, participant: ParticipantId) -> Option<ServerEvent> {
        self.events_for(participant).pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, participant: ParticipantId, event: ServerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((participant, event));
        }
    }
}
