use crate::{
    notifications::{Notifier, ServerEvent},
    objects::{Participant, ParticipantId},
    Coordinator,
    CoordinatorError,
};

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace, warn};
use warp::{
    ws::{Message, WebSocket, Ws},
    Filter,
    Rejection,
    Reply,
};

/// The headroom above the maximum artifact size allowed for a websocket frame.
const FRAME_HEADROOM: usize = 1 << 20;

/// A message from a participant to the coordinator. Submissions arrive as binary frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Joins the queue under a self-reported display name.
    Connect {
        #[serde(default)]
        name: String,
    },
    /// Leaves the queue, forfeiting the turn if held.
    Disconnect,
}

impl ClientMessage {
    /// Parses a text frame from a participant.
    pub fn parse(text: &str) -> Result<Self, CoordinatorError> {
        serde_json::from_str(text).map_err(|error| CoordinatorError::MalformedMessage(error.to_string()))
    }
}

///
/// The open websocket sessions, addressed by participant.
///
/// This is the notifier handed to the coordinator. Events for a participant
/// whose session has ended are dropped.
///
#[derive(Debug, Clone, Default)]
pub struct Sessions {
    senders: Arc<Mutex<HashMap<ParticipantId, UnboundedSender<ServerEvent>>>>,
}

impl Sessions {
    /// Opens the event channel of a participant.
    fn register(&self, participant: ParticipantId) -> UnboundedReceiver<ServerEvent> {
        let (sender, receiver) = unbounded_channel();
        if let Ok(mut senders) = self.senders.lock() {
            senders.insert(participant, sender);
        }
        receiver
    }

    /// Closes the event channel of a participant.
    fn unregister(&self, participant: ParticipantId) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.remove(&participant);
        }
    }
}

impl Notifier for Sessions {
    fn notify(&self, participant: ParticipantId, event: ServerEvent) {
        let senders = match self.senders.lock() {
            Ok(senders) => senders,
            Err(_) => {
                error!("The session registry lock is poisoned");
                return;
            }
        };
        match senders.get(&participant) {
            Some(sender) => {
                trace!("Sending {} to {}", event.name(), participant);
                if sender.send(event).is_err() {
                    debug!("The session of {} is closed", participant);
                }
            }
            None => trace!("No open session for {}, dropping {}", participant, event.name()),
        }
    }
}

/// Returns the websocket route at `/ws`.
pub fn session_route(
    coordinator: Coordinator,
    sessions: Sessions,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::any().map(move || coordinator.clone()))
        .and(warp::any().map(move || sessions.clone()))
        .map(|ws: Ws, coordinator: Coordinator, sessions: Sessions| {
            let limit = coordinator
                .environment()
                .maximum_artifact_size()
                .saturating_add(FRAME_HEADROOM);
            ws.max_message_size(limit)
                .max_frame_size(limit)
                .on_upgrade(move |socket| session(socket, coordinator, sessions))
        })
}

///
/// Serves one participant connection.
///
/// The first text frame must be `connect`. From then on, coordinator events are
/// forwarded to the socket, a binary frame is a submission, and `disconnect` or a
/// closed socket forfeits the participant's place. The socket is closed after the
/// first terminal event, so every connection is at most one turn.
///
async fn session(socket: WebSocket, coordinator: Coordinator, sessions: Sessions) {
    let (mut sink, mut stream) = socket.split();

    // Wait for the participant to connect.
    let name = loop {
        match stream.next().await {
            Some(Ok(message)) if message.is_text() => match ClientMessage::parse(message.to_str().unwrap_or("")) {
                Ok(ClientMessage::Connect { name }) => break name,
                Ok(ClientMessage::Disconnect) => return,
                Err(error) => {
                    warn!("Received a malformed message before connect: {}", error);
                    let _ = send(&mut sink, &ServerEvent::Error {
                        reason: error.to_string(),
                    })
                    .await;
                }
            },
            Some(Ok(message)) if message.is_close() => return,
            Some(Ok(message)) if message.is_binary() => {
                let _ = send(&mut sink, &ServerEvent::Error {
                    reason: "connect before submitting".to_string(),
                })
                .await;
            }
            Some(Ok(_)) => continue,
            Some(Err(error)) => {
                debug!("Websocket error before connect: {}", error);
                return;
            }
            None => return,
        }
    };

    let participant = Participant::new(&name, coordinator.environment().maximum_display_name_length());
    let id = participant.id();
    let mut events = sessions.register(id);

    if let Err(error) = coordinator.join(participant) {
        warn!("{} was refused: {}", id, error);
        sessions.unregister(id);
        let _ = send(&mut sink, &ServerEvent::Rejected {
            reason: error.to_string(),
        })
        .await;
        let _ = sink.close().await;
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Some(event) => event,
                    None => break,
                };
                if send(&mut sink, &event).await.is_err() {
                    break;
                }
                if event.is_terminal() {
                    debug!("Closing the session of {} after {}", id, event.name());
                    let _ = sink.close().await;
                    break;
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(message)) if message.is_binary() => {
                        let artifact = message.into_bytes();
                        info!("Received {} bytes from {}", artifact.len(), id);
                        let coordinator = coordinator.clone();
                        let sessions = sessions.clone();
                        tokio::spawn(async move {
                            if let Err(error) = coordinator.submit_contribution(id, artifact).await {
                                report(&sessions, id, error);
                            }
                        });
                    }
                    Some(Ok(message)) if message.is_text() => {
                        match ClientMessage::parse(message.to_str().unwrap_or("")) {
                            Ok(ClientMessage::Disconnect) => {
                                debug!("{} disconnected", id);
                                break;
                            }
                            Ok(ClientMessage::Connect { .. }) => {
                                sessions.notify(id, ServerEvent::Error {
                                    reason: CoordinatorError::ParticipantAlreadyJoined.to_string(),
                                });
                            }
                            Err(error) => {
                                warn!("Received a malformed message from {}: {}", id, error);
                                sessions.notify(id, ServerEvent::Error { reason: error.to_string() });
                            }
                        }
                    }
                    Some(Ok(message)) if message.is_close() => break,
                    Some(Ok(_)) => (),
                    Some(Err(error)) => {
                        debug!("Websocket error from {}: {}", id, error);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    sessions.unregister(id);
    match coordinator.leave(id) {
        Ok(()) | Err(CoordinatorError::ParticipantNotFound) => (),
        Err(error) => warn!("Unable to remove {}: {}", id, error),
    }
}

/// Reports a failed submission to the participant if no terminal event already covers it.
fn report(sessions: &Sessions, participant: ParticipantId, error: CoordinatorError) {
    match error {
        // The coordinator already sent the participant a terminal event.
        CoordinatorError::VerificationFailed(_) | CoordinatorError::TurnTimedOut => (),
        error if error.is_fatal() => error!("Submission of {} failed: {}", participant, error),
        error => {
            warn!("Submission of {} refused: {}", participant, error);
            sessions.notify(participant, ServerEvent::Error {
                reason: error.to_string(),
            });
        }
    }
}

async fn send<S>(sink: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = warp::Error> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(error) => {
            error!("Unable to serialize {}: {}", event.name(), error);
            return Err(());
        }
    };
    sink.send(Message::text(text)).await.map_err(|error| {
        debug!("Unable to send {}: {}", event.name(), error);
    })
}
