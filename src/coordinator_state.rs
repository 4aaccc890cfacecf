use crate::{
    environment::{ContributionParameters, Environment},
    notifications::ServerEvent,
    objects::{Artifact, Participant, ParticipantId, ParticipantState},
    CoordinatorError,
};

use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt, time::Duration};
use time::OffsetDateTime;
use tracing::{debug, info, trace, warn};

/// The notifications produced by a state transition, delivered once the state lock is released.
pub type Outbound = Vec<(ParticipantId, ServerEvent)>;

/// Whether the coordinator is admitting and serving participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorStatus {
    /// Participants may join, and turns are granted.
    Serving,
    /// Admissions are closed for finalization.
    Closed,
    /// The terminal artifact has been published.
    Finalized,
    /// A durable write failed. Nothing moves until an operator intervenes.
    Halted(String),
}

impl fmt::Display for CoordinatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorStatus::Serving => write!(f, "serving"),
            CoordinatorStatus::Closed => write!(f, "closed"),
            CoordinatorStatus::Finalized => write!(f, "finalized"),
            CoordinatorStatus::Halted(reason) => write!(f, "halted ({})", reason),
        }
    }
}

/// The position of the ceremony in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyPhase {
    /// No participant is waiting or contributing.
    Idle,
    /// Participants are waiting but no turn is held.
    Queued(usize),
    /// The given participant holds the turn.
    ActiveTurn(ParticipantId),
    /// The given participant's submission is being verified.
    Verifying(ParticipantId),
}

impl fmt::Display for CeremonyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeremonyPhase::Idle => write!(f, "idle"),
            CeremonyPhase::Queued(n) => write!(f, "queued({})", n),
            CeremonyPhase::ActiveTurn(_) => write!(f, "activeTurn"),
            CeremonyPhase::Verifying(_) => write!(f, "verifying"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Turn {
    /// The participant holding the turn.
    participant: Participant,
    /// The timestamp when the turn was granted.
    started_at: OffsetDateTime,
    /// The timestamp after which the turn is forfeited.
    deadline: OffsetDateTime,
    /// Set once a submission is handed to the verifier. Suspends the deadline.
    verifying: bool,
    /// Set if the participant left while their submission was being verified.
    abandoned: bool,
}

impl Turn {
    #[inline]
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        !self.verifying && now >= self.deadline
    }
}

///
/// The ceremony state machine.
///
/// Holds the queue, the single active turn, and the chain head. Every method is
/// synchronous and takes the current time, so each transition is applied in one
/// critical section and returns the notifications it produced.
///
#[derive(Debug)]
pub(crate) struct CoordinatorState {
    /// The participants waiting for a turn, in arrival order.
    queue: VecDeque<Participant>,
    /// The participant currently holding the turn, if any.
    turn: Option<Turn>,
    /// The sequence number of the latest accepted artifact.
    chain_head: u64,
    /// Whether the ceremony is serving participants.
    status: CoordinatorStatus,
    /// The duration a participant has to submit once granted a turn.
    turn_timeout: Duration,
    /// The file stem of chain artifacts.
    artifact_prefix: String,
    /// The parameters handed out with every turn.
    parameters: ContributionParameters,
}

impl CoordinatorState {
    /// Creates a new coordinator state seeded at the given chain head.
    #[inline]
    pub(crate) fn new(environment: &Environment, chain_head: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            turn: None,
            chain_head,
            status: CoordinatorStatus::Serving,
            turn_timeout: environment.turn_timeout(),
            artifact_prefix: environment.artifact_prefix().to_string(),
            parameters: environment.contribution_parameters().clone(),
        }
    }

    /// Returns the sequence number of the latest accepted artifact.
    #[inline]
    pub(crate) fn chain_head(&self) -> u64 {
        self.chain_head
    }

    /// Returns the latest accepted artifact.
    #[inline]
    pub(crate) fn head_artifact(&self) -> Artifact {
        Artifact::new(&self.artifact_prefix, self.chain_head)
    }

    #[inline]
    pub(crate) fn status(&self) -> &CoordinatorStatus {
        &self.status
    }

    /// Returns the number of participants in the queue, including the one holding the turn.
    #[inline]
    pub(crate) fn queue_length(&self) -> usize {
        self.queue.len() + self.turn.is_some() as usize
    }

    ///
    /// Returns the 1-based position of a waiting participant, where 1 is next in line.
    /// The participant holding the turn is at position 0.
    ///
    #[inline]
    pub(crate) fn queue_position(&self, id: ParticipantId) -> Option<usize> {
        if self.is_current(id) {
            return Some(0);
        }
        self.queue.iter().position(|p| p.id() == id).map(|index| index + 1)
    }

    /// Returns the participant holding the turn, if any.
    #[inline]
    pub(crate) fn current_contributor(&self) -> Option<&Participant> {
        self.turn.as_ref().map(|turn| &turn.participant)
    }

    /// Returns the state of a participant who is waiting or contributing.
    pub(crate) fn participant_state(&self, id: ParticipantId) -> Option<ParticipantState> {
        match &self.turn {
            Some(turn) if turn.participant.id() == id => match turn.abandoned {
                true => Some(ParticipantState::Abandoned),
                false => Some(ParticipantState::ActiveTurn),
            },
            _ => self
                .queue
                .iter()
                .find(|p| p.id() == id)
                .map(|_| ParticipantState::Queued),
        }
    }

    /// Returns the deadline of the active turn, if any.
    #[inline]
    pub(crate) fn current_deadline(&self) -> Option<OffsetDateTime> {
        self.turn.as_ref().map(|turn| turn.deadline)
    }

    pub(crate) fn phase(&self) -> CeremonyPhase {
        match &self.turn {
            Some(turn) if turn.verifying => CeremonyPhase::Verifying(turn.participant.id()),
            Some(turn) => CeremonyPhase::ActiveTurn(turn.participant.id()),
            None if self.queue.is_empty() => CeremonyPhase::Idle,
            None => CeremonyPhase::Queued(self.queue.len()),
        }
    }

    ///
    /// Adds a participant to the tail of the queue.
    ///
    /// If nobody holds the turn, the participant is granted it immediately.
    ///
    pub(crate) fn join(&mut self, participant: Participant, now: OffsetDateTime) -> Result<Outbound, CoordinatorError> {
        // Check that the ceremony is admitting participants.
        self.check_serving()?;

        // Check that the participant is not already in the queue.
        if self.participant_state(participant.id()).is_some() {
            return Err(CoordinatorError::ParticipantAlreadyJoined);
        }

        info!("{} joined the queue", participant);
        self.queue.push_back(participant);

        let mut outbound = self.advance(now);
        outbound.extend(self.queue_positions());
        Ok(outbound)
    }

    ///
    /// Marks the submission of the participant holding the turn as under verification,
    /// and returns the chain head it must extend.
    ///
    /// While verifying, the turn deadline is suspended and further submissions are refused.
    ///
    pub(crate) fn begin_verification(&mut self, id: ParticipantId, now: OffsetDateTime) -> Result<u64, CoordinatorError> {
        self.check_serving()?;

        let turn = match &mut self.turn {
            Some(turn) if turn.participant.id() == id => turn,
            _ => return Err(CoordinatorError::NotYourTurn),
        };

        // Check that the participant has not already submitted.
        if turn.verifying {
            return Err(CoordinatorError::ContributionAlreadySubmitted);
        }

        // Check that the turn has not lapsed. The sweep forfeits it shortly.
        if turn.is_expired(now) {
            return Err(CoordinatorError::TurnTimedOut);
        }

        turn.verifying = true;
        debug!("Verifying the submission of {}", turn.participant);
        Ok(self.chain_head)
    }

    ///
    /// Advances the chain head past a verified and durably committed submission,
    /// and passes the turn on.
    ///
    pub(crate) fn accept(&mut self, id: ParticipantId, hash: &str, now: OffsetDateTime) -> Result<Outbound, CoordinatorError> {
        let turn = self.take_verifying_turn(id)?;

        self.chain_head += 1;
        let artifact = self.head_artifact();
        info!(
            "Accepted the contribution of {} as {} ({:?})",
            turn.participant,
            artifact,
            match turn.abandoned {
                true => ParticipantState::Abandoned,
                false => ParticipantState::Completed,
            }
        );

        let mut outbound = vec![(id, ServerEvent::Accepted {
            artifact: artifact.url_path(),
            sequence: artifact.sequence(),
            hash: hash.to_string(),
        })];
        outbound.extend(self.advance(now));
        outbound.extend(self.queue_positions());
        Ok(outbound)
    }

    /// Releases the turn of a participant whose submission failed verification.
    pub(crate) fn reject(&mut self, id: ParticipantId, reason: &str, now: OffsetDateTime) -> Result<Outbound, CoordinatorError> {
        let turn = self.take_verifying_turn(id)?;
        info!("Rejected the contribution of {}: {}", turn.participant, reason);

        let mut outbound = vec![(id, ServerEvent::Rejected {
            reason: reason.to_string(),
        })];
        outbound.extend(self.advance(now));
        outbound.extend(self.queue_positions());
        Ok(outbound)
    }

    ///
    /// Forfeits the turn of the given participant if it has lapsed without a submission.
    ///
    /// A turn under verification is never forfeited.
    ///
    pub(crate) fn timeout(&mut self, id: ParticipantId, now: OffsetDateTime) -> Result<Outbound, CoordinatorError> {
        match &self.turn {
            Some(turn) if turn.participant.id() == id => {
                if turn.verifying {
                    return Ok(vec![]);
                }
            }
            _ => return Err(CoordinatorError::ParticipantNotFound),
        }

        let turn = self.release_turn()?;
        info!(
            "{} timed out after {} seconds",
            turn.participant,
            (now - turn.started_at).whole_seconds()
        );

        let mut outbound = vec![(id, ServerEvent::TimedOut)];
        outbound.extend(self.advance(now));
        outbound.extend(self.queue_positions());
        Ok(outbound)
    }

    /// Forfeits the active turn if its deadline has passed.
    pub(crate) fn update(&mut self, now: OffsetDateTime) -> Outbound {
        let expired = match &self.turn {
            Some(turn) if turn.is_expired(now) => turn.participant.id(),
            _ => return vec![],
        };
        self.timeout(expired, now).unwrap_or_default()
    }

    ///
    /// Removes a participant who disconnected.
    ///
    /// A waiting participant is dropped from the queue. A participant holding the turn
    /// forfeits it immediately. If their submission is already under verification,
    /// the outcome is still applied to the chain once verification completes.
    ///
    pub(crate) fn leave(&mut self, id: ParticipantId, now: OffsetDateTime) -> Result<Outbound, CoordinatorError> {
        if let Some(index) = self.queue.iter().position(|p| p.id() == id) {
            if let Some(participant) = self.queue.remove(index) {
                info!("{} left the queue", participant);
            }
            return Ok(self.queue_positions());
        }

        match &mut self.turn {
            Some(turn) if turn.participant.id() == id => {
                if turn.verifying {
                    info!("{} left while their submission is verified", turn.participant);
                    turn.abandoned = true;
                    return Ok(vec![]);
                }
            }
            _ => return Err(CoordinatorError::ParticipantNotFound),
        }

        let turn = self.release_turn()?;
        info!("{} left during their turn", turn.participant);

        let mut outbound = vec![(id, ServerEvent::TimedOut)];
        outbound.extend(self.advance(now));
        outbound.extend(self.queue_positions());
        Ok(outbound)
    }

    ///
    /// Stops all forward progress after a durable write failed.
    ///
    /// The turn is released without advancing the chain, and every waiting
    /// participant is turned away.
    ///
    pub(crate) fn halt(&mut self, reason: &str) -> Outbound {
        warn!("Halting the ceremony: {}", reason);
        self.status = CoordinatorStatus::Halted(reason.to_string());

        let mut outbound = vec![];
        if let Some(turn) = self.turn.take() {
            outbound.push((turn.participant.id(), ServerEvent::Rejected {
                reason: "the coordinator halted".to_string(),
            }));
        }
        for participant in self.queue.drain(..) {
            outbound.push((participant.id(), ServerEvent::Rejected {
                reason: "the coordinator halted".to_string(),
            }));
        }
        outbound
    }

    /// Closes admissions ahead of finalization.
    pub(crate) fn close(&mut self) -> Result<Outbound, CoordinatorError> {
        match &self.status {
            CoordinatorStatus::Finalized => return Err(CoordinatorError::CeremonyFinalized),
            CoordinatorStatus::Halted(reason) => return Err(CoordinatorError::CeremonyHalted(reason.clone())),
            CoordinatorStatus::Serving | CoordinatorStatus::Closed => (),
        }

        // Check that no contribution is in progress.
        if self.turn.is_some() {
            return Err(CoordinatorError::CeremonyBusy);
        }

        if self.status != CoordinatorStatus::Closed {
            info!("Closing the ceremony at chain head {}", self.chain_head);
            self.status = CoordinatorStatus::Closed;
        }

        Ok(self
            .queue
            .drain(..)
            .map(|participant| {
                (participant.id(), ServerEvent::Rejected {
                    reason: "ceremony closed".to_string(),
                })
            })
            .collect())
    }

    /// Marks the ceremony as finalized.
    #[inline]
    pub(crate) fn finalized(&mut self) {
        self.status = CoordinatorStatus::Finalized;
    }

    #[inline]
    fn is_current(&self, id: ParticipantId) -> bool {
        matches!(&self.turn, Some(turn) if turn.participant.id() == id)
    }

    fn check_serving(&self) -> Result<(), CoordinatorError> {
        match &self.status {
            CoordinatorStatus::Serving => Ok(()),
            CoordinatorStatus::Closed | CoordinatorStatus::Finalized => Err(CoordinatorError::CeremonyFinalized),
            CoordinatorStatus::Halted(reason) => Err(CoordinatorError::CeremonyHalted(reason.clone())),
        }
    }

    fn take_verifying_turn(&mut self, id: ParticipantId) -> Result<Turn, CoordinatorError> {
        match &self.turn {
            Some(turn) if turn.participant.id() == id && turn.verifying => self.release_turn(),
            Some(turn) if turn.participant.id() == id => Err(CoordinatorError::NotYourTurn),
            _ => Err(CoordinatorError::ParticipantNotFound),
        }
    }

    #[inline]
    fn release_turn(&mut self) -> Result<Turn, CoordinatorError> {
        self.turn.take().ok_or(CoordinatorError::ParticipantNotFound)
    }

    /// Grants the turn to the head of the queue if nobody holds it.
    fn advance(&mut self, now: OffsetDateTime) -> Outbound {
        if self.turn.is_some() || self.status != CoordinatorStatus::Serving {
            return vec![];
        }
        let participant = match self.queue.pop_front() {
            Some(participant) => participant,
            None => {
                trace!("The queue is empty");
                return vec![];
            }
        };

        let deadline = now + self.turn_timeout;
        let artifact = self.head_artifact();
        info!("Granted the turn to {} on {}", participant, artifact);

        let event = ServerEvent::YourTurn {
            artifact: artifact.url_path(),
            sequence: artifact.sequence(),
            parameters: self.parameters.clone(),
            deadline,
        };
        let id = participant.id();
        self.turn = Some(Turn {
            participant,
            started_at: now,
            deadline,
            verifying: false,
            abandoned: false,
        });
        vec![(id, event)]
    }

    /// Returns the current position of every waiting participant.
    fn queue_positions(&self) -> Outbound {
        let queue_length = self.queue_length();
        self.queue
            .iter()
            .enumerate()
            .map(|(index, participant)| {
                (participant.id(), ServerEvent::QueuePosition {
                    position: index + 1,
                    queue_length,
                })
            })
            .collect()
    }
}
