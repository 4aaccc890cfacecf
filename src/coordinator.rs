use crate::{
    commands::{ContributionVerifier, Finalization, FinalizationOptions},
    coordinator_state::{CeremonyPhase, CoordinatorState, CoordinatorStatus, Outbound},
    environment::Environment,
    notifications::Notifier,
    objects::{
        calculate_hash,
        Artifact,
        CircuitDescriptor,
        FinalizationRecord,
        LogEntry,
        Participant,
        ParticipantId,
        ParticipantState,
        SetupParameters,
    },
    storage::{recover, resolve_head, Disk, Locator, Storage, StorageReader, StorageWriter},
};

use std::{
    io,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("exactly one setup parameters file is required, found none")]
    SetupParametersMissing,
    #[error("exactly one setup parameters file is required, found {0}")]
    SetupParametersDuplicate(usize),
    #[error("exactly one circuit constraint file is required, found none")]
    CircuitMissing,
    #[error("exactly one circuit constraint file is required, found {0}")]
    CircuitDuplicate(usize),
    #[error("the seed artifact is missing")]
    SeedArtifactMissing,
    #[error("artifact {0} is missing from the chain")]
    ArtifactSequenceGap(u64),
    #[error("the audit log is corrupted: {0}")]
    AuditLogCorrupted(String),
    #[error("artifact {0} is in the audit log but missing from storage")]
    LoggedArtifactMissing(u64),

    #[error("it is not your turn")]
    NotYourTurn,
    #[error("the participant already joined")]
    ParticipantAlreadyJoined,
    #[error("the participant is not in the queue")]
    ParticipantNotFound,
    #[error("a contribution was already submitted for this turn")]
    ContributionAlreadySubmitted,
    #[error("the artifact is {0} bytes, the maximum is {1}")]
    ArtifactTooLarge(usize, usize),
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("the ceremony is closed to new contributions")]
    CeremonyFinalized,
    #[error("the ceremony is halted: {0}")]
    CeremonyHalted(String),
    #[error("a contribution is in progress")]
    CeremonyBusy,

    #[error("verification failed: {0}")]
    VerificationFailed(String),
    #[error("the turn timed out")]
    TurnTimedOut,

    #[error("storage failed: {0}")]
    StorageFailed(String),
    #[error("the ceremony directory is in use by another coordinator ({0})")]
    StorageLocked(String),
    #[error("artifact {0} already exists")]
    ArtifactAlreadyExists(u64),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid beacon: {0}")]
    BeaconInvalid(String),
    #[error("the final artifact {0} already exists")]
    FinalArtifactExists(String),
    #[error("finalization failed: {0}")]
    FinalizationFailed(String),

    #[error("no artifacts found in storage")]
    ChainHeadNotFound,
}

impl CoordinatorError {
    ///
    /// Returns `true` if the error must be surfaced to the operator.
    ///
    /// Startup, storage, and finalization errors are fatal. Protocol, verification,
    /// and timeout errors only affect the participant who caused them.
    ///
    pub fn is_fatal(&self) -> bool {
        use CoordinatorError::*;
        match self {
            SetupParametersMissing
            | SetupParametersDuplicate(_)
            | CircuitMissing
            | CircuitDuplicate(_)
            | SeedArtifactMissing
            | ArtifactSequenceGap(_)
            | AuditLogCorrupted(_)
            | LoggedArtifactMissing(_)
            | CeremonyHalted(_)
            | StorageFailed(_)
            | StorageLocked(_)
            | ArtifactAlreadyExists(_)
            | Io(_)
            | Json(_)
            | FinalArtifactExists(_)
            | FinalizationFailed(_)
            | ChainHeadNotFound => true,
            NotYourTurn
            | ParticipantAlreadyJoined
            | ParticipantNotFound
            | ContributionAlreadySubmitted
            | ArtifactTooLarge(..)
            | MalformedMessage(_)
            | CeremonyFinalized
            | CeremonyBusy
            | VerificationFailed(_)
            | TurnTimedOut
            | BeaconInvalid(_) => false,
        }
    }
}

///
/// The ceremony coordinator.
///
/// All ceremony state lives in one `CoordinatorState` behind a lock that is only held
/// for the duration of a transition. Staging and verification of a submission run on
/// the blocking pool without holding the lock, while the state records that the turn
/// is under verification so no other transition can begin.
///
#[derive(Clone)]
pub struct Coordinator {
    /// The parameters and settings of this coordinator.
    environment: Environment,
    /// The artifact store and audit log.
    storage: Arc<RwLock<Box<dyn Storage>>>,
    /// The queue, active turn, and chain head.
    state: Arc<RwLock<CoordinatorState>>,
    /// The external verifier of contributions.
    verifier: Arc<dyn ContributionVerifier>,
    /// The channel to connected participants.
    notifier: Arc<dyn Notifier>,
    /// The circuit the proving key is prepared for.
    circuit: CircuitDescriptor,
    /// The phase 1 parameters the ceremony builds on.
    setup: SetupParameters,
}

impl Coordinator {
    ///
    /// Creates a new instance of the `Coordinator`, for a given environment.
    ///
    /// Loads the circuit and setup parameters, reconciles the artifact store with
    /// the audit log, and seeds the chain head from storage.
    ///
    pub fn new(
        environment: Environment,
        verifier: Arc<dyn ContributionVerifier>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoordinatorError> {
        info!("Starting the coordinator in {} mode", environment.mode());

        // Check that the fixed inputs of the ceremony exist.
        let setup = SetupParameters::load(&environment.setup_directory())?;
        let circuit = CircuitDescriptor::load(&environment.circuit_directory())?;

        // Load the artifact store, and recover the chain.
        let mut storage: Box<dyn Storage> = Box::new(Disk::load(&environment)?);
        let chain = recover(storage.as_mut(), environment.artifact_prefix())?;

        let mut state = CoordinatorState::new(&environment, chain.head);
        if chain.finalized_from.is_some() {
            state.finalized();
        }

        info!(
            "Serving {} with chain head {} and verifier {}",
            circuit.path().display(),
            chain.head,
            verifier.name()
        );

        Ok(Self {
            environment,
            storage: Arc::new(RwLock::new(storage)),
            state: Arc::new(RwLock::new(state)),
            verifier,
            notifier,
            circuit,
            setup,
        })
    }

    #[inline]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the sequence number of the latest accepted artifact.
    #[inline]
    pub fn chain_head(&self) -> Result<u64, CoordinatorError> {
        Ok(self.state()?.chain_head())
    }

    /// Returns the latest accepted artifact.
    #[inline]
    pub fn head_artifact(&self) -> Result<Artifact, CoordinatorError> {
        Ok(self.state()?.head_artifact())
    }

    /// Returns the number of participants in the queue, including the one holding the turn.
    #[inline]
    pub fn queue_length(&self) -> Result<usize, CoordinatorError> {
        Ok(self.state()?.queue_length())
    }

    /// Returns the position of the given participant, where 0 is the turn holder.
    #[inline]
    pub fn queue_position(&self, participant: ParticipantId) -> Result<Option<usize>, CoordinatorError> {
        Ok(self.state()?.queue_position(participant))
    }

    /// Returns the participant holding the turn, if any.
    #[inline]
    pub fn current_contributor(&self) -> Result<Option<Participant>, CoordinatorError> {
        Ok(self.state()?.current_contributor().cloned())
    }

    /// Returns the state of a participant who is waiting or contributing.
    #[inline]
    pub fn participant_state(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<ParticipantState>, CoordinatorError> {
        Ok(self.state()?.participant_state(participant))
    }

    #[inline]
    pub fn phase(&self) -> Result<CeremonyPhase, CoordinatorError> {
        Ok(self.state()?.phase())
    }

    #[inline]
    pub fn status(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        Ok(self.state()?.status().clone())
    }

    /// Returns every entry of the audit log, in order.
    #[inline]
    pub fn audit_log(&self) -> Result<Vec<LogEntry>, CoordinatorError> {
        self.storage()?.read_log()
    }

    ///
    /// Adds a participant to the tail of the queue.
    ///
    /// If the queue was empty, the participant is granted the turn immediately.
    ///
    pub fn join(&self, participant: Participant) -> Result<(), CoordinatorError> {
        let outbound = self.state_mut()?.join(participant, OffsetDateTime::now_utc())?;
        self.dispatch(outbound);
        Ok(())
    }

    ///
    /// Verifies and commits the contribution of the participant holding the turn.
    ///
    /// On success, the artifact is published at the next sequence number, logged,
    /// and the turn passes on. On a verification failure, the chain is unchanged and
    /// the turn passes on. A storage failure halts the ceremony.
    ///
    pub async fn submit_contribution(
        &self,
        participant: ParticipantId,
        artifact: Vec<u8>,
    ) -> Result<LogEntry, CoordinatorError> {
        // Check that the upload is within bounds.
        let maximum = self.environment.maximum_artifact_size();
        if artifact.len() > maximum {
            warn!("{} uploaded {} bytes, above the maximum of {}", participant, artifact.len(), maximum);
            return Err(CoordinatorError::ArtifactTooLarge(artifact.len(), maximum));
        }

        // Mark the turn as under verification, and fetch the head it must extend.
        let begun = self.state_mut()?.begin_verification(participant, OffsetDateTime::now_utc());
        let head = match begun {
            Ok(head) => head,
            Err(CoordinatorError::TurnTimedOut) => {
                self.update()?;
                return Err(CoordinatorError::TurnTimedOut);
            }
            Err(error) => return Err(error),
        };
        let display_name = match self.state()?.current_contributor() {
            Some(contributor) => contributor.display_name().to_string(),
            None => return Err(CoordinatorError::ParticipantNotFound),
        };
        let hash = hex::encode(calculate_hash(&artifact));

        // Write the upload to an unpublished location.
        let storage = self.storage.clone();
        let staged = tokio::task::spawn_blocking(move || {
            let staged = match storage.write() {
                Ok(mut storage) => storage.stage(&artifact),
                Err(_) => Err(CoordinatorError::StorageFailed("the storage lock is poisoned".to_string())),
            };
            staged
        })
        .await
        .unwrap_or_else(|error| Err(CoordinatorError::StorageFailed(error.to_string())));

        let staged = match staged {
            Ok(staged) => staged,
            Err(error) => return Err(self.halt(error)),
        };

        // Verify the upload against the head, without holding any lock.
        let (previous, next) = {
            let storage = self.storage()?;
            (storage.to_path(&Locator::Artifact(head)), storage.to_path(&staged))
        };
        let verifier = self.verifier.clone();
        let verification = tokio::task::spawn_blocking(move || verifier.verify_contribution(&previous, &next))
            .await
            .unwrap_or_else(|error| Err(CoordinatorError::VerificationFailed(error.to_string())));

        if let Err(error) = verification {
            let reason = match error {
                CoordinatorError::VerificationFailed(reason) => reason,
                error => error.to_string(),
            };
            warn!("The contribution of {} failed verification: {}", participant, reason);

            if let Err(error) = self.storage_mut()?.discard(&staged) {
                error!("Unable to discard the upload of {}: {}", participant, error);
            }
            let outbound = self.state_mut()?.reject(participant, &reason, OffsetDateTime::now_utc())?;
            self.dispatch(outbound);
            return Err(CoordinatorError::VerificationFailed(reason));
        }

        // Publish the artifact and log it as one transition.
        let sequence = head + 1;
        let entry = LogEntry::new(&display_name, &hash, sequence, OffsetDateTime::now_utc());
        if let Err(error) = self.commit(&staged, &entry) {
            return Err(self.halt(error));
        }

        let outbound = self.state_mut()?.accept(participant, &hash, OffsetDateTime::now_utc())?;
        self.dispatch(outbound);
        Ok(entry)
    }

    /// Forfeits the turn of the given participant if it has lapsed.
    pub fn timeout(&self, participant: ParticipantId) -> Result<(), CoordinatorError> {
        let outbound = self.state_mut()?.timeout(participant, OffsetDateTime::now_utc())?;
        self.dispatch(outbound);
        Ok(())
    }

    /// Removes a participant from the queue, forfeiting their turn if they hold it.
    pub fn leave(&self, participant: ParticipantId) -> Result<(), CoordinatorError> {
        let outbound = self.state_mut()?.leave(participant, OffsetDateTime::now_utc())?;
        self.dispatch(outbound);
        Ok(())
    }

    /// Forfeits the active turn if its deadline has passed.
    #[inline]
    pub fn update(&self) -> Result<(), CoordinatorError> {
        self.update_at(OffsetDateTime::now_utc())
    }

    /// Forfeits the active turn if its deadline has passed at the given time.
    pub fn update_at(&self, now: OffsetDateTime) -> Result<(), CoordinatorError> {
        let outbound = self.state_mut()?.update(now);
        self.dispatch(outbound);
        Ok(())
    }

    ///
    /// Mixes the public beacon into the last accepted artifact and publishes the terminal artifact.
    ///
    /// Admissions are closed first. On failure the ceremony stays closed, and finalization
    /// may be retried.
    ///
    pub async fn finalize(&self, options: FinalizationOptions) -> Result<FinalizationRecord, CoordinatorError> {
        let outbound = self.state_mut()?.close()?;
        self.dispatch(outbound);

        // Check that the store agrees with the chain head before publishing anything.
        let head = self.chain_head()?;
        let stored = resolve_head(&**self.storage()?, self.environment.artifact_prefix())?;
        if stored != head {
            error!("The artifact store ends at {} but the chain head is {}", stored, head);
            return Err(CoordinatorError::FinalizationFailed(format!(
                "the artifact store ends at {} but the chain head is {}",
                stored, head
            )));
        }

        let storage = self.storage.clone();
        let verifier = self.verifier.clone();
        let circuit = self.circuit.clone();
        let setup = self.setup.clone();
        let prefix = self.environment.artifact_prefix().to_string();
        let record = tokio::task::spawn_blocking(move || {
            let record = match storage.write() {
                Ok(mut storage) => Finalization::run(
                    &mut storage,
                    verifier.as_ref(),
                    &circuit,
                    &setup,
                    &prefix,
                    head,
                    &options,
                ),
                Err(_) => Err(CoordinatorError::StorageFailed("the storage lock is poisoned".to_string())),
            };
            record
        })
        .await
        .unwrap_or_else(|error| Err(CoordinatorError::FinalizationFailed(error.to_string())))?;

        self.state_mut()?.finalized();
        Ok(record)
    }

    /// Moves a verified upload into the artifact store and appends its log entry.
    fn commit(&self, staged: &Locator, entry: &LogEntry) -> Result<(), CoordinatorError> {
        let mut storage = self.storage_mut()?;
        let destination = Locator::Artifact(entry.sequence_number());

        if let Err(error) = storage.commit(staged, &destination) {
            if let Err(error) = storage.discard(staged) {
                error!("Unable to discard {}: {}", staged, error);
            }
            return Err(error);
        }

        storage.append_log(entry)?;
        debug!("Committed and logged artifact {}", entry.sequence_number());
        Ok(())
    }

    /// Halts the ceremony after a durable write failed, and returns the error.
    fn halt(&self, error: CoordinatorError) -> CoordinatorError {
        error!("Storage failed, halting the ceremony: {}", error);
        match self.state_mut() {
            Ok(mut state) => {
                let outbound = state.halt(&error.to_string());
                drop(state);
                self.dispatch(outbound);
            }
            Err(error) => error!("Unable to halt the ceremony: {}", error),
        }
        match error {
            CoordinatorError::StorageFailed(_) => error,
            error => CoordinatorError::StorageFailed(error.to_string()),
        }
    }

    /// Delivers the notifications of a transition.
    #[inline]
    fn dispatch(&self, outbound: Outbound) {
        for (participant, event) in outbound {
            self.notifier.notify(participant, event);
        }
    }

    /// Attempts to acquire the read lock for the ceremony state.
    #[inline]
    fn state(&self) -> Result<RwLockReadGuard<CoordinatorState>, CoordinatorError> {
        match self.state.read() {
            Ok(state) => Ok(state),
            _ => Err(CoordinatorError::CeremonyHalted("the state lock is poisoned".to_string())),
        }
    }

    /// Attempts to acquire the write lock for the ceremony state.
    #[inline]
    fn state_mut(&self) -> Result<RwLockWriteGuard<CoordinatorState>, CoordinatorError> {
        match self.state.write() {
            Ok(state) => Ok(state),
            _ => Err(CoordinatorError::CeremonyHalted("the state lock is poisoned".to_string())),
        }
    }

    /// Attempts to acquire the read lock for storage.
    #[inline]
    fn storage(&self) -> Result<StorageReader, CoordinatorError> {
        match self.storage.read() {
            Ok(storage) => Ok(storage),
            _ => Err(CoordinatorError::StorageFailed("the storage lock is poisoned".to_string())),
        }
    }

    /// Attempts to acquire the write lock for storage.
    #[inline]
    fn storage_mut(&self) -> Result<StorageWriter, CoordinatorError> {
        match self.storage.write() {
            Ok(storage) => Ok(storage),
            _ => Err(CoordinatorError::StorageFailed("the storage lock is poisoned".to_string())),
        }
    }
}
