use crate::{
    objects::{Artifact, LogEntry},
    storage::{Locator, Storage},
    CoordinatorError,
};

use tracing::{debug, error, info, warn};

/// The chain as reconstructed from durable storage at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    /// The sequence number of the latest logged artifact.
    pub head: u64,
    /// The audit log, in order.
    pub log: Vec<LogEntry>,
    /// The source sequence of a terminal artifact, if the ceremony was finalized.
    pub finalized_from: Option<u64>,
    /// The number of orphaned artifacts moved out of the published store.
    pub orphans: usize,
}

///
/// Returns the highest sequence number present in the artifact store.
///
/// Terminal artifacts and files that do not follow the artifact naming are ignored.
///
pub fn resolve_head(storage: &dyn Storage, prefix: &str) -> Result<u64, CoordinatorError> {
    storage
        .list_artifacts()?
        .iter()
        .filter_map(|filename| Artifact::parse_sequence(prefix, filename))
        .max()
        .ok_or(CoordinatorError::ChainHeadNotFound)
}

/// Returns the source sequence of the terminal artifact in the store, if one exists.
fn resolve_final(storage: &dyn Storage, prefix: &str) -> Result<Option<u64>, CoordinatorError> {
    let terminal = storage
        .list_artifacts()?
        .iter()
        .filter(|filename| Artifact::is_final(prefix, filename))
        .filter_map(|filename| {
            let stem = filename.replacen("_final", "", 1);
            Artifact::parse_sequence(prefix, &stem)
        })
        .max();
    Ok(terminal)
}

///
/// Reconciles the artifact store with the audit log after a restart.
///
/// An artifact is part of the chain only once its log entry is durable. Any artifact
/// beyond the last logged sequence was written by a transition that never completed,
/// and is moved out of the published store. The chain head is the last logged sequence.
///
pub fn recover(storage: &mut dyn Storage, prefix: &str) -> Result<ChainState, CoordinatorError> {
    // Fetch every chain artifact in the store.
    let mut sequences: Vec<u64> = storage
        .list_artifacts()?
        .iter()
        .filter_map(|filename| Artifact::parse_sequence(prefix, filename))
        .collect();
    sequences.sort_unstable();
    debug!("Found {} chain artifacts in storage", sequences.len());

    // Check that the seed artifact exists.
    if sequences.first() != Some(&0) {
        error!("The seed artifact {} is missing", Artifact::filename(prefix, 0));
        return Err(CoordinatorError::SeedArtifactMissing);
    }

    // Check that the artifact sequence is gapless.
    for (expected, sequence) in sequences.iter().enumerate() {
        if *sequence != expected as u64 {
            error!("Artifact {} is missing from the chain", expected);
            return Err(CoordinatorError::ArtifactSequenceGap(expected as u64));
        }
    }
    let max = *sequences.last().unwrap_or(&0);

    // Check that the audit log numbers its entries 1, 2, 3, ... in order.
    let log = storage.read_log()?;
    for (index, entry) in log.iter().enumerate() {
        let expected = index as u64 + 1;
        if entry.sequence_number() != expected {
            return Err(CoordinatorError::AuditLogCorrupted(format!(
                "entry {} has sequence number {}, expected {}",
                index + 1,
                entry.sequence_number(),
                expected
            )));
        }
    }
    let logged = log.len() as u64;

    // Check that every logged contribution has its artifact.
    if max < logged {
        error!("Audit log attests to sequence {} but the store ends at {}", logged, max);
        return Err(CoordinatorError::LoggedArtifactMissing(max + 1));
    }

    // Move aside any artifact written without a matching log entry.
    let mut orphans = 0;
    for sequence in (logged + 1)..=max {
        warn!("Artifact {} was never logged, discarding it", sequence);
        storage.quarantine(&Locator::Artifact(sequence))?;
        orphans += 1;
    }

    // Remove uploads that never reached verification.
    storage.clear_staging()?;

    let finalized_from = resolve_final(storage, prefix)?;
    if let Some(source) = finalized_from {
        info!("The ceremony was finalized from artifact {}", source);
    }

    info!("Recovered the chain at head {} with {} log entries", logged, log.len());
    Ok(ChainState {
        head: logged,
        log,
        finalized_from,
        orphans,
    })
}
