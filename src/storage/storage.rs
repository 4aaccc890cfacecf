use crate::{environment::Environment, objects::LogEntry, CoordinatorError};

use std::{
    fmt,
    path::PathBuf,
    sync::{RwLockReadGuard, RwLockWriteGuard},
};

/// A data structure representing all possible locations of ceremony files.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Locator {
    /// A published chain artifact, by sequence number.
    Artifact(u64),
    /// The terminal artifact derived from the given sequence number.
    FinalArtifact(u64),
    /// An unpublished upload awaiting verification, by staging name.
    Staged(String),
    /// The append-only audit log.
    AuditLog,
    /// The record of a successful finalization.
    FinalizationRecord,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Artifact(sequence) => write!(f, "artifact {}", sequence),
            Locator::FinalArtifact(sequence) => write!(f, "final artifact from {}", sequence),
            Locator::Staged(name) => write!(f, "staged upload {}", name),
            Locator::AuditLog => write!(f, "audit log"),
            Locator::FinalizationRecord => write!(f, "finalization record"),
        }
    }
}

pub type StorageReader<'a> = RwLockReadGuard<'a, Box<dyn Storage>>;
pub type StorageWriter<'a> = RwLockWriteGuard<'a, Box<dyn Storage>>;

/// A standard model for the artifact store and audit log.
///
/// Artifacts and log entries are append-only. Nothing here overwrites
/// or deletes a published artifact or a logged entry.
pub trait Storage: Send + Sync {
    /// Loads a new instance of `Storage`, creating its layout if absent.
    fn load(environment: &Environment) -> Result<Self, CoordinatorError>
    where
        Self: Sized;

    /// Returns the file path of the given locator.
    fn to_path(&self, locator: &Locator) -> PathBuf;

    /// Returns `true` if a given locator exists in storage. Otherwise, returns `false`.
    fn exists(&self, locator: &Locator) -> bool;

    /// Returns the filenames currently visible in the artifact store.
    fn list_artifacts(&self) -> Result<Vec<String>, CoordinatorError>;

    /// Writes the given bytes to a fresh unpublished location and returns its locator.
    fn stage(&mut self, bytes: &[u8]) -> Result<Locator, CoordinatorError>;

    /// Allocates a fresh unpublished location without writing to it.
    fn reserve_staged(&mut self) -> Result<Locator, CoordinatorError>;

    /// Moves a staged upload into the artifact store at the given locator.
    /// Fails if the destination already exists.
    fn commit(&mut self, staged: &Locator, destination: &Locator) -> Result<(), CoordinatorError>;

    /// Removes a staged upload.
    fn discard(&mut self, staged: &Locator) -> Result<(), CoordinatorError>;

    /// Removes every leftover staged upload, returning how many were removed.
    fn clear_staging(&mut self) -> Result<usize, CoordinatorError>;

    /// Moves an unlogged artifact out of the published store.
    fn quarantine(&mut self, locator: &Locator) -> Result<PathBuf, CoordinatorError>;

    /// Appends an entry to the audit log and flushes it to disk.
    fn append_log(&mut self, entry: &LogEntry) -> Result<(), CoordinatorError>;

    /// Returns every entry in the audit log, in order.
    fn read_log(&self) -> Result<Vec<LogEntry>, CoordinatorError>;

    /// Atomically writes the given bytes at the locator.
    fn write_record(&mut self, locator: &Locator, bytes: &[u8]) -> Result<(), CoordinatorError>;
}
