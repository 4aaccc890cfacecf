use crate::{
    environment::Environment,
    objects::{Artifact, LogEntry},
    storage::{Locator, Storage},
    CoordinatorError,
};

use fs2::FileExt;
use fs_err::{File, OpenOptions};
use std::{
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing::{debug, trace, warn};

#[derive(Debug)]
pub struct Disk {
    prefix: String,
    keys_directory: PathBuf,
    staging_directory: PathBuf,
    discarded_directory: PathBuf,
    audit_log: PathBuf,
    finalization_record: PathBuf,
    staged_counter: u64,
    /// Held for the lifetime of the store. The lock is released when the file is closed.
    _lock: File,
}

impl Storage for Disk {
    /// Loads a new instance of `Disk`.
    #[inline]
    fn load(environment: &Environment) -> Result<Self, CoordinatorError> {
        // Check that no other process owns the ceremony root.
        fs_err::create_dir_all(environment.local_base_directory())?;
        let lock = Self::acquire_lock(&environment.lock_path())?;

        let storage = Self {
            prefix: environment.artifact_prefix().to_string(),
            keys_directory: environment.keys_directory(),
            staging_directory: environment.staging_directory(),
            discarded_directory: environment.discarded_directory(),
            audit_log: environment.audit_log_path(),
            finalization_record: environment.finalization_record_path(),
            staged_counter: 0,
            _lock: lock,
        };

        // Create the directory layout if it does not exist.
        for directory in &[
            environment.keys_directory(),
            environment.contributions_directory(),
            environment.staging_directory(),
            environment.discarded_directory(),
        ] {
            if !directory.exists() {
                debug!("Creating {:?} in {} mode", directory, environment.mode());
                fs_err::create_dir_all(directory)?;
            }
        }

        // Create the audit log if it does not exist.
        if !storage.audit_log.exists() {
            File::create(&storage.audit_log)?;
        }

        storage.repair_torn_log()?;

        Ok(storage)
    }

    fn to_path(&self, locator: &Locator) -> PathBuf {
        match locator {
            Locator::Artifact(sequence) => self.keys_directory.join(Artifact::filename(&self.prefix, *sequence)),
            Locator::FinalArtifact(sequence) => self
                .keys_directory
                .join(Artifact::final_filename(&self.prefix, *sequence)),
            Locator::Staged(name) => self.staging_directory.join(name),
            Locator::AuditLog => self.audit_log.clone(),
            Locator::FinalizationRecord => self.finalization_record.clone(),
        }
    }

    #[inline]
    fn exists(&self, locator: &Locator) -> bool {
        self.to_path(locator).exists()
    }

    fn list_artifacts(&self) -> Result<Vec<String>, CoordinatorError> {
        let mut filenames: Vec<String> = fs_err::read_dir(&self.keys_directory)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        filenames.sort();
        Ok(filenames)
    }

    fn stage(&mut self, bytes: &[u8]) -> Result<Locator, CoordinatorError> {
        let locator = self.reserve_staged()?;
        let path = self.to_path(&locator);

        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        file.sync_all()?;

        trace!("Staged {} bytes at {:?}", bytes.len(), path);
        Ok(locator)
    }

    fn reserve_staged(&mut self) -> Result<Locator, CoordinatorError> {
        self.staged_counter += 1;
        let name = format!(
            "upload-{}-{}.zkey",
            OffsetDateTime::now_utc().unix_timestamp_nanos(),
            self.staged_counter
        );
        Ok(Locator::Staged(name))
    }

    fn commit(&mut self, staged: &Locator, destination: &Locator) -> Result<(), CoordinatorError> {
        let source = self.to_path(staged);
        let target = self.to_path(destination);

        // Check that the published location is vacant. Artifacts are never overwritten.
        if target.exists() {
            return match destination {
                Locator::Artifact(sequence) | Locator::FinalArtifact(sequence) => {
                    Err(CoordinatorError::ArtifactAlreadyExists(*sequence))
                }
                _ => Err(CoordinatorError::StorageFailed(format!("{} already exists", destination))),
            };
        }

        // A rename within one filesystem makes the file visible only once it is complete.
        fs_err::rename(&source, &target)?;

        debug!("Committed {:?} to {:?}", source, target);
        Ok(())
    }

    fn discard(&mut self, staged: &Locator) -> Result<(), CoordinatorError> {
        match staged {
            Locator::Staged(_) => {
                let path = self.to_path(staged);
                if path.exists() {
                    fs_err::remove_file(&path)?;
                    trace!("Discarded {:?}", path);
                }
                Ok(())
            }
            _ => Err(CoordinatorError::StorageFailed(format!("{} is not a staged upload", staged))),
        }
    }

    fn clear_staging(&mut self) -> Result<usize, CoordinatorError> {
        let mut count = 0;
        for entry in fs_err::read_dir(&self.staging_directory)? {
            let path = entry?.path();
            if path.is_file() {
                fs_err::remove_file(&path)?;
                count += 1;
            }
        }
        if count > 0 {
            warn!("Removed {} leftover staged uploads", count);
        }
        Ok(count)
    }

    fn quarantine(&mut self, locator: &Locator) -> Result<PathBuf, CoordinatorError> {
        let source = self.to_path(locator);
        let filename = match source.file_name() {
            Some(filename) => filename.to_string_lossy().to_string(),
            None => return Err(CoordinatorError::StorageFailed(format!("{} has no filename", locator))),
        };

        let mut target = self.discarded_directory.join(&filename);
        if target.exists() {
            let tag = OffsetDateTime::now_utc().unix_timestamp();
            target = self.discarded_directory.join(format!("{}_{}", filename, tag));
        }

        fs_err::rename(&source, &target)?;

        warn!("Moved {:?} to {:?}", source, target);
        Ok(target)
    }

    fn append_log(&mut self, entry: &LogEntry) -> Result<(), CoordinatorError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new().append(true).create(true).open(&self.audit_log)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        trace!("Appended sequence {} to the audit log", entry.sequence_number());
        Ok(())
    }

    fn read_log(&self) -> Result<Vec<LogEntry>, CoordinatorError> {
        let reader = BufReader::new(File::open(&self.audit_log)?);

        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    return Err(CoordinatorError::AuditLogCorrupted(format!(
                        "line {}: {}",
                        index + 1,
                        error
                    )));
                }
            }
        }
        Ok(entries)
    }

    fn write_record(&mut self, locator: &Locator, bytes: &[u8]) -> Result<(), CoordinatorError> {
        let target = self.to_path(locator);
        let staged = self.stage(bytes)?;
        if let Err(error) = fs_err::rename(self.to_path(&staged), &target) {
            self.discard(&staged)?;
            return Err(error.into());
        }
        Ok(())
    }
}

impl Disk {
    /// Opens the lock file at the given path and takes an exclusive lock on it without blocking.
    fn acquire_lock(path: &Path) -> Result<File, CoordinatorError> {
        let lock = OpenOptions::new().create(true).write(true).open(path)?;
        if let Err(error) = lock.file().try_lock_exclusive() {
            warn!("Unable to lock {:?}: {}", path, error);
            return Err(CoordinatorError::StorageLocked(path.display().to_string()));
        }
        trace!("Locked {:?}", path);
        Ok(lock)
    }

    ///
    /// Truncates an unterminated final line of the audit log.
    ///
    /// Entries are appended with a trailing newline, so an unterminated line
    /// can only be the remains of an interrupted append.
    ///
    fn repair_torn_log(&self) -> Result<(), CoordinatorError> {
        let mut contents = Vec::new();
        File::open(&self.audit_log)?.read_to_end(&mut contents)?;

        if contents.is_empty() || contents.ends_with(b"\n") {
            return Ok(());
        }

        let keep = match contents.iter().rposition(|byte| *byte == b'\n') {
            Some(position) => position + 1,
            None => 0,
        };
        warn!(
            "Audit log ends with an interrupted append, truncating {} bytes",
            contents.len() - keep
        );

        let file = OpenOptions::new().write(true).open(&self.audit_log)?;
        file.set_len(keep as u64)?;
        file.sync_data()?;
        Ok(())
    }

    /// Returns the directory holding the published artifacts.
    #[inline]
    pub fn keys_directory(&self) -> &Path {
        &self.keys_directory
    }
}
