use crate::{objects::calculate_file_hash, CoordinatorError};

use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// The fixed constraint system the proving key is prepared for.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CircuitDescriptor {
    path: PathBuf,
    hash: String,
}

impl CircuitDescriptor {
    /// Loads the single `*.r1cs` file in the given directory.
    pub fn load(directory: &Path) -> Result<Self, CoordinatorError> {
        let path = match find_single_file(directory, "r1cs")? {
            (0, _) => return Err(CoordinatorError::CircuitMissing),
            (1, Some(path)) => path,
            (count, _) => return Err(CoordinatorError::CircuitDuplicate(count)),
        };
        let hash = calculate_file_hash(&path)?;
        debug!("Loaded circuit {:?} with hash {}", path, hash);
        Ok(Self { path, hash })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// The fixed phase 1 parameters the ceremony builds upon.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SetupParameters {
    path: PathBuf,
    hash: String,
}

impl SetupParameters {
    /// Loads the single `*.ptau` file in the given directory.
    pub fn load(directory: &Path) -> Result<Self, CoordinatorError> {
        let path = match find_single_file(directory, "ptau")? {
            (0, _) => return Err(CoordinatorError::SetupParametersMissing),
            (1, Some(path)) => path,
            (count, _) => return Err(CoordinatorError::SetupParametersDuplicate(count)),
        };
        let hash = calculate_file_hash(&path)?;
        debug!("Loaded setup parameters {:?} with hash {}", path, hash);
        Ok(Self { path, hash })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Returns the number of files with the given extension, and the first one found.
fn find_single_file(directory: &Path, extension: &str) -> Result<(usize, Option<PathBuf>), CoordinatorError> {
    if !directory.exists() {
        error!("Directory {:?} does not exist", directory);
        return Ok((0, None));
    }

    let mut matches: Vec<PathBuf> = fs_err::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map_or(false, |e| e == extension))
        .collect();
    matches.sort();

    Ok((matches.len(), matches.into_iter().next()))
}
