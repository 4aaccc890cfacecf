use crate::CoordinatorError;

use fs_err::File;
use std::{
    convert::TryFrom,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

/// The magic bytes at the start of every proving key file.
const ZKEY_MAGIC: &[u8; 4] = b"zkey";
/// The section of a proving key holding its contribution history.
const CONTRIBUTIONS_SECTION: u32 = 10;
/// The length of the constraint system hash at the start of the contributions section.
const CS_HASH_LENGTH: usize = 64;
/// The largest contributions section read into memory.
const MAXIMUM_SECTION_SIZE: u64 = 1 << 26;

///
/// The contribution history embedded in a proving key.
///
/// Each contribution is stored in full, in order, after the hash of the constraint
/// system. A key that extends another key carries the exact bytes of its history
/// followed by its own contribution.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionHistory {
    cs_hash: Vec<u8>,
    count: u32,
    contributions: Vec<u8>,
}

impl ContributionHistory {
    /// Reads the contribution history of the proving key at the given path.
    pub fn read(path: &Path) -> Result<Self, CoordinatorError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|_| malformed(path, "truncated header"))?;
        if &magic != ZKEY_MAGIC {
            return Err(malformed(path, "not a proving key"));
        }
        let _version = read_u32(&mut reader, path)?;
        let sections = read_u32(&mut reader, path)?;

        for _ in 0..sections {
            let section = read_u32(&mut reader, path)?;
            let size = read_u64(&mut reader, path)?;

            if section != CONTRIBUTIONS_SECTION {
                let skip = i64::try_from(size).map_err(|_| malformed(path, "oversized section"))?;
                reader.seek(SeekFrom::Current(skip))?;
                continue;
            }

            if size > MAXIMUM_SECTION_SIZE || size < (CS_HASH_LENGTH + 4) as u64 {
                return Err(malformed(path, "invalid contributions section"));
            }
            let mut data = vec![0u8; size as usize];
            reader
                .read_exact(&mut data)
                .map_err(|_| malformed(path, "truncated contributions section"))?;

            let contributions = data.split_off(CS_HASH_LENGTH + 4);
            let mut count = [0u8; 4];
            count.copy_from_slice(&data[CS_HASH_LENGTH..]);
            data.truncate(CS_HASH_LENGTH);

            return Ok(Self {
                cs_hash: data,
                count: u32::from_le_bytes(count),
                contributions,
            });
        }

        Err(malformed(path, "no contributions section"))
    }

    /// Returns the number of contributions in the history.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    ///
    /// Checks that this history is `previous` followed by exactly one contribution.
    ///
    /// Returns the reason on failure.
    ///
    pub fn check_extends(&self, previous: &ContributionHistory) -> Result<(), String> {
        if self.cs_hash != previous.cs_hash {
            return Err("the proving key is for a different circuit".to_string());
        }
        if self.count != previous.count + 1 {
            return Err(format!(
                "the proving key has {} contributions, expected {}",
                self.count,
                previous.count + 1
            ));
        }
        if self.contributions.len() <= previous.contributions.len()
            || !self.contributions.starts_with(&previous.contributions)
        {
            return Err("the proving key does not extend the current head".to_string());
        }
        Ok(())
    }
}

fn malformed(path: &Path, reason: &str) -> CoordinatorError {
    CoordinatorError::VerificationFailed(format!("{} is malformed: {}", path.display(), reason))
}

fn read_u32<R: Read>(reader: &mut R, path: &Path) -> Result<u32, CoordinatorError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).map_err(|_| malformed(path, "truncated"))?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(reader: &mut R, path: &Path) -> Result<u64, CoordinatorError> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes).map_err(|_| malformed(path, "truncated"))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Writes a minimal proving key with the given constraint system hash byte and contributions.
#[cfg(test)]
pub(crate) fn write_test_zkey(path: &Path, circuit: u8, contributions: &[&[u8]]) {
    let mut section = vec![circuit; CS_HASH_LENGTH];
    section.extend_from_slice(&(contributions.len() as u32).to_le_bytes());
    for contribution in contributions {
        section.extend_from_slice(contribution);
    }

    let mut bytes = ZKEY_MAGIC.to_vec();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    // A header section, skipped by the reader.
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&4u64.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&CONTRIBUTIONS_SECTION.to_le_bytes());
    bytes.extend_from_slice(&(section.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&section);

    fs_err::write(path, bytes).unwrap();
}
