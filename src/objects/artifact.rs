use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::{self, Read},
    path::Path,
};

const ARTIFACT_EXTENSION: &str = "zkey";
const FINAL_SUFFIX: &str = "_final";

/// A reference to one immutable proving key in the artifact chain.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    sequence: u64,
    filename: String,
}

impl Artifact {
    #[inline]
    pub fn new(prefix: &str, sequence: u64) -> Self {
        Self {
            sequence,
            filename: Self::filename(prefix, sequence),
        }
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn filename(prefix: &str, sequence: u64) -> String {
        format!("{}_{:04}.{}", prefix, sequence, ARTIFACT_EXTENSION)
    }

    /// Returns the filename of the terminal artifact derived from the given sequence.
    #[inline]
    pub fn final_filename(prefix: &str, sequence: u64) -> String {
        format!("{}_{:04}{}.{}", prefix, sequence, FINAL_SUFFIX, ARTIFACT_EXTENSION)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.filename
    }

    /// Returns the public download path of this artifact.
    #[inline]
    pub fn url_path(&self) -> String {
        format!("/artifacts/{}", self.filename)
    }

    ///
    /// Parses the sequence number embedded in a chain artifact filename.
    ///
    /// Returns `None` for terminal artifacts and for any file that is not the
    /// canonical `<prefix>_<digits>.zkey` name of its sequence number.
    ///
    pub fn parse_sequence(prefix: &str, filename: &str) -> Option<u64> {
        let stem = filename.strip_suffix(ARTIFACT_EXTENSION)?.strip_suffix('.')?;
        let digits = stem.strip_prefix(prefix)?.strip_prefix('_')?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let sequence = digits.parse().ok()?;

        // Only one filename may denote a sequence number.
        match Self::filename(prefix, sequence) == filename {
            true => Some(sequence),
            false => None,
        }
    }

    /// Returns `true` if the given filename names a terminal artifact.
    pub fn is_final(prefix: &str, filename: &str) -> bool {
        match filename
            .strip_suffix(ARTIFACT_EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .and_then(|stem| stem.strip_suffix(FINAL_SUFFIX))
        {
            Some(stem) => Self::parse_sequence(prefix, &format!("{}.{}", stem, ARTIFACT_EXTENSION)).is_some(),
            None => false,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename)
    }
}

/// Returns the BLAKE2b-512 digest of the given bytes.
pub fn calculate_hash(input: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b::new();
    hasher.update(input);
    hasher.finalize().to_vec()
}

/// Returns the hex-encoded BLAKE2b-512 digest of the file at the given path.
pub fn calculate_file_hash(path: &Path) -> io::Result<String> {
    let mut file = fs_err::File::open(path)?;
    let mut hasher = Blake2b::new();
    let mut buffer = vec![0u8; 1 << 16];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
