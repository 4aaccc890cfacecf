use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The public record of a successful finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationRecord {
    /// The hex-encoded beacon, as supplied by the operator.
    pub beacon: String,
    /// The exponent of the number of beacon hash iterations.
    pub iterations: u32,
    /// The hex-encoded beacon after `2^iterations` rounds of SHA-256.
    pub derived_beacon: String,
    /// The display name of the final contribution.
    pub name: String,
    /// The sequence number of the artifact the beacon was applied to.
    pub source_sequence: u64,
    /// The filename of the terminal artifact.
    pub artifact: String,
    /// The hex-encoded BLAKE2b-512 hash of the terminal artifact.
    pub hash: String,
    /// The hex-encoded BLAKE2b-512 hash of the circuit constraint file.
    pub circuit_hash: String,
    /// The hex-encoded BLAKE2b-512 hash of the setup parameters file.
    pub setup_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
