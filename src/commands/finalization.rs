use crate::{
    commands::ContributionVerifier,
    objects::{calculate_file_hash, Artifact, CircuitDescriptor, FinalizationRecord, SetupParameters},
    storage::{Locator, StorageWriter},
    CoordinatorError,
};

use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use time::OffsetDateTime;
use tracing::{debug, error, info};

pub const DEFAULT_BEACON_ITERATIONS: u32 = 10;
pub const DEFAULT_FINAL_NAME: &str = "Final Beacon phase2";

/// The range of iteration exponents accepted for the beacon.
const MINIMUM_BEACON_ITERATIONS: u32 = 10;
const MAXIMUM_BEACON_ITERATIONS: u32 = 63;

/// A public random value mixed into the last artifact of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon(Vec<u8>);

impl Beacon {
    ///
    /// Parses a hex-encoded beacon.
    ///
    /// An optional `0x` prefix is stripped. The beacon is rejected if it is empty,
    /// has an odd number of digits, or contains a non-hex character.
    ///
    pub fn parse(input: &str) -> Result<Self, CoordinatorError> {
        let digits = input.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);

        if digits.is_empty() {
            return Err(CoordinatorError::BeaconInvalid("the beacon is empty".to_string()));
        }
        if digits.len() % 2 != 0 {
            return Err(CoordinatorError::BeaconInvalid(format!(
                "the beacon has an odd number of hex digits ({})",
                digits.len()
            )));
        }

        let bytes = hex::decode(digits).map_err(|error| CoordinatorError::BeaconInvalid(error.to_string()))?;
        Ok(Self(bytes))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the beacon as lowercase hex, without a prefix.
    #[inline]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Returns the beacon after `2^iterations` rounds of SHA-256.
    pub fn derive(&self, iterations: u32) -> Vec<u8> {
        let mut current = self.0.clone();
        for _ in 0..(1u64 << iterations) {
            current = Sha256::digest(&current).to_vec();
        }
        current
    }
}

impl FromStr for Beacon {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Beacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The operator's inputs to a finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationOptions {
    beacon: Beacon,
    iterations: u32,
    name: String,
}

impl FinalizationOptions {
    pub fn new(beacon: Beacon, iterations: u32, name: &str) -> Result<Self, CoordinatorError> {
        // Check that the iteration exponent is within the range the verifier accepts.
        if !(MINIMUM_BEACON_ITERATIONS..=MAXIMUM_BEACON_ITERATIONS).contains(&iterations) {
            return Err(CoordinatorError::BeaconInvalid(format!(
                "the iteration exponent must be between {} and {}, found {}",
                MINIMUM_BEACON_ITERATIONS, MAXIMUM_BEACON_ITERATIONS, iterations
            )));
        }

        let name = match name.trim().is_empty() {
            true => DEFAULT_FINAL_NAME.to_string(),
            false => name.trim().to_string(),
        };

        Ok(Self {
            beacon,
            iterations,
            name,
        })
    }

    #[inline]
    pub fn beacon(&self) -> &Beacon {
        &self.beacon
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) struct Finalization;

impl Finalization {
    ///
    /// Applies the beacon to the artifact at `source_sequence` and publishes the terminal artifact.
    ///
    /// The terminal artifact is built in staging and checked end to end against the circuit
    /// and setup parameters. It is published only if that check passes.
    ///
    pub(crate) fn run(
        storage: &mut StorageWriter,
        verifier: &dyn ContributionVerifier,
        circuit: &CircuitDescriptor,
        setup: &SetupParameters,
        artifact_prefix: &str,
        source_sequence: u64,
        options: &FinalizationOptions,
    ) -> Result<FinalizationRecord, CoordinatorError> {
        info!("Starting finalization of artifact {}", source_sequence);

        let source = Locator::Artifact(source_sequence);
        let destination = Locator::FinalArtifact(source_sequence);

        // Check that the source artifact exists and the terminal artifact does not.
        if !storage.exists(&source) {
            return Err(CoordinatorError::FinalizationFailed(format!("{} is missing", source)));
        }
        if storage.exists(&destination) {
            return Err(CoordinatorError::FinalArtifactExists(Artifact::final_filename(
                artifact_prefix,
                source_sequence,
            )));
        }

        let derived_beacon = hex::encode(options.beacon().derive(options.iterations()));
        debug!("Derived beacon is {}", derived_beacon);

        // Build the terminal artifact in staging.
        let output = storage.reserve_staged()?;
        let source_path = storage.to_path(&source);
        let output_path = storage.to_path(&output);

        let result = verifier
            .apply_beacon(
                &source_path,
                &output_path,
                &options.beacon().to_hex(),
                options.iterations(),
                options.name(),
            )
            .and_then(|_| verifier.verify_from_circuit(circuit.path(), setup.path(), &output_path));

        if let Err(failure) = result {
            error!("Finalization of artifact {} failed: {}", source_sequence, failure);
            storage.discard(&output)?;
            return Err(match failure {
                CoordinatorError::FinalizationFailed(reason) => CoordinatorError::FinalizationFailed(reason),
                other => CoordinatorError::FinalizationFailed(other.to_string()),
            });
        }

        // Write the record before publishing, so a published terminal artifact always has one.
        let record = calculate_file_hash(&output_path)
            .map_err(CoordinatorError::from)
            .and_then(|hash| {
                let record = FinalizationRecord {
                    beacon: options.beacon().to_hex(),
                    iterations: options.iterations(),
                    derived_beacon,
                    name: options.name().to_string(),
                    source_sequence,
                    artifact: Artifact::final_filename(artifact_prefix, source_sequence),
                    hash,
                    circuit_hash: circuit.hash().to_string(),
                    setup_hash: setup.hash().to_string(),
                    timestamp: OffsetDateTime::now_utc(),
                };
                storage.write_record(&Locator::FinalizationRecord, &serde_json::to_vec_pretty(&record)?)?;
                Ok(record)
            });

        let record = match record {
            Ok(record) => record,
            Err(error) => {
                error!("Unable to record the finalization of artifact {}: {}", source_sequence, error);
                storage.discard(&output)?;
                return Err(error);
            }
        };

        // Publish the terminal artifact.
        if let Err(error) = storage.commit(&output, &destination) {
            error!("Unable to publish the terminal artifact: {}", error);
            storage.discard(&output)?;
            return Err(error);
        }

        info!("Finalized the ceremony as {} ({})", record.artifact, record.hash);
        Ok(record)
    }
}
