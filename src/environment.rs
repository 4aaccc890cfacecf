use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// The fixed numeric parameters handed to every participant with their turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionParameters {
    /// The curve the proving key is defined over.
    pub curve: String,
    /// The exponent of the number of entropy mixing rounds a contributor applies.
    pub iterations: u32,
}

impl Default for ContributionParameters {
    fn default() -> Self {
        Self {
            curve: "bn128".to_string(),
            iterations: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// The port the ceremony server listens on.
    pub port: u16,
    /// The ceremony root directory.
    pub base_directory: PathBuf,
    /// The deadline a participant has to submit once granted a turn.
    pub turn_timeout: Duration,
    /// The period of the background sweep for expired turns.
    pub update_interval: Duration,
    /// The maximum size of an uploaded artifact, in bytes.
    pub maximum_artifact_size: usize,
    /// The maximum number of characters kept from a self-reported display name.
    pub maximum_display_name_length: usize,
    /// The file stem shared by every artifact in the chain.
    pub artifact_prefix: String,
    /// The parameters sent to a participant when they are granted a turn.
    pub contribution_parameters: ContributionParameters,
}

impl Settings {
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Self {
        Self {
            port: 3000,
            base_directory: base_directory.as_ref().to_path_buf(),
            turn_timeout: Duration::from_secs(15 * 60),
            update_interval: Duration::from_secs(1),
            maximum_artifact_size: 100_000_000,
            maximum_display_name_length: 64,
            artifact_prefix: "circuit".to_string(),
            contribution_parameters: ContributionParameters::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_turn_timeout(mut self, turn_timeout: Duration) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new("./ceremony")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Test(Settings),
    Development(Settings),
    Production(Settings),
}

impl Environment {
    /// Returns the settings of this environment.
    #[inline]
    pub fn settings(&self) -> &Settings {
        match self {
            Environment::Test(settings) => settings,
            Environment::Development(settings) => settings,
            Environment::Production(settings) => settings,
        }
    }

    /// Returns the logging verbosity of this environment.
    #[inline]
    pub fn verbosity(&self) -> tracing::Level {
        match self {
            Environment::Test(_) => tracing::Level::TRACE,
            Environment::Development(_) => tracing::Level::DEBUG,
            Environment::Production(_) => tracing::Level::INFO,
        }
    }

    /// Returns the mode name of this environment, for logging.
    #[inline]
    pub fn mode(&self) -> &'static str {
        match self {
            Environment::Test(_) => "test",
            Environment::Development(_) => "development",
            Environment::Production(_) => "production",
        }
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.settings().port
    }

    #[inline]
    pub fn turn_timeout(&self) -> Duration {
        self.settings().turn_timeout
    }

    #[inline]
    pub fn update_interval(&self) -> Duration {
        self.settings().update_interval
    }

    #[inline]
    pub fn maximum_artifact_size(&self) -> usize {
        self.settings().maximum_artifact_size
    }

    #[inline]
    pub fn maximum_display_name_length(&self) -> usize {
        self.settings().maximum_display_name_length
    }

    #[inline]
    pub fn artifact_prefix(&self) -> &str {
        &self.settings().artifact_prefix
    }

    #[inline]
    pub fn contribution_parameters(&self) -> &ContributionParameters {
        &self.settings().contribution_parameters
    }

    /// Returns the ceremony root directory.
    #[inline]
    pub fn local_base_directory(&self) -> &Path {
        &self.settings().base_directory
    }

    /// Returns the path of the lock file held by the process that owns the ceremony root.
    #[inline]
    pub fn lock_path(&self) -> PathBuf {
        self.local_base_directory().join("coordinator.lock")
    }

    /// Returns the directory holding the published, sequentially numbered artifacts.
    #[inline]
    pub fn keys_directory(&self) -> PathBuf {
        self.local_base_directory().join("keys")
    }

    /// Returns the directory holding the audit log.
    #[inline]
    pub fn contributions_directory(&self) -> PathBuf {
        self.local_base_directory().join("contributions")
    }

    /// Returns the path of the append-only audit log.
    #[inline]
    pub fn audit_log_path(&self) -> PathBuf {
        self.contributions_directory().join("contributions.jsonl")
    }

    /// Returns the path of the record written by a successful finalization.
    #[inline]
    pub fn finalization_record_path(&self) -> PathBuf {
        self.contributions_directory().join("final.json")
    }

    /// Returns the directory holding the setup parameters file.
    #[inline]
    pub fn setup_directory(&self) -> PathBuf {
        self.local_base_directory().join("ptau")
    }

    /// Returns the directory holding the circuit constraint file.
    #[inline]
    pub fn circuit_directory(&self) -> PathBuf {
        self.local_base_directory().join("circuits")
    }

    /// Returns the directory for unpublished uploads awaiting verification.
    #[inline]
    pub fn staging_directory(&self) -> PathBuf {
        self.local_base_directory().join("staging")
    }

    /// Returns the directory orphaned artifacts are moved into during recovery.
    #[inline]
    pub fn discarded_directory(&self) -> PathBuf {
        self.local_base_directory().join("discarded")
    }
}
