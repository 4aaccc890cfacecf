use crate::{
    environment::Environment,
    objects::{CircuitDescriptor, ContributionHistory, SetupParameters},
    CoordinatorError,
};

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, error, info, trace, warn};

///
/// The external cryptography that checks and transforms proving keys.
///
/// Every method is synchronous and may take minutes on large circuits,
/// so the coordinator only calls it from the blocking thread pool.
///
pub trait ContributionVerifier: Send + Sync {
    /// Returns the name of the verifier, for logging.
    fn name(&self) -> String;

    /// Checks that `next` is a valid contribution on top of `previous`.
    fn verify_contribution(&self, previous: &Path, next: &Path) -> Result<(), CoordinatorError>;

    /// Mixes the public beacon into `previous`, writing the terminal artifact to `output`.
    fn apply_beacon(
        &self,
        previous: &Path,
        output: &Path,
        beacon: &str,
        iterations: u32,
        name: &str,
    ) -> Result<(), CoordinatorError>;

    /// Checks the entire contribution history of `artifact` against the circuit and setup parameters.
    fn verify_from_circuit(&self, circuit: &Path, setup: &Path, artifact: &Path) -> Result<(), CoordinatorError>;
}

///
/// A verifier backed by the `snarkjs` command line.
///
/// A `snarkjs` proving key carries its full contribution history. `zkey verify` checks that
/// history against the circuit and setup parameters, but accepts any valid history, so the
/// link to the previous key is checked separately by comparing the two embedded histories.
///
#[derive(Debug, Clone)]
pub struct Snarkjs {
    program: PathBuf,
    circuit: PathBuf,
    setup: PathBuf,
}

impl Snarkjs {
    /// Creates a verifier for the circuit and setup parameters of the given environment.
    pub fn new(environment: &Environment) -> Result<Self, CoordinatorError> {
        let circuit = CircuitDescriptor::load(&environment.circuit_directory())?;
        let setup = SetupParameters::load(&environment.setup_directory())?;
        Ok(Self {
            program: PathBuf::from("snarkjs"),
            circuit: circuit.path().to_path_buf(),
            setup: setup.path().to_path_buf(),
        })
    }

    /// Sets the path of the `snarkjs` executable.
    pub fn with_program<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    /// Runs `snarkjs` with the given arguments, returning its output on failure.
    fn execute<I, S>(&self, arguments: I) -> Result<(), String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(arguments);
        trace!("Running {:?}", command);

        let output = command
            .output()
            .map_err(|error| format!("unable to run {}: {}", self.program.display(), error))?;

        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim().is_empty() {
            true => stdout.trim().lines().last().unwrap_or("no output").to_string(),
            false => stderr.trim().lines().last().unwrap_or("no output").to_string(),
        };
        Err(format!("{} exited with {}: {}", self.program.display(), output.status, reason))
    }
}

impl ContributionVerifier for Snarkjs {
    fn name(&self) -> String {
        "snarkjs".to_string()
    }

    fn verify_contribution(&self, previous: &Path, next: &Path) -> Result<(), CoordinatorError> {
        // Check that the previous artifact exists.
        if !previous.exists() {
            error!("The previous artifact {:?} does not exist", previous);
            return Err(CoordinatorError::VerificationFailed(format!(
                "missing previous artifact {}",
                previous.display()
            )));
        }

        // Check that the new key is the previous key plus exactly one contribution.
        let before = ContributionHistory::read(previous)?;
        let after = ContributionHistory::read(next)?;
        if let Err(reason) = after.check_extends(&before) {
            warn!("{:?} does not extend {:?}: {}", next, previous, reason);
            return Err(CoordinatorError::VerificationFailed(reason));
        }

        debug!("Verifying {:?} on top of {:?}", next, previous);
        self.execute(vec![
            OsStr::new("zkey"),
            OsStr::new("verify"),
            self.circuit.as_os_str(),
            self.setup.as_os_str(),
            next.as_os_str(),
        ])
        .map_err(CoordinatorError::VerificationFailed)
    }

    fn apply_beacon(
        &self,
        previous: &Path,
        output: &Path,
        beacon: &str,
        iterations: u32,
        name: &str,
    ) -> Result<(), CoordinatorError> {
        info!("Applying the beacon to {:?} with 2^{} iterations", previous, iterations);
        let iterations = iterations.to_string();
        let name = format!("-n={}", name);
        self.execute(vec![
            OsStr::new("zkey"),
            OsStr::new("beacon"),
            previous.as_os_str(),
            output.as_os_str(),
            OsStr::new(beacon),
            OsStr::new(&iterations),
            OsStr::new(&name),
        ])
        .map_err(CoordinatorError::FinalizationFailed)
    }

    fn verify_from_circuit(&self, circuit: &Path, setup: &Path, artifact: &Path) -> Result<(), CoordinatorError> {
        info!("Verifying {:?} from the circuit", artifact);
        self.execute(vec![
            OsStr::new("zkey"),
            OsStr::new("verify"),
            circuit.as_os_str(),
            setup.as_os_str(),
            artifact.as_os_str(),
        ])
        .map_err(CoordinatorError::FinalizationFailed)
    }
}
