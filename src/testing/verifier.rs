use crate::{
    commands::{Beacon, ContributionVerifier},
    CoordinatorError,
};

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::{channel, Receiver, Sender},
        Mutex,
    },
};

///
/// A deterministic stand-in for the external verifier.
///
/// A contribution is valid if it strictly extends the bytes of the previous artifact.
/// The beacon appends the derived beacon to the previous artifact, and the end to end
/// check requires the artifact to begin with the seed.
///
#[derive(Debug)]
pub struct MockVerifier {
    seed: Vec<u8>,
    reject_final: AtomicBool,
    verifications: AtomicUsize,
}

impl MockVerifier {
    pub fn new(seed: &[u8]) -> Self {
        Self {
            seed: seed.to_vec(),
            reject_final: AtomicBool::new(false),
            verifications: AtomicUsize::new(0),
        }
    }

    /// Makes every end to end check fail until reset.
    pub fn set_reject_final(&self, reject: bool) {
        self.reject_final.store(reject, Ordering::SeqCst);
    }

    /// Returns the number of contributions checked so far.
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

impl ContributionVerifier for MockVerifier {
    fn name(&self) -> String {
        "mock".to_string()
    }

    fn verify_contribution(&self, previous: &Path, next: &Path) -> Result<(), CoordinatorError> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        let previous = fs_err::read(previous)?;
        let next = fs_err::read(next)?;
        match next.len() > previous.len() && next.starts_with(&previous) {
            true => Ok(()),
            false => Err(CoordinatorError::VerificationFailed(
                "the contribution does not extend the previous artifact".to_string(),
            )),
        }
    }

    fn apply_beacon(
        &self,
        previous: &Path,
        output: &Path,
        beacon: &str,
        iterations: u32,
        _name: &str,
    ) -> Result<(), CoordinatorError> {
        let mut bytes = fs_err::read(previous)?;
        bytes.extend_from_slice(&Beacon::parse(beacon)?.derive(iterations));
        fs_err::write(output, bytes)?;
        Ok(())
    }

    fn verify_from_circuit(&self, _circuit: &Path, _setup: &Path, artifact: &Path) -> Result<(), CoordinatorError> {
        if self.reject_final.load(Ordering::SeqCst) {
            return Err(CoordinatorError::FinalizationFailed("rejected by the mock verifier".to_string()));
        }
        let bytes = fs_err::read(artifact)?;
        match bytes.starts_with(&self.seed) {
            true => Ok(()),
            false => Err(CoordinatorError::FinalizationFailed(
                "the artifact does not descend from the seed".to_string(),
            )),
        }
    }
}

///
/// A `MockVerifier` that holds every contribution check until it is released.
///
/// Each message on the release channel lets one check proceed. If the sender is
/// dropped, pending and future checks fail.
///
#[derive(Debug)]
pub struct GatedVerifier {
    inner: MockVerifier,
    gate: Mutex<Receiver<()>>,
}

impl GatedVerifier {
    /// Returns the verifier and the sender that releases its checks.
    pub fn new(seed: &[u8]) -> (Self, Sender<()>) {
        let (release, gate) = channel();
        let verifier = Self {
            inner: MockVerifier::new(seed),
            gate: Mutex::new(gate),
        };
        (verifier, release)
    }
}

impl ContributionVerifier for GatedVerifier {
    fn name(&self) -> String {
        "gated".to_string()
    }

    fn verify_contribution(&self, previous: &Path, next: &Path) -> Result<(), CoordinatorError> {
        let released = match self.gate.lock() {
            Ok(gate) => gate.recv().is_ok(),
            Err(_) => false,
        };
        match released {
            true => self.inner.verify_contribution(previous, next),
            false => Err(CoordinatorError::VerificationFailed("the gate was closed".to_string())),
        }
    }

    fn apply_beacon(
        &self,
        previous: &Path,
        output: &Path,
        beacon: &str,
        iterations: u32,
        name: &str,
    ) -> Result<(), CoordinatorError> {
        self.inner.apply_beacon(previous, output, beacon, iterations, name)
    }

    fn verify_from_circuit(&self, circuit: &Path, setup: &Path, artifact: &Path) -> Result<(), CoordinatorError> {
        self.inner.verify_from_circuit(circuit, setup, artifact)
    }
}
