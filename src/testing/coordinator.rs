use crate::{
    environment::{Environment, Settings},
    notifications::Notifier,
    testing::MockVerifier,
    Coordinator,
    CoordinatorError,
};

use std::{path::Path, sync::Arc, time::Duration};
use tracing::info;

/// The bytes of the seed artifact in every test ceremony.
pub const TEST_SEED: &[u8] = b"circuit_0000 seed artifact";

/// The turn deadline of every test ceremony.
pub const TEST_TURN_TIMEOUT: Duration = Duration::from_secs(5);

/// Installs a global `TRACE` subscriber once per test binary.
pub fn test_logger() {
    use once_cell::sync::OnceCell;
    use tracing::Level;

    static INSTANCE: OnceCell<()> = OnceCell::new();
    INSTANCE.get_or_init(|| {
        let subscriber = tracing_subscriber::fmt().with_max_level(Level::TRACE).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("A global subscriber was already installed");
        }
    });
}

///
/// Returns a test environment rooted at the given directory.
///
/// The directory is populated with a setup parameters file, a circuit file,
/// and the seed artifact, as an offline preparation step would leave it.
///
pub fn test_environment(root: &Path) -> Environment {
    let environment = Environment::Test(Settings::new(root).with_turn_timeout(TEST_TURN_TIMEOUT));

    for directory in &[
        environment.setup_directory(),
        environment.circuit_directory(),
        environment.keys_directory(),
    ] {
        fs_err::create_dir_all(directory).unwrap();
    }
    fs_err::write(environment.setup_directory().join("pot_08.ptau"), b"powers of tau").unwrap();
    fs_err::write(environment.circuit_directory().join("circuit.r1cs"), b"constraints").unwrap();
    let seed = environment.keys_directory().join("circuit_0000.zkey");
    if !seed.exists() {
        fs_err::write(seed, TEST_SEED).unwrap();
    }

    environment
}

/// Returns a coordinator over the given environment with a `MockVerifier`.
pub fn test_coordinator(environment: &Environment, notifier: Arc<dyn Notifier>) -> Result<Coordinator, CoordinatorError> {
    info!("Starting coordinator");
    let coordinator = Coordinator::new(environment.clone(), Arc::new(MockVerifier::new(TEST_SEED)), notifier)?;
    info!("Coordinator is ready");
    Ok(coordinator)
}

/// Returns `previous` with `suffix` appended, which `MockVerifier` accepts as a contribution.
pub fn extend(previous: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut next = previous.to_vec();
    next.extend_from_slice(suffix);
    next
}
