use crate::{
    commands::{Beacon, FinalizationOptions, DEFAULT_BEACON_ITERATIONS, DEFAULT_FINAL_NAME},
    environment::Environment,
    notifications::ServerEvent,
    objects::{calculate_file_hash, FinalizationRecord, LogEntry, Participant, ParticipantState},
    testing::prelude::*,
    CeremonyPhase,
    Coordinator,
    CoordinatorStatus,
};

use std::{sync::Arc, time::Duration};
use time::OffsetDateTime;
use tokio::task::JoinHandle;


/// A point in time after every turn deadline in these tests.
fn after_deadline() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::from_secs(3600)
}

fn join(coordinator: &Coordinator, name: &str) -> anyhow::Result<Participant> {
    let participant = Participant::new(name, 64);
    coordinator.join(participant.clone())?;
    Ok(participant)
}

fn read_artifact(environment: &Environment, filename: &str) -> anyhow::Result<Vec<u8>> {
    Ok(fs_err::read(environment.keys_directory().join(filename))?)
}

/// Waits until the given participant's submission is under verification.
async fn wait_for_verification(coordinator: &Coordinator, participant: &Participant) -> anyhow::Result<()> {
    for _ in 0..500 {
        if coordinator.phase()? == CeremonyPhase::Verifying(participant.id()) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("{} never reached verification", participant.id())
}

fn submit_in_background(
    coordinator: &Coordinator,
    participant: &Participant,
    artifact: Vec<u8>,
) -> JoinHandle<Result<LogEntry, CoordinatorError>> {
    let coordinator = coordinator.clone();
    let id = participant.id();
    tokio::spawn(async move { coordinator.submit_contribution(id, artifact).await })
}

async fn sequential_contributions_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = test_coordinator(&environment, notifier.clone())?;

    // Participants A, B, and C join in order.
    let a = join(&coordinator, "A")?;
    let b = join(&coordinator, "B")?;
    let c = join(&coordinator, "C")?;
    assert_eq!(3, coordinator.queue_length()?);
    assert_eq!(CeremonyPhase::ActiveTurn(a.id()), coordinator.phase()?);
    assert_eq!(Some(1), coordinator.queue_position(b.id())?);
    assert_eq!(Some(2), coordinator.queue_position(c.id())?);

    // A submits a valid contribution and B is granted the turn.
    let first = extend(TEST_SEED, b"A");
    let entry = coordinator.submit_contribution(a.id(), first.clone()).await?;
    assert_eq!(1, entry.sequence_number());
    assert_eq!(1, coordinator.chain_head()?);
    assert_eq!(Some(ParticipantState::ActiveTurn), coordinator.participant_state(b.id())?);
    assert!(matches!(
        notifier.last_for(a.id()),
        Some(ServerEvent::Accepted { sequence: 1, .. })
    ));
    assert!(matches!(
        notifier.last_for(b.id()),
        Some(ServerEvent::YourTurn { sequence: 1, .. })
    ));

    // B times out and C is granted the turn.
    coordinator.update_at(after_deadline())?;
    assert_eq!(Some(ServerEvent::TimedOut), notifier.last_for(b.id()));
    assert_eq!(None, coordinator.participant_state(b.id())?);
    assert_eq!(CeremonyPhase::ActiveTurn(c.id()), coordinator.phase()?);
    assert_eq!(1, coordinator.chain_head()?);

    // B can no longer submit.
    assert!(matches!(
        coordinator.submit_contribution(b.id(), extend(&first, b"B")).await,
        Err(CoordinatorError::NotYourTurn)
    ));

    // C submits a valid contribution.
    let second = extend(&first, b"C");
    coordinator.submit_contribution(c.id(), second.clone()).await?;
    assert_eq!(2, coordinator.chain_head()?);
    assert_eq!(CeremonyPhase::Idle, coordinator.phase()?);

    // The audit log holds A and C, in order.
    let log = coordinator.audit_log()?;
    assert_eq!(2, log.len());
    assert_eq!(("A", 1), (log[0].display_name(), log[0].sequence_number()));
    assert_eq!(("C", 2), (log[1].display_name(), log[1].sequence_number()));

    assert_eq!(first, read_artifact(&environment, "circuit_0001.zkey")?);
    assert_eq!(second, read_artifact(&environment, "circuit_0002.zkey")?);
    assert_eq!(coordinator.head_artifact()?.name(), "circuit_0002.zkey");
    Ok(())
}

async fn invalid_contribution_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = test_coordinator(&environment, notifier.clone())?;

    let a = join(&coordinator, "A")?;
    let b = join(&coordinator, "B")?;

    // A submits bytes that do not extend the seed.
    let result = coordinator.submit_contribution(a.id(), b"forged".to_vec()).await;
    assert!(matches!(result, Err(CoordinatorError::VerificationFailed(_))));
    assert!(matches!(notifier.last_for(a.id()), Some(ServerEvent::Rejected { .. })));

    // The chain did not move, nothing was published, and B holds the turn on the seed.
    assert_eq!(0, coordinator.chain_head()?);
    assert!(coordinator.audit_log()?.is_empty());
    assert!(!environment.keys_directory().join("circuit_0001.zkey").exists());
    assert_eq!(0, fs_err::read_dir(environment.staging_directory())?.count());
    assert!(matches!(
        notifier.last_for(b.id()),
        Some(ServerEvent::YourTurn { sequence: 0, .. })
    ));

    // A submitting twice is refused.
    assert!(matches!(
        coordinator.submit_contribution(a.id(), extend(TEST_SEED, b"A")).await,
        Err(CoordinatorError::NotYourTurn)
    ));
    Ok(())
}

async fn oversized_contribution_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let mut settings = test_environment(root.path()).settings().clone();
    settings.maximum_artifact_size = TEST_SEED.len() + 4;
    let environment = Environment::Test(settings);
    let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;

    let a = join(&coordinator, "A")?;
    let result = coordinator
        .submit_contribution(a.id(), extend(TEST_SEED, b"too large"))
        .await;
    assert!(matches!(result, Err(CoordinatorError::ArtifactTooLarge(_, _))));

    // The oversized upload does not cost A the turn.
    assert_eq!(CeremonyPhase::ActiveTurn(a.id()), coordinator.phase()?);
    coordinator.submit_contribution(a.id(), extend(TEST_SEED, b"A")).await?;
    assert_eq!(1, coordinator.chain_head()?);
    Ok(())
}

async fn leave_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = test_coordinator(&environment, notifier.clone())?;

    let a = join(&coordinator, "A")?;
    let b = join(&coordinator, "B")?;
    let c = join(&coordinator, "C")?;

    // B leaving from the queue moves C up.
    coordinator.leave(b.id())?;
    assert_eq!(Some(1), coordinator.queue_position(c.id())?);
    assert_eq!(
        Some(ServerEvent::QueuePosition {
            position: 1,
            queue_length: 2
        }),
        notifier.last_for(c.id())
    );

    // A leaving during their turn hands it to C.
    coordinator.leave(a.id())?;
    assert_eq!(CeremonyPhase::ActiveTurn(c.id()), coordinator.phase()?);
    assert!(matches!(coordinator.leave(a.id()), Err(CoordinatorError::ParticipantNotFound)));

    // A reconnect is a new participant at the tail.
    let a_again = join(&coordinator, "A")?;
    assert_ne!(a.id(), a_again.id());
    assert_eq!(Some(1), coordinator.queue_position(a_again.id())?);
    assert_eq!(0, coordinator.chain_head()?);
    Ok(())
}

async fn restart_recovery_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let first = extend(TEST_SEED, b"A");
    {
        let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;
        let a = join(&coordinator, "A")?;
        coordinator.submit_contribution(a.id(), first.clone()).await?;

        // Simulate a crash after an artifact write and before its log append.
        fs_err::write(
            environment.keys_directory().join("circuit_0002.zkey"),
            extend(&first, b"B"),
        )?;
        fs_err::write(environment.staging_directory().join("upload-1-1.zkey"), b"partial")?;
    }

    let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;
    assert_eq!(1, coordinator.chain_head()?);
    assert_eq!(1, coordinator.audit_log()?.len());
    assert!(!environment.keys_directory().join("circuit_0002.zkey").exists());
    assert!(environment.discarded_directory().join("circuit_0002.zkey").exists());
    assert_eq!(0, fs_err::read_dir(environment.staging_directory())?.count());

    // The next contribution lands on the logged head.
    let c = join(&coordinator, "C")?;
    coordinator.submit_contribution(c.id(), extend(&first, b"C")).await?;
    assert_eq!(2, coordinator.chain_head()?);
    assert_eq!(extend(&first, b"C"), read_artifact(&environment, "circuit_0002.zkey")?);
    assert_eq!("C", coordinator.audit_log()?[1].display_name());
    Ok(())
}

async fn storage_failure_halts_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = test_coordinator(&environment, notifier.clone())?;

    let a = join(&coordinator, "A")?;
    let b = join(&coordinator, "B")?;

    // Something outside the coordinator occupies the next artifact location.
    let foreign = environment.keys_directory().join("circuit_0001.zkey");
    fs_err::write(&foreign, b"foreign")?;

    let result = coordinator.submit_contribution(a.id(), extend(TEST_SEED, b"A")).await;
    assert!(matches!(result, Err(CoordinatorError::StorageFailed(_))));

    // The ceremony halts without advancing or granting further turns.
    assert!(matches!(coordinator.status()?, CoordinatorStatus::Halted(_)));
    assert_eq!(0, coordinator.chain_head()?);
    assert_eq!(CeremonyPhase::Idle, coordinator.phase()?);
    assert!(coordinator.audit_log()?.is_empty());
    assert_eq!(b"foreign".to_vec(), fs_err::read(&foreign)?);
    assert!(matches!(notifier.last_for(a.id()), Some(ServerEvent::Rejected { .. })));
    assert!(matches!(notifier.last_for(b.id()), Some(ServerEvent::Rejected { .. })));
    assert!(matches!(
        coordinator.join(Participant::new("C", 64)),
        Err(CoordinatorError::CeremonyHalted(_))
    ));
    Ok(())
}

async fn interrupted_log_append_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    {
        let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;
        let a = join(&coordinator, "A")?;

        // Make the audit log unwritable after the artifact is committed.
        fs_err::remove_file(environment.audit_log_path())?;
        fs_err::create_dir(environment.audit_log_path())?;

        let result = coordinator.submit_contribution(a.id(), extend(TEST_SEED, b"A")).await;
        assert!(matches!(result, Err(CoordinatorError::StorageFailed(_))));
        assert!(matches!(coordinator.status()?, CoordinatorStatus::Halted(_)));
        assert_eq!(0, coordinator.chain_head()?);
        assert!(environment.keys_directory().join("circuit_0001.zkey").exists());
    }

    // The operator repairs the log, and the unlogged artifact is discarded on restart.
    fs_err::remove_dir(environment.audit_log_path())?;
    let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;
    assert_eq!(0, coordinator.chain_head()?);
    assert_eq!(CoordinatorStatus::Serving, coordinator.status()?);
    assert!(!environment.keys_directory().join("circuit_0001.zkey").exists());
    Ok(())
}

async fn replay_test() -> anyhow::Result<()> {
    async fn run(names: &[&str]) -> anyhow::Result<Vec<(u64, String, String)>> {
        let root = tempfile::tempdir()?;
        let environment = test_environment(root.path());
        let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;

        let mut head = TEST_SEED.to_vec();
        for (index, name) in names.iter().enumerate() {
            let participant = join(&coordinator, name)?;
            // Every third participant submits an invalid contribution.
            let contribution = match index % 3 == 2 {
                true => b"invalid".to_vec(),
                false => extend(&head, name.as_bytes()),
            };
            if coordinator
                .submit_contribution(participant.id(), contribution.clone())
                .await
                .is_ok()
            {
                head = contribution;
            }
        }

        Ok(coordinator
            .audit_log()?
            .into_iter()
            .map(|entry| {
                (
                    entry.sequence_number(),
                    entry.display_name().to_string(),
                    entry.contribution_hash().to_string(),
                )
            })
            .collect())
    }

    let names = ["A", "B", "C", "D", "E", "F", "G"];
    let first = run(&names).await?;
    let second = run(&names).await?;
    assert_eq!(first, second);
    assert_eq!(5, first.len());
    for (index, (sequence, _, _)) in first.iter().enumerate() {
        assert_eq!(index as u64 + 1, *sequence);
    }
    Ok(())
}

async fn finalization_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let verifier = Arc::new(MockVerifier::new(TEST_SEED));
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = Coordinator::new(environment.clone(), verifier.clone(), notifier.clone())?;

    let a = join(&coordinator, "A")?;
    let first = extend(TEST_SEED, b"A");
    coordinator.submit_contribution(a.id(), first.clone()).await?;
    assert_eq!(1, verifier.verifications());

    let beacon = Beacon::parse("0000000000000000000a558a61ddc8ee4e488d647a747fe4dcc362fe2026c620")?;
    let options = FinalizationOptions::new(beacon.clone(), DEFAULT_BEACON_ITERATIONS, "")?;

    // Finalization waits for the active turn.
    let b = join(&coordinator, "B")?;
    assert!(matches!(
        coordinator.finalize(options.clone()).await,
        Err(CoordinatorError::CeremonyBusy)
    ));
    coordinator.leave(b.id())?;

    // A failed end to end check publishes nothing and leaves the ceremony closed.
    verifier.set_reject_final(true);
    assert!(matches!(
        coordinator.finalize(options.clone()).await,
        Err(CoordinatorError::FinalizationFailed(_))
    ));
    assert_eq!(CoordinatorStatus::Closed, coordinator.status()?);
    assert!(!environment.keys_directory().join("circuit_0001_final.zkey").exists());
    assert_eq!(0, fs_err::read_dir(environment.staging_directory())?.count());
    assert!(matches!(
        coordinator.join(Participant::new("C", 64)),
        Err(CoordinatorError::CeremonyFinalized)
    ));

    // A retry succeeds.
    verifier.set_reject_final(false);
    let record = coordinator.finalize(options.clone()).await?;
    assert_eq!(CoordinatorStatus::Finalized, coordinator.status()?);
    assert_eq!(1, record.source_sequence);
    assert_eq!("circuit_0001_final.zkey", record.artifact);
    assert_eq!(DEFAULT_FINAL_NAME, record.name);
    assert_eq!(hex::encode(beacon.derive(DEFAULT_BEACON_ITERATIONS)), record.derived_beacon);
    assert_eq!(
        extend(&first, &beacon.derive(DEFAULT_BEACON_ITERATIONS)),
        read_artifact(&environment, "circuit_0001_final.zkey")?
    );
    assert_eq!(
        calculate_file_hash(&environment.circuit_directory().join("circuit.r1cs"))?,
        record.circuit_hash
    );
    assert_eq!(
        calculate_file_hash(&environment.setup_directory().join("pot_08.ptau"))?,
        record.setup_hash
    );
    let written: FinalizationRecord = serde_json::from_slice(&fs_err::read(environment.finalization_record_path())?)?;
    assert_eq!(record, written);

    // The audit log is untouched, and finalization is one-shot.
    assert_eq!(1, coordinator.audit_log()?.len());
    assert!(matches!(
        coordinator.finalize(options).await,
        Err(CoordinatorError::CeremonyFinalized)
    ));

    // A restarted coordinator stays finalized.
    drop(coordinator);
    let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;
    assert_eq!(CoordinatorStatus::Finalized, coordinator.status()?);
    assert_eq!(1, coordinator.chain_head()?);
    Ok(())
}

async fn finalization_determinism_test() -> anyhow::Result<()> {
    async fn run(beacon: &str) -> anyhow::Result<String> {
        let root = tempfile::tempdir()?;
        let environment = test_environment(root.path());
        let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;

        let a = join(&coordinator, "A")?;
        coordinator.submit_contribution(a.id(), extend(TEST_SEED, b"A")).await?;

        let options = FinalizationOptions::new(Beacon::parse(beacon)?, DEFAULT_BEACON_ITERATIONS, "final")?;
        Ok(coordinator.finalize(options).await?.hash)
    }

    let first = run("0x0123456789abcdef").await?;
    assert_eq!(first, run("0123456789abcdef").await?);
    assert_ne!(first, run("0123456789abcdee").await?);
    Ok(())
}

async fn events_during_verification_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let (verifier, release) = GatedVerifier::new(TEST_SEED);
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = Coordinator::new(environment.clone(), Arc::new(verifier), notifier.clone())?;

    let a = join(&coordinator, "A")?;
    let first = extend(TEST_SEED, b"A");
    let submission = submit_in_background(&coordinator, &a, first.clone());
    wait_for_verification(&coordinator, &a).await?;

    // A second submission for the same turn is refused.
    assert!(matches!(
        coordinator.submit_contribution(a.id(), extend(TEST_SEED, b"again")).await,
        Err(CoordinatorError::ContributionAlreadySubmitted)
    ));

    // The deadline sweep does not forfeit a turn under verification.
    coordinator.update_at(after_deadline())?;
    assert_eq!(CeremonyPhase::Verifying(a.id()), coordinator.phase()?);
    assert_eq!(None, notifier.events_for(a.id()).into_iter().find(|event| *event == ServerEvent::TimedOut));

    // A participant joining now waits in the queue.
    let b = join(&coordinator, "B")?;
    assert_eq!(Some(ParticipantState::Queued), coordinator.participant_state(b.id())?);
    assert_eq!(Some(1), coordinator.queue_position(b.id())?);

    // Finalization waits for the verification.
    let options = FinalizationOptions::new(Beacon::parse("ff")?, DEFAULT_BEACON_ITERATIONS, "")?;
    assert!(matches!(
        coordinator.finalize(options).await,
        Err(CoordinatorError::CeremonyBusy)
    ));

    // Leaving during verification does not withdraw the contribution.
    coordinator.leave(a.id())?;
    assert_eq!(Some(ParticipantState::Abandoned), coordinator.participant_state(a.id())?);
    assert_eq!(CeremonyPhase::Verifying(a.id()), coordinator.phase()?);
    assert_eq!(0, coordinator.chain_head()?);

    release.send(())?;
    let entry = submission.await??;
    assert_eq!(1, entry.sequence_number());
    assert_eq!(1, coordinator.chain_head()?);
    assert_eq!(first, read_artifact(&environment, "circuit_0001.zkey")?);

    // Only then is the turn passed on.
    assert_eq!(CeremonyPhase::ActiveTurn(b.id()), coordinator.phase()?);
    assert!(matches!(
        notifier.last_for(b.id()),
        Some(ServerEvent::YourTurn { sequence: 1, .. })
    ));
    Ok(())
}

async fn second_coordinator_is_refused_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let live = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;

    let a = join(&live, "A")?;
    let upload = environment.staging_directory().join("upload-in-flight.zkey");
    fs_err::write(&upload, b"in flight")?;

    // A second coordinator over the same root, such as an operator finalizing, is refused.
    let error = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))
        .err()
        .expect("the ceremony root is locked");
    assert!(matches!(error, CoordinatorError::StorageLocked(_)));
    assert!(error.is_fatal());

    // The live ceremony is untouched.
    assert!(upload.exists());
    assert!(!environment.finalization_record_path().exists());
    live.submit_contribution(a.id(), extend(TEST_SEED, b"A")).await?;
    assert_eq!(1, live.chain_head()?);

    // Once the server stops, the ceremony can be finalized.
    drop(live);
    let operator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;
    let options = FinalizationOptions::new(Beacon::parse("ff")?, DEFAULT_BEACON_ITERATIONS, "")?;
    assert_eq!(1, operator.finalize(options).await?.source_sequence);
    Ok(())
}

async fn finalization_record_failure_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());
    let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;

    let a = join(&coordinator, "A")?;
    coordinator.submit_contribution(a.id(), extend(TEST_SEED, b"A")).await?;

    // Make the finalization record unwritable.
    fs_err::create_dir(environment.finalization_record_path())?;

    let options = FinalizationOptions::new(Beacon::parse("ff")?, DEFAULT_BEACON_ITERATIONS, "")?;
    assert!(coordinator.finalize(options.clone()).await.is_err());

    // Nothing was published, and nothing is left in staging.
    assert_eq!(CoordinatorStatus::Closed, coordinator.status()?);
    assert!(!environment.keys_directory().join("circuit_0001_final.zkey").exists());
    assert_eq!(0, fs_err::read_dir(environment.staging_directory())?.count());

    // After the operator clears the way, a retry publishes both.
    fs_err::remove_dir(environment.finalization_record_path())?;
    let record = coordinator.finalize(options).await?;
    assert_eq!(CoordinatorStatus::Finalized, coordinator.status()?);
    assert!(environment.keys_directory().join(&record.artifact).exists());
    assert!(environment.finalization_record_path().is_file());
    Ok(())
}

fn startup_preconditions_test() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let environment = test_environment(root.path());

    // A second setup parameters file is fatal.
    fs_err::write(environment.setup_directory().join("pot_09.ptau"), b"more powers")?;
    let error = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))
        .err()
        .expect("startup must fail");
    assert!(matches!(error, CoordinatorError::SetupParametersDuplicate(2)));
    assert!(error.is_fatal());
    fs_err::remove_file(environment.setup_directory().join("pot_09.ptau"))?;

    // A missing seed artifact is fatal.
    fs_err::remove_file(environment.keys_directory().join("circuit_0000.zkey"))?;
    let error = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))
        .err()
        .expect("startup must fail");
    assert!(matches!(error, CoordinatorError::SeedArtifactMissing));

    // With the seed restored, the coordinator starts on a fresh layout.
    fs_err::write(environment.keys_directory().join("circuit_0000.zkey"), TEST_SEED)?;
    let coordinator = test_coordinator(&environment, Arc::new(RecordingNotifier::default()))?;
    assert_eq!(0, coordinator.chain_head()?);
    assert!(environment.audit_log_path().exists());
    assert!(environment.staging_directory().exists());
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_sequential_contributions() {
    test_logger();
    sequential_contributions_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_invalid_contribution() {
    test_logger();
    invalid_contribution_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_oversized_contribution() {
    test_logger();
    oversized_contribution_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_leave() {
    test_logger();
    leave_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_restart_recovery() {
    test_logger();
    restart_recovery_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_storage_failure_halts() {
    test_logger();
    storage_failure_halts_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_interrupted_log_append() {
    test_logger();
    interrupted_log_append_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_replay() {
    test_logger();
    replay_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_finalization() {
    test_logger();
    finalization_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_finalization_determinism() {
    test_logger();
    finalization_determinism_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_events_during_verification() {
    test_logger();
    events_during_verification_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_second_coordinator_is_refused() {
    test_logger();
    second_coordinator_is_refused_test().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_finalization_record_failure() {
    test_logger();
    finalization_record_failure_test().await.unwrap();
}

#[test]
#[serial]
fn test_startup_preconditions() {
    test_logger();
    startup_preconditions_test().unwrap();
}
