//! End-to-end handshakes between participants connected by the in-memory network.

use std::{collections::BTreeSet, sync::Arc};

// Silence unused dependency warnings for these crates
use async_trait as _;
use borsh as _;
use futures as _;
use mockall as _;
use parking_lot as _;
use secp256k1 as _;
use serde as _;
use serde_json as _;
use thiserror as _;
use tracing as _;
use zeroize as _;

use strata_upgrade_protocol::{
    memory::{InMemoryEndpoint, InMemoryLedger, InMemoryNetwork},
    AcceptorOutcome, HandshakeConfig, InstigatorPhase, LocalKeyStore, Participant,
    ProtocolFailure, RejectionReason, UpgradeLedger,
};
use strata_upgrade_test_utils::{gen_secret_keys, gen_state_and_ref};
use strata_upgrade_types::{
    crypto::pubkey_from_secret, ContractId, ContractState, PubKey, StateAndRef,
};
use strata_upgrade_verify::{
    test_specs::RenameSpec, UpgradeRegistry, UpgradeSpecError, UpgradeSpecification,
    UpgradeVerifier, VerificationFailure,
};
use tokio::task::JoinHandle;

type Node = Participant<LocalKeyStore, InMemoryEndpoint, InMemoryLedger>;

/// Claims the upgraded state's payload for itself.
#[derive(Debug)]
struct GreedySpec;

impl UpgradeSpecification for GreedySpec {
    fn contract_id(&self) -> ContractId {
        "token-v2".into()
    }

    fn legacy_contract(&self) -> ContractId {
        "token-v1".into()
    }

    fn upgrade(&self, state: &ContractState) -> Result<ContractState, UpgradeSpecError> {
        Ok(ContractState::new(
            self.contract_id(),
            state.participants().to_vec(),
            b"all mine".to_vec(),
        ))
    }
}

fn honest_registry() -> UpgradeRegistry {
    UpgradeRegistry::new()
        .with(RenameSpec::new("token-v1", "token-v2"))
        .unwrap()
}

struct Setup {
    keys: Vec<PubKey>,
    nodes: Vec<Node>,
    original: StateAndRef,
}

impl Setup {
    fn new(n: usize, timeout_ms: u64) -> Self {
        Self::with_registries(n, timeout_ms, |_| honest_registry())
    }

    fn with_registries(
        n: usize,
        timeout_ms: u64,
        registry_for: impl Fn(usize) -> UpgradeRegistry,
    ) -> Self {
        let secrets = gen_secret_keys(n);
        let keys: Vec<_> = secrets
            .iter()
            .map(|sk| pubkey_from_secret(sk).unwrap())
            .collect();
        let original = gen_state_and_ref("token-v1", &keys);
        let mut network = InMemoryNetwork::new(&keys, 8);

        let nodes = (0..n)
            .map(|i| {
                Participant::new(
                    HandshakeConfig::new(timeout_ms),
                    UpgradeVerifier::new(Arc::new(registry_for(i))),
                    Arc::new(LocalKeyStore::from_secret_keys([secrets[i]]).unwrap()),
                    Arc::new(network.take_endpoint(&keys[i]).unwrap()),
                    Arc::new(InMemoryLedger::with_states([original.clone()])),
                )
            })
            .collect();

        Self {
            keys,
            nodes,
            original,
        }
    }

    fn upgrade_id() -> ContractId {
        "token-v2".into()
    }

    fn authorise(&self, idx: usize) {
        self.nodes[idx]
            .authorisations()
            .authorise(*self.original.state_ref(), Self::upgrade_id());
    }

    /// Starts participant `idx` answering participant 0.
    fn spawn_acceptor(&self, idx: usize) -> JoinHandle<Result<AcceptorOutcome, ProtocolFailure>> {
        let mut acceptor = self.nodes[idx].acceptor(self.keys[0]);
        tokio::spawn(async move { acceptor.run().await })
    }
}

#[tokio::test]
async fn test_two_party_upgrade_succeeds() {
    let setup = Setup::new(2, 2_000);
    setup.authorise(1);
    let acceptor = setup.spawn_acceptor(1);

    let mut instigator = setup.nodes[0].instigator();
    let signed = instigator
        .upgrade(&setup.original, &Setup::upgrade_id())
        .await
        .expect("upgrade succeeds");

    assert_eq!(instigator.phase(), InstigatorPhase::Complete);
    assert_eq!(
        signed.signers(),
        setup.keys.iter().copied().collect::<BTreeSet<_>>()
    );
    assert_eq!(setup.nodes[0].verifier().verify_signed(&signed), Ok(()));

    let outcome = acceptor.await.unwrap().expect("acceptor succeeds");
    assert_eq!(outcome, AcceptorOutcome::Recorded(signed.clone()));

    // Both participants hold the same replacement state, at output 0 of the upgrade.
    let new_ref = signed.tx().output_ref(0);
    for node in &setup.nodes {
        let ledger = node.ledger();
        assert!(ledger.is_consumed(setup.original.state_ref()));
        let created = ledger.lookup(&new_ref).await.unwrap().expect("output recorded");
        assert_eq!(created.state().contract(), &Setup::upgrade_id());
        assert_eq!(created.state(), &signed.tx().outputs()[0]);
    }

    // The acceptor's authorisation was used up.
    assert_eq!(
        setup.nodes[1]
            .authorisations()
            .authorised_upgrade(setup.original.state_ref()),
        None
    );

    // The legacy state is gone, so it cannot be upgraded twice.
    let err = instigator
        .upgrade_state_ref(setup.original.state_ref(), &Setup::upgrade_id())
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolFailure::StateNotFound(_)));
}

#[tokio::test]
async fn test_fan_out_to_many_participants() {
    let setup = Setup::new(4, 2_000);
    let acceptors: Vec<_> = (1..4)
        .map(|i| {
            setup.authorise(i);
            setup.spawn_acceptor(i)
        })
        .collect();

    let mut instigator = setup.nodes[0].instigator();
    let signed = instigator
        .upgrade_state_ref(setup.original.state_ref(), &Setup::upgrade_id())
        .await
        .expect("upgrade succeeds");
    assert_eq!(signed.sigs().len(), 4);

    for acceptor in acceptors {
        let outcome = acceptor.await.unwrap().unwrap();
        assert!(matches!(outcome, AcceptorOutcome::Recorded(ref tx) if tx == &signed));
    }
}

#[tokio::test]
async fn test_tampered_output_is_rejected() {
    // The instigator runs a specification that diverges from everybody else's.
    let setup = Setup::with_registries(2, 2_000, |i| {
        if i == 0 {
            UpgradeRegistry::new().with(GreedySpec).unwrap()
        } else {
            honest_registry()
        }
    });
    setup.authorise(1);
    let acceptor = setup.spawn_acceptor(1);

    let mut instigator = setup.nodes[0].instigator();
    let err = instigator
        .upgrade(&setup.original, &Setup::upgrade_id())
        .await
        .unwrap_err();

    let expected = RejectionReason::Verification(VerificationFailure::NonDeterministicUpgrade);
    match err {
        ProtocolFailure::UpgradeRejectedByPeer { peer, reason } => {
            assert_eq!(peer, setup.keys[1]);
            assert_eq!(reason, expected);
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(instigator.phase(), InstigatorPhase::Aborted);

    let outcome = acceptor.await.unwrap().unwrap();
    assert_eq!(outcome, AcceptorOutcome::Rejected(expected));

    for node in &setup.nodes {
        assert!(node.ledger().recorded().is_empty());
        assert!(!node.ledger().is_consumed(setup.original.state_ref()));
    }
}

#[tokio::test]
async fn test_unresponsive_peer_times_out() {
    let setup = Setup::new(2, 50);
    // Participant 1 stays connected but never answers.

    let mut instigator = setup.nodes[0].instigator();
    let err = instigator
        .upgrade(&setup.original, &Setup::upgrade_id())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(instigator.phase(), InstigatorPhase::Aborted);
    assert!(setup.nodes[0].ledger().recorded().is_empty());
}

#[tokio::test]
async fn test_unauthorised_upgrade_is_rejected() {
    let setup = Setup::new(2, 2_000);
    let acceptor = setup.spawn_acceptor(1);

    let mut instigator = setup.nodes[0].instigator();
    let err = instigator
        .upgrade(&setup.original, &Setup::upgrade_id())
        .await
        .unwrap_err();

    assert!(err.is_rejection());
    let outcome = acceptor.await.unwrap().unwrap();
    assert!(matches!(
        outcome,
        AcceptorOutcome::Rejected(RejectionReason::UpgradeNotAuthorised { .. })
    ));
    assert!(setup.nodes[0].ledger().recorded().is_empty());
}

#[tokio::test]
async fn test_signers_learn_about_abort() {
    // Participant 1 signs, participant 2 refuses, so participant 1 must be told.
    let setup = Setup::new(3, 2_000);
    setup.authorise(1);
    let signer = setup.spawn_acceptor(1);
    let refuser = setup.spawn_acceptor(2);

    let mut instigator = setup.nodes[0].instigator();
    let err = instigator
        .upgrade(&setup.original, &Setup::upgrade_id())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolFailure::UpgradeRejectedByPeer { peer, .. } if peer == setup.keys[2]
    ));

    assert!(matches!(
        refuser.await.unwrap().unwrap(),
        AcceptorOutcome::Rejected(_)
    ));
    assert!(matches!(
        signer.await.unwrap().unwrap(),
        AcceptorOutcome::Aborted { .. }
    ));
    for node in &setup.nodes {
        assert!(node.ledger().recorded().is_empty());
    }
}

#[tokio::test]
async fn test_retry_after_timeout_ignores_late_answers() {
    let setup = Setup::new(2, 300);
    setup.authorise(1);

    // Nobody is listening yet, so the first attempt times out and is aborted.
    let mut instigator = setup.nodes[0].instigator();
    let err = instigator
        .upgrade(&setup.original, &Setup::upgrade_id())
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    // The acceptor comes up late, answers the stale proposal and then sees the abort.
    let late = setup.spawn_acceptor(1).await.unwrap().unwrap();
    assert!(matches!(late, AcceptorOutcome::Aborted { .. }));

    // The late signature is still queued ahead of the answer to the retry.
    let acceptor = setup.spawn_acceptor(1);
    let signed = instigator
        .upgrade(&setup.original, &Setup::upgrade_id())
        .await
        .expect("retry succeeds");
    assert_eq!(instigator.phase(), InstigatorPhase::Complete);

    let outcome = acceptor.await.unwrap().unwrap();
    assert_eq!(outcome, AcceptorOutcome::Recorded(signed.clone()));
    for node in &setup.nodes {
        assert_eq!(node.ledger().recorded(), vec![signed.clone()]);
    }
}
