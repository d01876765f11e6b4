//! Shared setup for the role tests.

use std::sync::Arc;

use strata_upgrade_test_utils::{gen_secret_keys, gen_state_and_ref};
use strata_upgrade_types::{
    crypto::{pubkey_from_secret, sign_schnorr_sig},
    Buf32, PrivacySalt, PubKey, SignedUpgradeTx, StateAndRef,
};
use strata_upgrade_verify::{
    assemble_proposal, test_specs::RenameSpec, UpgradeRegistry, UpgradeVerifier,
};

use crate::{
    memory::InMemoryLedger, HandshakeConfig, LocalKeyStore, MockPeerTransport, Participant,
};

pub(crate) type TestParticipant = Participant<LocalKeyStore, MockPeerTransport, InMemoryLedger>;

pub(crate) const TIMEOUT_MS: u64 = 200;

pub(crate) fn rename_spec() -> RenameSpec {
    RenameSpec::new("token-v1", "token-v2")
}

pub(crate) fn verifier() -> UpgradeVerifier {
    let registry = UpgradeRegistry::new()
        .with(rename_spec())
        .expect("test: register spec");
    UpgradeVerifier::new(Arc::new(registry))
}

/// Two participants' secret and public keys plus a `token-v1` state they co-own.
pub(crate) struct Fixture {
    pub(crate) secrets: Vec<Buf32>,
    pub(crate) keys: Vec<PubKey>,
    pub(crate) original: StateAndRef,
}

impl Fixture {
    pub(crate) fn new(n: usize) -> Self {
        let secrets = gen_secret_keys(n);
        let keys: Vec<_> = secrets
            .iter()
            .map(|sk| pubkey_from_secret(sk).expect("test: valid key"))
            .collect();
        let original = gen_state_and_ref("token-v1", &keys);
        Self {
            secrets,
            keys,
            original,
        }
    }

    /// Participant `idx`, holding only its own key and a ledger seeded with the shared state.
    pub(crate) fn participant(&self, idx: usize, transport: MockPeerTransport) -> TestParticipant {
        let custody =
            LocalKeyStore::from_secret_keys([self.secrets[idx]]).expect("test: valid key");
        let ledger = InMemoryLedger::with_states([self.original.clone()]);
        Participant::new(
            HandshakeConfig::new(TIMEOUT_MS),
            verifier(),
            Arc::new(custody),
            Arc::new(transport),
            Arc::new(ledger),
        )
    }

    /// A proposal for the shared state, signed by participant `idx`.
    pub(crate) fn proposal(&self, idx: usize) -> SignedUpgradeTx {
        let tx = assemble_proposal(&self.original, &rename_spec(), PrivacySalt::random())
            .expect("test: assemble");
        self.signed_by(SignedUpgradeTx::new(tx), &[idx])
    }

    pub(crate) fn signed_by(&self, mut signed: SignedUpgradeTx, idxs: &[usize]) -> SignedUpgradeTx {
        let txid = signed.id();
        for &idx in idxs {
            let sig = sign_schnorr_sig(txid.inner(), &self.secrets[idx]).expect("test: sign");
            signed.add_signature(self.keys[idx], sig);
        }
        signed
    }
}
