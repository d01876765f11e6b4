//! Wires up the in-process participants and runs one handshake.

use std::sync::Arc;

use anyhow::Context;
use strata_upgrade_protocol::{
    memory::{InMemoryEndpoint, InMemoryLedger, InMemoryNetwork},
    AcceptorOutcome, LocalKeyStore, Participant, UpgradeLedger,
};
use strata_upgrade_types::{
    crypto::generate_secret_key, Buf32, NotaryId, PubKey, SignedUpgradeTx, StateAndRef, StateRef,
    TxId,
};
use strata_upgrade_verify::{UpgradeRegistry, UpgradeVerifier};
use tracing::*;

use crate::{
    config::Config,
    demo::{token_v1_state, TokenV2Upgrade, TOKEN_V2},
};

type Node = Participant<LocalKeyStore, InMemoryEndpoint, InMemoryLedger>;

/// What happened during a simulated handshake.
#[derive(Debug)]
pub(crate) struct SimReport {
    pub upgraded: SignedUpgradeTx,
    pub acceptor_outcomes: Vec<(PubKey, AcceptorOutcome)>,
}

impl SimReport {
    /// Whether every acceptor recorded the same transaction as the instigator.
    pub(crate) fn is_consistent(&self) -> bool {
        self.acceptor_outcomes
            .iter()
            .all(|(_, o)| matches!(o, AcceptorOutcome::Recorded(tx) if tx == &self.upgraded))
    }
}

fn build_nodes(config: &Config) -> anyhow::Result<(Vec<PubKey>, Vec<Node>, StateAndRef)> {
    let sim = &config.simulation;

    let mut stores = Vec::with_capacity(sim.participants);
    let mut keys = Vec::with_capacity(sim.participants);
    for _ in 0..sim.participants {
        let mut store = LocalKeyStore::new();
        keys.push(store.insert(generate_secret_key())?);
        stores.push(store);
    }

    // The legacy state as some earlier transaction left it.
    let genesis = StateRef::new(TxId::new(Buf32::new([0x11; 32])), 0);
    let notary = NotaryId::new(Buf32::new([0x0a; 32]));
    let original = StateAndRef::new(
        token_v1_state(keys.clone(), sim.initial_balance),
        Some(notary),
        genesis,
    );

    let registry = UpgradeRegistry::new().with(TokenV2Upgrade)?;
    let verifier = UpgradeVerifier::new(Arc::new(registry));

    let mut network = InMemoryNetwork::new(&keys, sim.channel_capacity);
    let mut nodes = Vec::with_capacity(sim.participants);
    for (key, store) in keys.iter().zip(stores) {
        let endpoint = network
            .take_endpoint(key)
            .context("sim: missing network endpoint")?;
        nodes.push(Participant::new(
            config.handshake.clone(),
            verifier.clone(),
            Arc::new(store),
            Arc::new(endpoint),
            Arc::new(InMemoryLedger::with_states([original.clone()])),
        ));
    }

    Ok((keys, nodes, original))
}

/// Runs the `token-v1 → token-v2` upgrade with participant 0 instigating.
pub(crate) async fn run(config: &Config) -> anyhow::Result<SimReport> {
    let (keys, nodes, original) = build_nodes(config)?;
    let state_ref = *original.state_ref();
    let instigator_key = keys[0];
    info!(participants = keys.len(), %state_ref, "starting simulated upgrade");

    let mut acceptors = Vec::with_capacity(nodes.len().saturating_sub(1));
    for (key, node) in keys.iter().zip(&nodes).skip(1) {
        node.authorisations().authorise(state_ref, TOKEN_V2.into());
        let mut acceptor = node.acceptor(instigator_key);
        acceptors.push((*key, tokio::spawn(async move { acceptor.run().await })));
    }

    let mut instigator = nodes[0].instigator();
    let upgraded = instigator
        .upgrade_state_ref(&state_ref, &TOKEN_V2.into())
        .await
        .context("sim: upgrade failed")?;

    let mut acceptor_outcomes = Vec::with_capacity(acceptors.len());
    for (key, handle) in acceptors {
        let outcome = handle
            .await
            .context("sim: acceptor task panicked")?
            .with_context(|| format!("sim: acceptor {key} failed"))?;
        acceptor_outcomes.push((key, outcome));
    }

    let new_ref = StateRef::new(upgraded.id(), 0);
    for (key, node) in keys.iter().zip(&nodes) {
        let created = node.ledger().lookup(&new_ref).await?;
        debug!(participant = %key, recorded = created.is_some(), "ledger view after upgrade");
    }

    Ok(SimReport {
        upgraded,
        acceptor_outcomes,
    })
}
