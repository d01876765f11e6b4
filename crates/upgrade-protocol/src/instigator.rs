//! The participant starting an upgrade.

use std::fmt;

use futures::future::{join_all, try_join_all};
use strata_upgrade_types::{
    crypto::verify_schnorr_sig, ContractId, PrivacySalt, PubKey, SchnorrSig, SignedUpgradeTx,
    StateAndRef, StateRef, TxId,
};
use strata_upgrade_verify::{assemble_proposal, VerificationFailure};
use tokio::time;
use tracing::*;

use crate::{
    errors::ProtocolFailure,
    participant::Participant,
    transport::{ProposalResponse, UpgradeMessage},
    KeyCustody, PeerTransport, UpgradeLedger,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstigatorPhase {
    Assembling,
    LocallySigned,
    AwaitingPeerSignatures,
    Finalizing,
    Complete,
    Aborted,
}

/// Drives an upgrade from the initiating side: assemble, sign, collect every co-participant's
/// signature, record and distribute.
pub struct Instigator<K, T, L> {
    ctx: Participant<K, T, L>,
    phase: InstigatorPhase,
}

impl<K, T, L> fmt::Debug for Instigator<K, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instigator")
            .field("ctx", &self.ctx)
            .field("phase", &self.phase)
            .finish()
    }
}

impl<K, T, L> Instigator<K, T, L>
where
    K: KeyCustody,
    T: PeerTransport,
    L: UpgradeLedger,
{
    pub fn new(ctx: Participant<K, T, L>) -> Self {
        Self {
            ctx,
            phase: InstigatorPhase::Assembling,
        }
    }

    pub fn phase(&self) -> InstigatorPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: InstigatorPhase) {
        debug!(from = ?self.phase, to = ?phase, "instigator phase transition");
        self.phase = phase;
    }

    /// Upgrades the unconsumed state at `state_ref`, resolving it through the ledger first.
    pub async fn upgrade_state_ref(
        &mut self,
        state_ref: &StateRef,
        upgrade: &ContractId,
    ) -> Result<SignedUpgradeTx, ProtocolFailure> {
        self.phase = InstigatorPhase::Assembling;
        let original = match self.ctx.ledger().lookup(state_ref).await {
            Ok(Some(original)) => original,
            Ok(None) => {
                self.set_phase(InstigatorPhase::Aborted);
                warn!(%state_ref, "state to upgrade not found");
                return Err(ProtocolFailure::StateNotFound(*state_ref));
            }
            Err(e) => {
                self.set_phase(InstigatorPhase::Aborted);
                return Err(e.into());
            }
        };

        self.upgrade(&original, upgrade).await
    }

    /// Replaces `original` with its upgrade to `upgrade`, returning the fully signed and
    /// recorded transaction.
    #[instrument(
        skip_all,
        fields(
            component = "upgrade_instigator",
            state_ref = %original.state_ref(),
            upgrade = %upgrade,
            txid = tracing::field::Empty,
        )
    )]
    pub async fn upgrade(
        &mut self,
        original: &StateAndRef,
        upgrade: &ContractId,
    ) -> Result<SignedUpgradeTx, ProtocolFailure> {
        self.phase = InstigatorPhase::Assembling;

        match self.handshake(original, upgrade).await {
            Ok(signed) => {
                self.set_phase(InstigatorPhase::Complete);
                info!(signers = signed.sigs().len(), "upgrade complete");
                Ok(signed)
            }
            Err(e) => {
                self.set_phase(InstigatorPhase::Aborted);
                warn!(%e, "upgrade aborted");
                Err(e)
            }
        }
    }

    async fn handshake(
        &mut self,
        original: &StateAndRef,
        upgrade: &ContractId,
    ) -> Result<SignedUpgradeTx, ProtocolFailure> {
        let spec = self
            .ctx
            .verifier()
            .registry()
            .get(upgrade)
            .ok_or_else(|| VerificationFailure::UnknownUpgradeSpecification(upgrade.clone()))?;

        let tx = assemble_proposal(original, spec.as_ref(), PrivacySalt::random())?;
        self.ctx.verifier().verify_transaction(&tx)?;

        let txid = tx.id();
        Span::current().record("txid", field::display(txid));

        let required = tx.required_signers();
        let my_key = self.ctx.keys().resolve_signing_key(&required)?;
        let sig = self.ctx.keys().sign(&txid, &my_key)?;

        let mut signed = SignedUpgradeTx::new(tx);
        signed.add_signature(my_key, sig);
        self.set_phase(InstigatorPhase::LocallySigned);

        let peers: Vec<PubKey> = required.into_iter().filter(|k| k != &my_key).collect();
        match self.collect_and_finalize(signed, &peers).await {
            Ok(signed) => Ok(signed),
            Err(e) => {
                self.notify_abort(&txid, &peers, &e).await;
                Err(e)
            }
        }
    }

    async fn collect_and_finalize(
        &mut self,
        mut signed: SignedUpgradeTx,
        peers: &[PubKey],
    ) -> Result<SignedUpgradeTx, ProtocolFailure> {
        self.set_phase(InstigatorPhase::AwaitingPeerSignatures);

        let timeout = self.ctx.config().peer_timeout();
        let txid = signed.id();
        let proposal = UpgradeMessage::Proposal(signed.clone());

        let requests = peers
            .iter()
            .map(|peer| self.request_signature(peer, &proposal, &txid));
        let responses = time::timeout(timeout, try_join_all(requests))
            .await
            .map_err(|_| ProtocolFailure::UpgradeTimedOut { timeout })??;

        for (peer, sig) in responses {
            signed.add_signature(peer, sig);
        }

        self.set_phase(InstigatorPhase::Finalizing);
        self.ctx.verifier().verify_signatures(&signed)?;
        self.ctx.ledger().record(&signed).await?;
        info!("upgrade transaction recorded");

        self.distribute_finalized(&signed, peers).await;
        Ok(signed)
    }

    /// Sends the proposal to one peer and waits for its answer to that proposal.
    ///
    /// Responses to earlier proposals still queued from the peer are dropped.
    async fn request_signature(
        &self,
        peer: &PubKey,
        proposal: &UpgradeMessage,
        txid: &TxId,
    ) -> Result<(PubKey, SchnorrSig), ProtocolFailure> {
        let transport = self.ctx.transport();
        transport.send(peer, proposal.clone()).await?;

        loop {
            match transport.recv_from(peer).await? {
                UpgradeMessage::Response(resp) if resp.txid() != txid => {
                    debug!(%peer, stale = %resp.txid(), "discarding response to earlier proposal");
                }
                UpgradeMessage::Response(ProposalResponse::Signed { signer, signature, .. }) => {
                    if signer != *peer || !verify_schnorr_sig(&signature, txid.inner(), peer) {
                        warn!(%peer, "peer returned an invalid signature");
                        return Err(ProtocolFailure::InvalidPeerSignature { peer: *peer });
                    }
                    debug!(%peer, "collected peer signature");
                    return Ok((*peer, signature));
                }
                UpgradeMessage::Response(ProposalResponse::Rejected { reason, .. }) => {
                    warn!(%peer, %reason, "peer rejected upgrade");
                    return Err(ProtocolFailure::UpgradeRejectedByPeer {
                        peer: *peer,
                        reason,
                    });
                }
                other => {
                    warn!(%peer, kind = other.kind(), "unexpected message awaiting signature");
                    return Err(ProtocolFailure::UnexpectedMessage { peer: *peer });
                }
            }
        }
    }

    /// Hands the recorded transaction to every peer. Failures are logged, the upgrade is
    /// already final on our side.
    async fn distribute_finalized(&self, signed: &SignedUpgradeTx, peers: &[PubKey]) {
        let transport = self.ctx.transport();
        let sends = peers.iter().map(|peer| async move {
            let res = transport
                .send(peer, UpgradeMessage::Finalized(signed.clone()))
                .await;
            (peer, res)
        });

        for (peer, res) in join_all(sends).await {
            if let Err(e) = res {
                warn!(%peer, %e, "failed to deliver finalized transaction");
            }
        }
    }

    /// Best-effort notification that the handshake for `txid` is over.
    async fn notify_abort(&self, txid: &TxId, peers: &[PubKey], cause: &ProtocolFailure) {
        let transport = self.ctx.transport();
        let reason = cause.to_string();
        let sends = peers.iter().map(|peer| {
            let msg = UpgradeMessage::Abort {
                txid: *txid,
                reason: reason.clone(),
            };
            async move {
                if let Err(e) = transport.send(peer, msg).await {
                    debug!(%peer, %e, "could not notify peer of abort");
                }
            }
        });

        if time::timeout(self.ctx.config().peer_timeout(), join_all(sends))
            .await
            .is_err()
        {
            debug!("timed out notifying peers of abort");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use strata_upgrade_types::{crypto::sign_schnorr_sig, Buf64, TxId};

    use super::*;
    use crate::{
        errors::{LedgerError, RejectionReason},
        memory::InMemoryLedger,
        test_fixtures::{verifier, Fixture, TIMEOUT_MS},
        HandshakeConfig, LocalKeyStore, MockPeerTransport, MockUpgradeLedger,
    };

    fn v2() -> ContractId {
        "token-v2".into()
    }

    /// Transport whose `n`th receive is `script(n, txid)`, `txid` being the id of the
    /// proposal it was sent.
    fn scripted_transport(
        script: impl Fn(usize, TxId) -> UpgradeMessage + Send + 'static,
    ) -> MockPeerTransport {
        let proposed = Arc::new(Mutex::new(None::<TxId>));
        let mut transport = MockPeerTransport::new();

        let seen = proposed.clone();
        transport.expect_send().returning(move |_, msg| {
            if let UpgradeMessage::Proposal(proposal) = msg {
                *seen.lock() = Some(proposal.id());
            }
            Ok(())
        });

        let mut calls = 0;
        transport.expect_recv_from().returning(move |_| {
            let txid = proposed.lock().expect("test: proposal sent before receiving");
            calls += 1;
            Ok(script(calls - 1, txid))
        });
        transport
    }

    #[tokio::test]
    async fn test_sole_participant_completes_without_peers() {
        let fx = Fixture::new(1);
        let ctx = fx.participant(0, MockPeerTransport::new());
        let mut instigator = ctx.instigator();

        let signed = instigator.upgrade(&fx.original, &v2()).await.unwrap();

        assert_eq!(instigator.phase(), InstigatorPhase::Complete);
        assert_eq!(signed.signers(), fx.original.state().participant_keys());
        assert!(ctx.ledger().is_consumed(fx.original.state_ref()));
    }

    #[tokio::test]
    async fn test_ledger_failure_aborts() {
        let fx = Fixture::new(1);
        let mut ledger = MockUpgradeLedger::new();
        ledger
            .expect_record()
            .returning(|_| Err(LedgerError::Storage("disk full".to_owned())));

        let ctx = Participant::new(
            HandshakeConfig::new(TIMEOUT_MS),
            verifier(),
            Arc::new(LocalKeyStore::from_secret_keys([fx.secrets[0]]).unwrap()),
            Arc::new(MockPeerTransport::new()),
            Arc::new(ledger),
        );
        let mut instigator = ctx.instigator();

        let err = instigator.upgrade(&fx.original, &v2()).await.unwrap_err();
        assert!(matches!(err, ProtocolFailure::Ledger(LedgerError::Storage(_))));
        assert_eq!(instigator.phase(), InstigatorPhase::Aborted);
    }

    #[tokio::test]
    async fn test_no_local_key() {
        let fx = Fixture::new(2);
        let ctx = Participant::new(
            HandshakeConfig::new(TIMEOUT_MS),
            verifier(),
            Arc::new(LocalKeyStore::new()),
            Arc::new(MockPeerTransport::new()),
            Arc::new(InMemoryLedger::with_states([fx.original.clone()])),
        );
        let mut instigator = ctx.instigator();

        let err = instigator.upgrade(&fx.original, &v2()).await.unwrap_err();
        assert!(matches!(err, ProtocolFailure::NoLocalSigningKey));
        assert_eq!(instigator.phase(), InstigatorPhase::Aborted);
    }

    #[tokio::test]
    async fn test_unknown_specification() {
        let fx = Fixture::new(1);
        let ctx = fx.participant(0, MockPeerTransport::new());
        let mut instigator = ctx.instigator();

        let err = instigator
            .upgrade(&fx.original, &"token-v9".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolFailure::Verification(VerificationFailure::UnknownUpgradeSpecification(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_state_ref() {
        let fx = Fixture::new(1);
        let ctx = fx.participant(0, MockPeerTransport::new());
        let mut instigator = ctx.instigator();
        let missing = StateRef::new(TxId::from([0xee; 32]), 0);

        let err = instigator
            .upgrade_state_ref(&missing, &v2())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolFailure::StateNotFound(r) if r == missing));
        assert_eq!(instigator.phase(), InstigatorPhase::Aborted);
    }

    #[tokio::test]
    async fn test_forged_peer_signature() {
        let fx = Fixture::new(2);
        let peer = fx.keys[1];

        let transport = scripted_transport(move |_, txid| {
            UpgradeMessage::Response(ProposalResponse::Signed {
                txid,
                signer: peer,
                signature: Buf64::from([2; 64]),
            })
        });

        let ctx = fx.participant(0, transport);
        let mut instigator = ctx.instigator();

        let err = instigator.upgrade(&fx.original, &v2()).await.unwrap_err();
        assert!(matches!(err, ProtocolFailure::InvalidPeerSignature { peer: p } if p == peer));
        assert_eq!(instigator.phase(), InstigatorPhase::Aborted);
        assert!(ctx.ledger().recorded().is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_peer_message() {
        let fx = Fixture::new(2);
        let peer = fx.keys[1];

        let mut transport = MockPeerTransport::new();
        transport.expect_send().returning(|_, _| Ok(()));
        transport.expect_recv_from().returning(|_| {
            Ok(UpgradeMessage::Abort {
                txid: TxId::from([1; 32]),
                reason: "confused".to_owned(),
            })
        });

        let ctx = fx.participant(0, transport);
        let mut instigator = ctx.instigator();

        let err = instigator.upgrade(&fx.original, &v2()).await.unwrap_err();
        assert!(matches!(err, ProtocolFailure::UnexpectedMessage { peer: p } if p == peer));
    }

    #[tokio::test]
    async fn test_responses_to_earlier_proposals_are_skipped() {
        let fx = Fixture::new(2);
        let peer = fx.keys[1];
        let peer_secret = fx.secrets[1];
        let earlier = TxId::from([9; 32]);

        let transport = scripted_transport(move |call, txid| {
            let resp = match call {
                0 => ProposalResponse::Rejected {
                    txid: earlier,
                    reason: RejectionReason::NoLocalSigningKey,
                },
                1 => ProposalResponse::Signed {
                    txid: earlier,
                    signer: peer,
                    signature: Buf64::from([2; 64]),
                },
                _ => ProposalResponse::Signed {
                    txid,
                    signer: peer,
                    signature: sign_schnorr_sig(txid.inner(), &peer_secret).unwrap(),
                },
            };
            UpgradeMessage::Response(resp)
        });

        let ctx = fx.participant(0, transport);
        let mut instigator = ctx.instigator();

        let signed = instigator.upgrade(&fx.original, &v2()).await.unwrap();
        assert_eq!(instigator.phase(), InstigatorPhase::Complete);
        assert_eq!(signed.sigs().len(), 2);
        assert_eq!(ctx.ledger().recorded(), vec![signed]);
    }
}
