//! A participant answering an upgrade proposal.

use std::fmt;

use strata_upgrade_types::{crypto::verify_schnorr_sig, PubKey, SchnorrSig, SignedUpgradeTx, TxId};
use strata_upgrade_verify::VerificationFailure;
use tokio::time;
use tracing::*;

use crate::{
    errors::{ProtocolFailure, RejectionReason},
    participant::Participant,
    transport::{ProposalResponse, UpgradeMessage},
    KeyCustody, PeerTransport, UpgradeLedger,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcceptorPhase {
    AwaitingProposal,
    Verifying,
    Signed,
    Rejected,
    Recorded,
    Aborted,
}

/// How an acceptor's part in a handshake ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptorOutcome {
    /// Signed, then received and recorded the finalized transaction.
    Recorded(SignedUpgradeTx),

    /// Refused to sign.
    Rejected(RejectionReason),

    /// Signed, but the instigator gave up.
    Aborted { txid: TxId, reason: String },
}

/// Answers one proposal from a known instigator.
///
/// The acceptor re-derives everything it signs from its own registry and ledger view; nothing
/// the instigator claims is taken on trust.
pub struct Acceptor<K, T, L> {
    ctx: Participant<K, T, L>,
    instigator: PubKey,
    phase: AcceptorPhase,
    signed_txid: Option<TxId>,
}

impl<K, T, L> fmt::Debug for Acceptor<K, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acceptor")
            .field("ctx", &self.ctx)
            .field("instigator", &self.instigator)
            .field("phase", &self.phase)
            .field("signed_txid", &self.signed_txid)
            .finish()
    }
}

impl<K, T, L> Acceptor<K, T, L>
where
    K: KeyCustody,
    T: PeerTransport,
    L: UpgradeLedger,
{
    pub fn new(ctx: Participant<K, T, L>, instigator: PubKey) -> Self {
        Self {
            ctx,
            instigator,
            phase: AcceptorPhase::AwaitingProposal,
            signed_txid: None,
        }
    }

    pub fn phase(&self) -> AcceptorPhase {
        self.phase
    }

    pub fn instigator(&self) -> &PubKey {
        &self.instigator
    }

    fn set_phase(&mut self, phase: AcceptorPhase) {
        debug!(from = ?self.phase, to = ?phase, "acceptor phase transition");
        self.phase = phase;
    }

    /// Runs the acceptor's side of the handshake to completion.
    ///
    /// Waits for the proposal without a deadline. Once it has signed, waits at most the
    /// configured peer timeout for the finalized transaction.
    #[instrument(
        skip_all,
        fields(component = "upgrade_acceptor", instigator = %self.instigator)
    )]
    pub async fn run(&mut self) -> Result<AcceptorOutcome, ProtocolFailure> {
        let res = self.run_inner().await;
        if let Err(e) = &res {
            self.set_phase(AcceptorPhase::Aborted);
            warn!(%e, "acceptor aborted");
        }
        res
    }

    async fn run_inner(&mut self) -> Result<AcceptorOutcome, ProtocolFailure> {
        let instigator = self.instigator;

        let proposal = self.await_proposal().await?;
        let response = self.handle_proposal(&proposal).await;
        self.ctx
            .transport()
            .send(&instigator, UpgradeMessage::Response(response.clone()))
            .await?;

        let txid = match response {
            ProposalResponse::Signed { txid, .. } => txid,
            ProposalResponse::Rejected { reason, .. } => {
                return Ok(AcceptorOutcome::Rejected(reason))
            }
        };

        let timeout = self.ctx.config().peer_timeout();
        time::timeout(timeout, self.await_finalized(txid))
            .await
            .map_err(|_| ProtocolFailure::UpgradeTimedOut { timeout })?
    }

    /// Waits for the next proposal, dropping leftovers of earlier handshakes.
    async fn await_proposal(&self) -> Result<SignedUpgradeTx, ProtocolFailure> {
        let instigator = self.instigator;
        loop {
            match self.ctx.transport().recv_from(&instigator).await? {
                UpgradeMessage::Proposal(proposal) => return Ok(proposal),
                UpgradeMessage::Abort { txid, .. } => {
                    debug!(%txid, "discarding abort of earlier handshake");
                }
                UpgradeMessage::Finalized(stale) => {
                    debug!(txid = %stale.id(), "discarding finalized tx of earlier handshake");
                }
                other => {
                    warn!(kind = other.kind(), "expected a proposal");
                    return Err(ProtocolFailure::UnexpectedMessage { peer: instigator });
                }
            }
        }
    }

    /// Waits for the instigator to finalize or abort `txid`.
    async fn await_finalized(&mut self, txid: TxId) -> Result<AcceptorOutcome, ProtocolFailure> {
        let instigator = self.instigator;
        loop {
            match self.ctx.transport().recv_from(&instigator).await? {
                UpgradeMessage::Finalized(finalized) if finalized.id() == txid => {
                    let recorded = self.handle_finalized(finalized).await?;
                    return Ok(AcceptorOutcome::Recorded(recorded));
                }
                UpgradeMessage::Abort {
                    txid: aborted,
                    reason,
                } if aborted == txid => {
                    self.set_phase(AcceptorPhase::Aborted);
                    warn!(%txid, %reason, "instigator aborted upgrade");
                    return Ok(AcceptorOutcome::Aborted { txid, reason });
                }
                UpgradeMessage::Abort { txid: stale, .. } => {
                    debug!(%stale, "discarding abort of earlier handshake");
                }
                UpgradeMessage::Finalized(stale) => {
                    debug!(stale = %stale.id(), "discarding finalized tx of earlier handshake");
                }
                other => {
                    warn!(kind = other.kind(), "expected the finalized transaction");
                    return Err(ProtocolFailure::UnexpectedMessage { peer: instigator });
                }
            }
        }
    }

    /// Verifies a proposal and produces the response to send back.
    #[instrument(skip_all, fields(txid = %proposal.id()))]
    pub async fn handle_proposal(&mut self, proposal: &SignedUpgradeTx) -> ProposalResponse {
        self.set_phase(AcceptorPhase::Verifying);
        let txid = proposal.id();

        match self.check_and_sign(proposal).await {
            Ok((signer, signature)) => {
                self.signed_txid = Some(txid);
                self.set_phase(AcceptorPhase::Signed);
                info!(%signer, "signed upgrade proposal");
                ProposalResponse::Signed {
                    txid,
                    signer,
                    signature,
                }
            }
            Err(reason) => {
                self.set_phase(AcceptorPhase::Rejected);
                warn!(%reason, "rejected upgrade proposal");
                ProposalResponse::Rejected { txid, reason }
            }
        }
    }

    async fn check_and_sign(
        &self,
        proposal: &SignedUpgradeTx,
    ) -> Result<(PubKey, SchnorrSig), RejectionReason> {
        let tx = proposal.tx();
        let txid = proposal.id();

        self.ctx.verifier().verify_transaction(tx)?;

        let (input, command) = match (tx.inputs(), tx.commands()) {
            ([input], [command]) => (input, command),
            (inputs, commands) => {
                return Err(VerificationFailure::MalformedUpgradeTransaction {
                    inputs: inputs.len() as u32,
                    outputs: tx.outputs().len() as u32,
                    commands: commands.len() as u32,
                }
                .into())
            }
        };

        let required = tx.required_signers();
        let proposer_signed = required.contains(&self.instigator)
            && proposal
                .signature(&self.instigator)
                .is_some_and(|sig| verify_schnorr_sig(sig, txid.inner(), &self.instigator));
        if !proposer_signed {
            return Err(RejectionReason::InvalidProposerSignature);
        }

        let state_ref = *input.state_ref();
        let known = match self.ctx.ledger().lookup(&state_ref).await {
            Ok(Some(known)) => known,
            Ok(None) => return Err(RejectionReason::UnknownInputState(state_ref)),
            Err(e) => {
                warn!(%state_ref, %e, "ledger lookup failed");
                return Err(RejectionReason::UnknownInputState(state_ref));
            }
        };
        if known.state() != input.state() || known.notary() != Some(tx.notary()) {
            return Err(RejectionReason::InputStateMismatch(state_ref));
        }

        let upgrade = command.command().upgrade();
        if self.ctx.config().require_authorisation
            && !self.ctx.authorisations().is_authorised(&state_ref, upgrade)
        {
            return Err(RejectionReason::UpgradeNotAuthorised {
                state_ref,
                upgrade: upgrade.clone(),
            });
        }

        let key = self.ctx.keys().resolve_signing_key(&required)?;
        let sig = self
            .ctx
            .keys()
            .sign(&txid, &key)
            .map_err(|e| RejectionReason::Signing(e.to_string()))?;

        Ok((key, sig))
    }

    /// Checks and records the finalized transaction.
    pub async fn handle_finalized(
        &mut self,
        finalized: SignedUpgradeTx,
    ) -> Result<SignedUpgradeTx, ProtocolFailure> {
        let txid = finalized.id();
        if self.signed_txid != Some(txid) {
            warn!(%txid, "finalized transaction is not the one we signed");
            return Err(ProtocolFailure::UnexpectedMessage {
                peer: self.instigator,
            });
        }

        self.ctx.verifier().verify_signed(&finalized)?;
        self.ctx.ledger().record(&finalized).await?;

        for input in finalized.tx().inputs() {
            self.ctx.authorisations().deauthorise(input.state_ref());
        }

        self.set_phase(AcceptorPhase::Recorded);
        info!(%txid, "upgrade transaction recorded");
        Ok(finalized)
    }
}
