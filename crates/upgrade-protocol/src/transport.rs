//! Messages exchanged during the handshake and the transport carrying them.

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use strata_upgrade_types::{PubKey, SchnorrSig, SignedUpgradeTx, TxId};

use crate::errors::{RejectionReason, TransportError};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum UpgradeMessage {
    /// Instigator to acceptor: the transaction, signed by the instigator.
    Proposal(SignedUpgradeTx),

    /// Acceptor to instigator.
    Response(ProposalResponse),

    /// Instigator to acceptor: the fully signed transaction, already recorded by the instigator.
    Finalized(SignedUpgradeTx),

    /// Instigator to acceptor: the handshake for `txid` will not complete.
    Abort { txid: TxId, reason: String },
}

impl UpgradeMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Proposal(_) => "proposal",
            Self::Response(_) => "response",
            Self::Finalized(_) => "finalized",
            Self::Abort { .. } => "abort",
        }
    }
}

/// An acceptor's answer to a proposal.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum ProposalResponse {
    Signed {
        txid: TxId,
        signer: PubKey,
        signature: SchnorrSig,
    },
    Rejected {
        txid: TxId,
        reason: RejectionReason,
    },
}

impl ProposalResponse {
    pub fn txid(&self) -> &TxId {
        match self {
            Self::Signed { txid, .. } | Self::Rejected { txid, .. } => txid,
        }
    }
}

/// Point-to-point messaging between participants, addressed by participant key.
///
/// Each participant owns one endpoint. Messages from one peer arrive in the order they were
/// sent; there is no ordering across peers.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Sends a message to the participant owning `to`.
    async fn send(&self, to: &PubKey, msg: UpgradeMessage) -> Result<(), TransportError>;

    /// Waits for the next message sent by `from`.
    async fn recv_from(&self, from: &PubKey) -> Result<UpgradeMessage, TransportError>;
}
