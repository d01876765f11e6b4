use std::time::Duration;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use strata_upgrade_types::{ContractId, PubKey, StateRef};
use strata_upgrade_verify::{AssemblyError, VerificationFailure};
use thiserror::Error;

/// Why an acceptor refused to sign a proposal. Sent back to the instigator.
#[derive(
    Debug, Clone, Error, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum RejectionReason {
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationFailure),

    /// The proposal is not signed by the instigator, or the instigator is not a required signer.
    #[error("missing or invalid proposer signature")]
    InvalidProposerSignature,

    #[error("input state {0} is not known to the local ledger")]
    UnknownInputState(StateRef),

    #[error("input state {0} differs from the local ledger view")]
    InputStateMismatch(StateRef),

    #[error("upgrade of {state_ref} to {upgrade} has not been authorised")]
    UpgradeNotAuthorised {
        state_ref: StateRef,
        upgrade: ContractId,
    },

    #[error("no local key among the required signers")]
    NoLocalSigningKey,

    #[error("more than one local key among the required signers")]
    AmbiguousLocalKey,

    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<KeyResolutionError> for RejectionReason {
    fn from(value: KeyResolutionError) -> Self {
        match value {
            KeyResolutionError::NoLocalSigningKey => Self::NoLocalSigningKey,
            KeyResolutionError::AmbiguousLocalKey(_) => Self::AmbiguousLocalKey,
        }
    }
}

/// Failures ending a handshake, from either side.
#[derive(Debug, Error)]
pub enum ProtocolFailure {
    #[error("no local key among the required signers")]
    NoLocalSigningKey,

    #[error("{0} local keys among the required signers, expected exactly one")]
    AmbiguousLocalKey(usize),

    #[error("notary of state {0} cannot be determined")]
    AmbiguousNotary(StateRef),

    #[error("upgrade rejected by {peer}: {reason}")]
    UpgradeRejectedByPeer {
        peer: PubKey,
        reason: RejectionReason,
    },

    #[error("peers did not respond within {timeout:?}")]
    UpgradeTimedOut { timeout: Duration },

    #[error("invalid signature from peer {peer}")]
    InvalidPeerSignature { peer: PubKey },

    #[error("unexpected message from {peer}")]
    UnexpectedMessage { peer: PubKey },

    #[error("state {0} not found on the ledger")]
    StateNotFound(StateRef),

    #[error("verification: {0}")]
    Verification(#[from] VerificationFailure),

    #[error("assembly: {0}")]
    Assembly(AssemblyError),

    #[error("signing: {0}")]
    Signing(#[from] KeyCustodyError),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

impl ProtocolFailure {
    /// Whether the failure came from a peer refusing to sign.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::UpgradeRejectedByPeer { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UpgradeTimedOut { .. })
    }
}

impl From<AssemblyError> for ProtocolFailure {
    fn from(value: AssemblyError) -> Self {
        match value {
            AssemblyError::AmbiguousNotary(state_ref) => Self::AmbiguousNotary(state_ref),
            other => Self::Assembly(other),
        }
    }
}

impl From<KeyResolutionError> for ProtocolFailure {
    fn from(value: KeyResolutionError) -> Self {
        match value {
            KeyResolutionError::NoLocalSigningKey => Self::NoLocalSigningKey,
            KeyResolutionError::AmbiguousLocalKey(n) => Self::AmbiguousLocalKey(n),
        }
    }
}

/// Picking the single local signing key failed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum KeyResolutionError {
    #[error("no local key among the candidates")]
    NoLocalSigningKey,

    #[error("{0} local keys among the candidates")]
    AmbiguousLocalKey(usize),
}

#[derive(Debug, Error)]
pub enum KeyCustodyError {
    #[error("key {0} is not held locally")]
    UnknownKey(PubKey),

    #[error("secp256k1: {0}")]
    Secp(#[from] secp256k1::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("no route to peer {0}")]
    UnknownPeer(PubKey),

    #[error("channel to peer {0} closed")]
    ChannelClosed(PubKey),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("state {0} already consumed")]
    StateAlreadyConsumed(StateRef),

    #[error("state {0} is unknown to the ledger")]
    UnknownState(StateRef),

    #[error("storage: {0}")]
    Storage(String),
}
