//! Ledger states and references to them.

use std::{collections::BTreeSet, fmt};

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{Buf32, PubKey};

/// Identifies a contract implementation.
///
/// This is the tag upgrade specifications are registered under.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Id of a ledger transaction.
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct TxId(Buf32);

crate::impl_buf_wrapper!(TxId, Buf32, 32);

/// Identifies the notary responsible for ordering transactions consuming a state.
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct NotaryId(Buf32);

crate::impl_buf_wrapper!(NotaryId, Buf32, 32);

/// Stable reference to a state: the transaction that created it and the output index.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct StateRef {
    txid: TxId,
    index: u32,
}

impl StateRef {
    pub fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }

    pub fn txid(&self) -> &TxId {
        &self.txid
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A position in the ledger governed by a contract.
///
/// States are immutable; changing one means consuming it and creating a replacement.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct ContractState {
    /// The contract implementation governing this state.
    contract: ContractId,

    /// Keys entitled to sign changes to this state.
    participants: Vec<PubKey>,

    /// Contract-specific payload.
    data: Vec<u8>,
}

impl ContractState {
    pub fn new(contract: ContractId, participants: Vec<PubKey>, data: Vec<u8>) -> Self {
        Self {
            contract,
            participants,
            data,
        }
    }

    pub fn contract(&self) -> &ContractId {
        &self.contract
    }

    pub fn participants(&self) -> &[PubKey] {
        &self.participants
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the deduplicated set of participant keys.
    pub fn participant_keys(&self) -> BTreeSet<PubKey> {
        self.participants.iter().copied().collect()
    }
}

/// A state together with its reference and the notary it is bound to.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct StateAndRef {
    state: ContractState,

    /// `None` when the ledger could not determine which notary the state belongs to.
    notary: Option<NotaryId>,

    state_ref: StateRef,
}

impl StateAndRef {
    pub fn new(state: ContractState, notary: Option<NotaryId>, state_ref: StateRef) -> Self {
        Self {
            state,
            notary,
            state_ref,
        }
    }

    pub fn state(&self) -> &ContractState {
        &self.state
    }

    pub fn notary(&self) -> Option<&NotaryId> {
        self.notary.as_ref()
    }

    pub fn state_ref(&self) -> &StateRef {
        &self.state_ref
    }

    pub fn into_parts(self) -> (ContractState, Option<NotaryId>, StateRef) {
        (self.state, self.notary, self.state_ref)
    }
}
