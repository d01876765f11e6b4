//! Upgrade commands and transactions.

use std::collections::{BTreeMap, BTreeSet};

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    errors::PrivacySaltError, hash::compute_borsh_hash, Buf32, ContractId, ContractState,
    NotaryId, PubKey, SchnorrSig, StateRef, TxId,
};

/// Declares the intent to move a state onto the contract named by `upgrade`.
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
pub struct UpgradeCommand {
    /// Id of the upgrade specification, which is also the id of the new contract.
    upgrade: ContractId,
}

impl UpgradeCommand {
    pub fn new(upgrade: ContractId) -> Self {
        Self { upgrade }
    }

    pub fn upgrade(&self) -> &ContractId {
        &self.upgrade
    }
}

/// An [`UpgradeCommand`] with the keys required to sign the transaction carrying it.
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
pub struct SignedCommand {
    command: UpgradeCommand,
    signers: BTreeSet<PubKey>,
}

impl SignedCommand {
    pub fn new(command: UpgradeCommand, signers: BTreeSet<PubKey>) -> Self {
        Self { command, signers }
    }

    pub fn command(&self) -> &UpgradeCommand {
        &self.command
    }

    pub fn signers(&self) -> &BTreeSet<PubKey> {
        &self.signers
    }
}

/// Per-transaction randomness preventing two otherwise identical upgrade transactions from
/// sharing an id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, Serialize)]
pub struct PrivacySalt(Buf32);

impl PrivacySalt {
    /// Wraps a salt value, rejecting the all-zero salt.
    pub fn new(salt: Buf32) -> Result<Self, PrivacySaltError> {
        if salt.is_zero() {
            return Err(PrivacySaltError::AllZero);
        }
        Ok(Self(salt))
    }

    /// Draws a fresh salt from the OS RNG.
    pub fn random() -> Self {
        loop {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            if let Ok(salt) = Self::new(Buf32::from(bytes)) {
                return salt;
            }
        }
    }

    pub fn inner(&self) -> &Buf32 {
        &self.0
    }
}

impl BorshDeserialize for PrivacySalt {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let buf = Buf32::deserialize_reader(reader)?;
        Self::new(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl<'de> Deserialize<'de> for PrivacySalt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let buf = <Buf32 as Deserialize>::deserialize(deserializer)?;
        Self::new(buf).map_err(serde::de::Error::custom)
    }
}

impl<'a> Arbitrary<'a> for PrivacySalt {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut bytes = <[u8; 32]>::arbitrary(u)?;
        bytes[0] |= 1;
        Ok(Self(Buf32::from(bytes)))
    }
}

/// A consumed state, resolved alongside its reference.
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
pub struct TxInput {
    state_ref: StateRef,
    state: ContractState,
}

impl TxInput {
    pub fn new(state_ref: StateRef, state: ContractState) -> Self {
        Self { state_ref, state }
    }

    pub fn state_ref(&self) -> &StateRef {
        &self.state_ref
    }

    pub fn state(&self) -> &ContractState {
        &self.state
    }
}

/// Unsigned transaction replacing a state with its upgraded form.
///
/// The container is shaped like a general ledger transaction, so nothing here guarantees the
/// exactly-one-input/output/command shape an upgrade needs. That is checked by the verifier.
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
pub struct UpgradeTransaction {
    inputs: Vec<TxInput>,
    outputs: Vec<ContractState>,
    commands: Vec<SignedCommand>,
    notary: NotaryId,
    privacy_salt: PrivacySalt,
}

impl UpgradeTransaction {
    pub fn new(
        inputs: Vec<TxInput>,
        outputs: Vec<ContractState>,
        commands: Vec<SignedCommand>,
        notary: NotaryId,
        privacy_salt: PrivacySalt,
    ) -> Self {
        Self {
            inputs,
            outputs,
            commands,
            notary,
            privacy_salt,
        }
    }

    /// Computes the transaction id, which is the digest every participant signs.
    pub fn id(&self) -> TxId {
        TxId::new(compute_borsh_hash(self))
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ContractState] {
        &self.outputs
    }

    pub fn commands(&self) -> &[SignedCommand] {
        &self.commands
    }

    pub fn notary(&self) -> &NotaryId {
        &self.notary
    }

    pub fn privacy_salt(&self) -> &PrivacySalt {
        &self.privacy_salt
    }

    /// Union of the signers required by every command.
    pub fn required_signers(&self) -> BTreeSet<PubKey> {
        self.commands
            .iter()
            .flat_map(|cmd| cmd.signers().iter().copied())
            .collect()
    }

    /// Reference the output at `index` will have once this transaction is recorded.
    pub fn output_ref(&self, index: u32) -> StateRef {
        StateRef::new(self.id(), index)
    }
}

/// An [`UpgradeTransaction`] and the signatures collected over its id so far.
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
pub struct SignedUpgradeTx {
    tx: UpgradeTransaction,
    sigs: BTreeMap<PubKey, SchnorrSig>,
}

impl SignedUpgradeTx {
    pub fn new(tx: UpgradeTransaction) -> Self {
        Self {
            tx,
            sigs: BTreeMap::new(),
        }
    }

    pub fn tx(&self) -> &UpgradeTransaction {
        &self.tx
    }

    pub fn id(&self) -> TxId {
        self.tx.id()
    }

    pub fn sigs(&self) -> &BTreeMap<PubKey, SchnorrSig> {
        &self.sigs
    }

    /// Adds a signature, returning the previous one by the same key if there was one.
    pub fn add_signature(&mut self, key: PubKey, sig: SchnorrSig) -> Option<SchnorrSig> {
        self.sigs.insert(key, sig)
    }

    pub fn signature(&self, key: &PubKey) -> Option<&SchnorrSig> {
        self.sigs.get(key)
    }

    pub fn signers(&self) -> BTreeSet<PubKey> {
        self.sigs.keys().copied().collect()
    }

    /// Required signers that have not signed yet.
    pub fn missing_signatures(&self) -> BTreeSet<PubKey> {
        self.tx
            .required_signers()
            .into_iter()
            .filter(|key| !self.sigs.contains_key(key))
            .collect()
    }

    /// Whether every required signer has a signature present. Does not check validity.
    pub fn is_fully_signed(&self) -> bool {
        self.missing_signatures().is_empty()
    }

    pub fn into_parts(self) -> (UpgradeTransaction, BTreeMap<PubKey, SchnorrSig>) {
        (self.tx, self.sigs)
    }
}
