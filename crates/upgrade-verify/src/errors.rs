use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use strata_upgrade_types::{ContractId, PubKey, StateRef};
use thiserror::Error;

/// Reasons a proposed upgrade fails verification.
///
/// These travel back to the instigator inside a rejection, so they are serializable.
#[derive(
    Debug, Clone, Error, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum VerificationFailure {
    /// Some participant of the input state is not among the keys that signed (or are required
    /// to sign) the upgrade.
    #[error("missing signatures from {} participant(s)", .missing.len())]
    MissingSignatures { missing: Vec<PubKey> },

    /// The input or output contract does not match the upgrade specification.
    #[error("contract lineage mismatch: expected {expected}, found {found}")]
    ContractLineageMismatch {
        expected: ContractId,
        found: ContractId,
    },

    /// The proposed output is not what applying the upgrade to the input yields.
    #[error("proposed output differs from the deterministic upgrade of the input")]
    NonDeterministicUpgrade,

    /// The transaction does not have exactly one input, output and command.
    #[error(
        "malformed upgrade transaction: {inputs} inputs, {outputs} outputs, {commands} commands"
    )]
    MalformedUpgradeTransaction {
        inputs: u32,
        outputs: u32,
        commands: u32,
    },

    /// The command names a specification nobody registered.
    #[error("unknown upgrade specification {0}")]
    UnknownUpgradeSpecification(ContractId),

    /// The specification refused to upgrade the input.
    #[error("upgrade function failed: {0}")]
    UpgradeFailed(String),

    /// A signature present on the transaction does not verify.
    #[error("invalid signature by {signer}")]
    InvalidSignature { signer: PubKey },
}

/// Errors raised by an upgrade specification's transformation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpgradeSpecError {
    #[error("invalid state data: {0}")]
    InvalidStateData(String),
}

/// Errors building an upgrade proposal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// The original state has no determinable notary.
    #[error("notary of state {0} cannot be determined")]
    AmbiguousNotary(StateRef),

    /// The state is not governed by the contract the specification upgrades from.
    #[error("state is governed by {found}, specification upgrades {expected}")]
    LegacyContractMismatch {
        expected: ContractId,
        found: ContractId,
    },

    #[error("upgrade of state {state_ref} failed: {source}")]
    Upgrade {
        state_ref: StateRef,
        #[source]
        source: UpgradeSpecError,
    },
}

/// Errors registering upgrade specifications.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("upgrade specification {0} registered twice")]
    DuplicateSpecification(ContractId),
}
