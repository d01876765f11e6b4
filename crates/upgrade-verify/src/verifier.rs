//! Independent verification of upgrade transactions.

use std::sync::Arc;

use strata_upgrade_types::{
    crypto::verify_schnorr_sig, ContractState, SignedCommand, SignedUpgradeTx, UpgradeTransaction,
};
use tracing::*;

use crate::{errors::VerificationFailure, UpgradeRegistry};

/// Checks that a proposed state replacement is a legitimate upgrade.
///
/// Verification only consults the candidate transaction and the registry, so it is side-effect
/// free and gives the same answer every time it is asked.
#[derive(Clone, Debug)]
pub struct UpgradeVerifier {
    registry: Arc<UpgradeRegistry>,
}

impl UpgradeVerifier {
    pub fn new(registry: Arc<UpgradeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &UpgradeRegistry {
        &self.registry
    }

    /// Verifies that `output` is the upgrade of `input` declared by `command`.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// 1. the command's signers cover every participant of the input,
    /// 2. the input is governed by the legacy contract and the output by the new one,
    /// 3. the output is exactly what the specification derives from the input.
    pub fn verify(
        &self,
        input: &ContractState,
        output: &ContractState,
        command: &SignedCommand,
    ) -> Result<(), VerificationFailure> {
        let missing: Vec<_> = input
            .participant_keys()
            .difference(command.signers())
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(VerificationFailure::MissingSignatures { missing });
        }

        let spec_id = command.command().upgrade();
        let spec = self
            .registry
            .get(spec_id)
            .ok_or_else(|| VerificationFailure::UnknownUpgradeSpecification(spec_id.clone()))?;

        let legacy = spec.legacy_contract();
        if input.contract() != &legacy {
            return Err(VerificationFailure::ContractLineageMismatch {
                expected: legacy,
                found: input.contract().clone(),
            });
        }

        let target = spec.contract_id();
        if output.contract() != &target {
            return Err(VerificationFailure::ContractLineageMismatch {
                expected: target,
                found: output.contract().clone(),
            });
        }

        let expected = spec
            .upgrade(input)
            .map_err(|e| VerificationFailure::UpgradeFailed(e.to_string()))?;
        if &expected != output {
            return Err(VerificationFailure::NonDeterministicUpgrade);
        }

        Ok(())
    }

    /// Extracts the single input, output and command of `tx` and verifies them.
    pub fn verify_transaction(&self, tx: &UpgradeTransaction) -> Result<(), VerificationFailure> {
        let (input, output, command) = match (tx.inputs(), tx.outputs(), tx.commands()) {
            ([input], [output], [command]) => (input, output, command),
            (inputs, outputs, commands) => {
                return Err(VerificationFailure::MalformedUpgradeTransaction {
                    inputs: inputs.len() as u32,
                    outputs: outputs.len() as u32,
                    commands: commands.len() as u32,
                });
            }
        };

        let res = self.verify(input.state(), output, command);
        if let Err(e) = &res {
            debug!(txid = %tx.id(), %e, "upgrade transaction failed verification");
        }
        res
    }

    /// Verifies that every required signer has signed and that every signature present is
    /// valid over the transaction id.
    pub fn verify_signatures(&self, signed: &SignedUpgradeTx) -> Result<(), VerificationFailure> {
        let missing = signed.missing_signatures();
        if !missing.is_empty() {
            return Err(VerificationFailure::MissingSignatures {
                missing: missing.into_iter().collect(),
            });
        }

        let txid = signed.id();
        for (signer, sig) in signed.sigs() {
            if !verify_schnorr_sig(sig, txid.inner(), signer) {
                return Err(VerificationFailure::InvalidSignature { signer: *signer });
            }
        }

        Ok(())
    }

    /// Full check of a finalized transaction: content first, then signatures.
    pub fn verify_signed(&self, signed: &SignedUpgradeTx) -> Result<(), VerificationFailure> {
        self.verify_transaction(signed.tx())?;
        self.verify_signatures(signed)
    }
}
