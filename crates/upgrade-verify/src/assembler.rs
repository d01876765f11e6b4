//! Building the unsigned upgrade proposal.

use strata_upgrade_types::{
    PrivacySalt, SignedCommand, StateAndRef, TxInput, UpgradeCommand, UpgradeTransaction,
};
use tracing::*;

use crate::{errors::AssemblyError, UpgradeSpecification};

/// Builds the transaction replacing `original` with its upgraded form.
///
/// The required signers are the participants of the *original* state: the legacy owners have to
/// consent, whatever participant set the new contract defines. The notary is carried over
/// unchanged. Given the same salt the result is fully deterministic.
pub fn assemble_proposal(
    original: &StateAndRef,
    spec: &dyn UpgradeSpecification,
    privacy_salt: PrivacySalt,
) -> Result<UpgradeTransaction, AssemblyError> {
    let state_ref = *original.state_ref();
    let notary = *original
        .notary()
        .ok_or(AssemblyError::AmbiguousNotary(state_ref))?;

    let legacy = spec.legacy_contract();
    if original.state().contract() != &legacy {
        return Err(AssemblyError::LegacyContractMismatch {
            expected: legacy,
            found: original.state().contract().clone(),
        });
    }

    let upgraded = spec
        .upgrade(original.state())
        .map_err(|source| AssemblyError::Upgrade { state_ref, source })?;

    let command = SignedCommand::new(
        UpgradeCommand::new(spec.contract_id()),
        original.state().participant_keys(),
    );

    let tx = UpgradeTransaction::new(
        vec![TxInput::new(state_ref, original.state().clone())],
        vec![upgraded],
        vec![command],
        notary,
        privacy_salt,
    );

    debug!(
        %state_ref,
        txid = %tx.id(),
        upgrade = %spec.contract_id(),
        "assembled upgrade proposal"
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use strata_upgrade_test_utils::{gen_pubkeys, gen_state_and_ref};
    use strata_upgrade_types::{Buf32, ContractId, ContractState, NotaryId, StateRef, TxId};

    use super::*;
    use crate::{
        errors::UpgradeSpecError,
        test_specs::{FailingSpec, RenameSpec},
    };

    #[test]
    fn test_assembles_single_input_output_command() {
        let keys = gen_pubkeys(2);
        let original = gen_state_and_ref("token-v1", &keys);
        let spec = RenameSpec::new("token-v1", "token-v2");

        let tx = assemble_proposal(&original, &spec, PrivacySalt::random()).unwrap();

        assert_eq!(tx.inputs().len(), 1);
        assert_eq!(tx.outputs().len(), 1);
        assert_eq!(tx.commands().len(), 1);
        assert_eq!(tx.inputs()[0].state_ref(), original.state_ref());
        assert_eq!(tx.outputs()[0], spec.upgrade(original.state()).unwrap());
        assert_eq!(tx.commands()[0].command().upgrade(), &spec.contract_id());
        assert_eq!(Some(tx.notary()), original.notary());
    }

    #[test]
    fn test_signers_are_legacy_participants() {
        let keys = gen_pubkeys(3);
        let original = gen_state_and_ref("token-v1", &keys);

        // Hands the state to a single new owner, so the new participant set differs.
        struct HandOverSpec;
        impl UpgradeSpecification for HandOverSpec {
            fn contract_id(&self) -> ContractId {
                "token-v2".into()
            }
            fn legacy_contract(&self) -> ContractId {
                "token-v1".into()
            }
            fn upgrade(
                &self,
                state: &ContractState,
            ) -> Result<ContractState, UpgradeSpecError> {
                Ok(ContractState::new(
                    "token-v2".into(),
                    vec![Buf32::new([0xee; 32])],
                    state.data().to_vec(),
                ))
            }
        }

        let tx = assemble_proposal(&original, &HandOverSpec, PrivacySalt::random()).unwrap();
        assert_eq!(tx.required_signers(), original.state().participant_keys());
    }

    #[test]
    fn test_same_salt_is_deterministic() {
        let keys = gen_pubkeys(2);
        let original = gen_state_and_ref("token-v1", &keys);
        let spec = RenameSpec::new("token-v1", "token-v2");
        let salt = PrivacySalt::random();

        let a = assemble_proposal(&original, &spec, salt).unwrap();
        let b = assemble_proposal(&original, &spec, salt).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());

        let c = assemble_proposal(&original, &spec, PrivacySalt::random()).unwrap();
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_missing_notary_is_ambiguous() {
        let keys = gen_pubkeys(2);
        let state = ContractState::new("token-v1".into(), keys, vec![]);
        let sr = StateRef::new(TxId::from([1; 32]), 0);
        let original = StateAndRef::new(state, None, sr);
        let spec = RenameSpec::new("token-v1", "token-v2");

        let err = assemble_proposal(&original, &spec, PrivacySalt::random()).unwrap_err();
        assert_eq!(err, AssemblyError::AmbiguousNotary(sr));
    }

    #[test]
    fn test_wrong_legacy_contract_is_refused() {
        let keys = gen_pubkeys(2);
        let state = ContractState::new("cash-v1".into(), keys, vec![]);
        let original = StateAndRef::new(
            state,
            Some(NotaryId::from([3; 32])),
            StateRef::new(TxId::from([1; 32]), 0),
        );
        let spec = RenameSpec::new("token-v1", "token-v2");

        let err = assemble_proposal(&original, &spec, PrivacySalt::random()).unwrap_err();
        assert!(matches!(err, AssemblyError::LegacyContractMismatch { .. }));
    }

    #[test]
    fn test_failing_upgrade_function() {
        let keys = gen_pubkeys(2);
        let original = gen_state_and_ref("token-v1", &keys);
        let spec = FailingSpec::new("token-v1", "token-v2");

        let err = assemble_proposal(&original, &spec, PrivacySalt::random()).unwrap_err();
        assert!(matches!(err, AssemblyError::Upgrade { .. }));
    }
}
