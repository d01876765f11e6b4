//! Upgrade specifications for tests.

use strata_upgrade_types::{ContractId, ContractState};

use crate::{errors::UpgradeSpecError, UpgradeSpecification};

/// Moves a state to a new contract, appending a version marker to its data.
#[derive(Debug, Clone)]
pub struct RenameSpec {
    legacy: ContractId,
    target: ContractId,
}

impl RenameSpec {
    pub fn new(legacy: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            legacy: ContractId::new(legacy),
            target: ContractId::new(target),
        }
    }
}

impl UpgradeSpecification for RenameSpec {
    fn contract_id(&self) -> ContractId {
        self.target.clone()
    }

    fn legacy_contract(&self) -> ContractId {
        self.legacy.clone()
    }

    fn upgrade(&self, state: &ContractState) -> Result<ContractState, UpgradeSpecError> {
        let mut data = state.data().to_vec();
        data.push(0x02);
        Ok(ContractState::new(
            self.target.clone(),
            state.participants().to_vec(),
            data,
        ))
    }
}

/// Refuses to upgrade anything.
#[derive(Debug, Clone)]
pub struct FailingSpec {
    legacy: ContractId,
    target: ContractId,
}

impl FailingSpec {
    pub fn new(legacy: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            legacy: ContractId::new(legacy),
            target: ContractId::new(target),
        }
    }
}

impl UpgradeSpecification for FailingSpec {
    fn contract_id(&self) -> ContractId {
        self.target.clone()
    }

    fn legacy_contract(&self) -> ContractId {
        self.legacy.clone()
    }

    fn upgrade(&self, _state: &ContractState) -> Result<ContractState, UpgradeSpecError> {
        Err(UpgradeSpecError::InvalidStateData("refusing".to_owned()))
    }
}
