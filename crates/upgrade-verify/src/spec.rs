//! Upgrade specifications and the registry resolving them.

use std::{collections::BTreeMap, fmt, sync::Arc};

use strata_upgrade_types::{ContractId, ContractState};

use crate::errors::{RegistryError, UpgradeSpecError};

/// Describes how states of one contract map onto states of its successor.
///
/// Implementations must be pure: `upgrade` has to produce exactly the same output for the same
/// input on every participant, since each of them re-derives it independently.
pub trait UpgradeSpecification: Send + Sync + 'static {
    /// Id of the new contract. Also the id the specification is registered under.
    fn contract_id(&self) -> ContractId;

    /// Id of the contract this specification upgrades from.
    fn legacy_contract(&self) -> ContractId;

    /// Transforms a legacy state into its upgraded form.
    fn upgrade(&self, state: &ContractState) -> Result<ContractState, UpgradeSpecError>;
}

/// Statically populated mapping from contract id to the specification producing it.
#[derive(Clone, Default)]
pub struct UpgradeRegistry {
    specs: BTreeMap<ContractId, Arc<dyn UpgradeSpecification>>,
}

impl fmt::Debug for UpgradeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeRegistry")
            .field("specs", &self.specs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl UpgradeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a specification under its contract id.
    pub fn register(&mut self, spec: impl UpgradeSpecification) -> Result<(), RegistryError> {
        let id = spec.contract_id();
        if self.specs.contains_key(&id) {
            return Err(RegistryError::DuplicateSpecification(id));
        }
        self.specs.insert(id, Arc::new(spec));
        Ok(())
    }

    /// Builder-style [`Self::register`].
    pub fn with(mut self, spec: impl UpgradeSpecification) -> Result<Self, RegistryError> {
        self.register(spec)?;
        Ok(self)
    }

    pub fn get(&self, id: &ContractId) -> Option<Arc<dyn UpgradeSpecification>> {
        self.specs.get(id).cloned()
    }
}
