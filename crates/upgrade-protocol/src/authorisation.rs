//! Operator authorisation of upgrades, checked by acceptors before signing.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use strata_upgrade_types::{ContractId, StateRef};
use tracing::*;

/// Which upgrade the operator has agreed to for each state.
#[derive(Debug, Default)]
pub struct UpgradeAuthorisations {
    inner: RwLock<BTreeMap<StateRef, ContractId>>,
}

impl UpgradeAuthorisations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorises upgrading `state_ref` to `upgrade`, returning any previous authorisation.
    pub fn authorise(&self, state_ref: StateRef, upgrade: ContractId) -> Option<ContractId> {
        debug!(%state_ref, %upgrade, "upgrade authorised");
        self.inner.write().insert(state_ref, upgrade)
    }

    pub fn deauthorise(&self, state_ref: &StateRef) -> Option<ContractId> {
        self.inner.write().remove(state_ref)
    }

    pub fn authorised_upgrade(&self, state_ref: &StateRef) -> Option<ContractId> {
        self.inner.read().get(state_ref).cloned()
    }

    pub fn is_authorised(&self, state_ref: &StateRef, upgrade: &ContractId) -> bool {
        self.inner.read().get(state_ref) == Some(upgrade)
    }
}
