use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use strata_upgrade_types::{SignedUpgradeTx, StateAndRef, StateRef, TxId};
use tracing::*;

use crate::{errors::LedgerError, UpgradeLedger};

#[derive(Debug, Default)]
struct LedgerState {
    unconsumed: BTreeMap<StateRef, StateAndRef>,
    consumed: BTreeSet<StateRef>,
    recorded: BTreeMap<TxId, SignedUpgradeTx>,
}

/// A single participant's ledger view, held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(states: impl IntoIterator<Item = StateAndRef>) -> Self {
        let ledger = Self::new();
        for state in states {
            ledger.insert_state(state);
        }
        ledger
    }

    /// Adds an unconsumed state, as if some earlier transaction had created it.
    pub fn insert_state(&self, state: StateAndRef) {
        self.inner
            .write()
            .unconsumed
            .insert(*state.state_ref(), state);
    }

    pub fn is_consumed(&self, state_ref: &StateRef) -> bool {
        self.inner.read().consumed.contains(state_ref)
    }

    pub fn recorded_tx(&self, txid: &TxId) -> Option<SignedUpgradeTx> {
        self.inner.read().recorded.get(txid).cloned()
    }

    pub fn recorded(&self) -> Vec<SignedUpgradeTx> {
        self.inner.read().recorded.values().cloned().collect()
    }
}

#[async_trait]
impl UpgradeLedger for InMemoryLedger {
    async fn lookup(&self, state_ref: &StateRef) -> Result<Option<StateAndRef>, LedgerError> {
        Ok(self.inner.read().unconsumed.get(state_ref).cloned())
    }

    async fn record(&self, tx: &SignedUpgradeTx) -> Result<(), LedgerError> {
        let txid = tx.id();
        let mut state = self.inner.write();

        if state.recorded.contains_key(&txid) {
            debug!(%txid, "transaction already recorded");
            return Ok(());
        }

        // Check every input before touching anything.
        for input in tx.tx().inputs() {
            let sr = input.state_ref();
            if state.consumed.contains(sr) {
                return Err(LedgerError::StateAlreadyConsumed(*sr));
            }
            if !state.unconsumed.contains_key(sr) {
                return Err(LedgerError::UnknownState(*sr));
            }
        }

        for input in tx.tx().inputs() {
            let sr = *input.state_ref();
            state.unconsumed.remove(&sr);
            state.consumed.insert(sr);
        }

        let notary = *tx.tx().notary();
        for (idx, output) in tx.tx().outputs().iter().enumerate() {
            let sr = tx.tx().output_ref(idx as u32);
            state
                .unconsumed
                .insert(sr, StateAndRef::new(output.clone(), Some(notary), sr));
        }

        state.recorded.insert(txid, tx.clone());
        debug!(%txid, "transaction recorded");
        Ok(())
    }
}
