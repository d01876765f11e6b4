//! Access to the participant's view of the ledger.

use async_trait::async_trait;
use strata_upgrade_types::{SignedUpgradeTx, StateAndRef, StateRef};

use crate::errors::LedgerError;

#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait UpgradeLedger: Send + Sync + 'static {
    /// Looks up an unconsumed state.
    async fn lookup(&self, state_ref: &StateRef) -> Result<Option<StateAndRef>, LedgerError>;

    /// Records a fully signed transaction, consuming its inputs and creating its outputs.
    ///
    /// Recording the same transaction again is a no-op.
    async fn record(&self, tx: &SignedUpgradeTx) -> Result<(), LedgerError>;
}
