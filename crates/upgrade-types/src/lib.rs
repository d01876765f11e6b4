//! Types shared by every participant of a contract state upgrade: byte buffers, keys,
//! ledger states and the upgrade transaction itself.

mod macros;

pub mod buf;
pub mod crypto;
pub mod errors;
pub mod hash;
pub mod state;
pub mod tx;

pub use buf::{Buf32, Buf64};
pub use crypto::{PubKey, SchnorrSig};
pub use errors::PrivacySaltError;
pub use state::{ContractId, ContractState, NotaryId, StateAndRef, StateRef, TxId};
pub use tx::{
    PrivacySalt, SignedCommand, SignedUpgradeTx, TxInput, UpgradeCommand, UpgradeTransaction,
};
