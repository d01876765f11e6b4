//! The contract upgrade handshake.
//!
//! One participant, the [`Instigator`], assembles the replacement transaction for a state,
//! signs it and sends it to every other participant of the state. Each of them runs an
//! [`Acceptor`], which verifies the proposal independently and signs or rejects it. Once every
//! signature is in, the instigator records the transaction and hands it back out so that all
//! participants record the same thing.
//!
//! Keys, transport and the ledger are reached through the [`KeyCustody`], [`PeerTransport`]
//! and [`UpgradeLedger`] traits. The [`memory`] module has in-process implementations.

pub mod acceptor;
pub mod authorisation;
pub mod config;
pub mod errors;
pub mod instigator;
pub mod keys;
pub mod ledger;
pub mod memory;
pub mod participant;
pub mod transport;

#[cfg(test)]
mod test_fixtures;

pub use acceptor::{Acceptor, AcceptorOutcome, AcceptorPhase};
pub use authorisation::UpgradeAuthorisations;
pub use config::HandshakeConfig;
pub use errors::{
    KeyCustodyError, KeyResolutionError, LedgerError, ProtocolFailure, RejectionReason,
    TransportError,
};
pub use instigator::{Instigator, InstigatorPhase};
pub use keys::{KeyCustody, LocalKeyStore, ParticipantKeyResolver};
pub use ledger::UpgradeLedger;
pub use participant::Participant;
pub use transport::{PeerTransport, ProposalResponse, UpgradeMessage};

#[cfg(any(test, feature = "test-utils"))]
pub use keys::MockKeyCustody;
#[cfg(any(test, feature = "test-utils"))]
pub use ledger::MockUpgradeLedger;
#[cfg(any(test, feature = "test-utils"))]
pub use transport::MockPeerTransport;
