//! In-process implementations of the collaborator traits, used by tests and the simulator.

mod ledger;
mod network;

pub use ledger::InMemoryLedger;
pub use network::{InMemoryEndpoint, InMemoryNetwork};
