//! Handshake configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by both roles of the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HandshakeConfig {
    /// How long the instigator waits for all peer responses, and how long an acceptor waits for
    /// the finalized transaction after signing. Required, there is no default.
    pub peer_timeout_ms: u64,

    /// Whether acceptors only sign upgrades their operator authorised beforehand.
    #[serde(default = "default_require_authorisation")]
    pub require_authorisation: bool,
}

fn default_require_authorisation() -> bool {
    true
}

impl HandshakeConfig {
    pub fn new(peer_timeout_ms: u64) -> Self {
        Self {
            peer_timeout_ms,
            require_authorisation: default_require_authorisation(),
        }
    }

    pub fn with_require_authorisation(mut self, require: bool) -> Self {
        self.require_authorisation = require;
        self
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}
