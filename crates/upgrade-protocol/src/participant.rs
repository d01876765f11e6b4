//! Everything one participant brings to a handshake, whichever role it plays.

use std::{fmt, sync::Arc};

use strata_upgrade_types::PubKey;
use strata_upgrade_verify::UpgradeVerifier;

use crate::{
    acceptor::Acceptor, authorisation::UpgradeAuthorisations, config::HandshakeConfig,
    instigator::Instigator, keys::ParticipantKeyResolver, KeyCustody, PeerTransport,
    UpgradeLedger,
};

/// Shared context of a participant node.
///
/// Cheap to clone; the collaborators are reference counted.
pub struct Participant<K, T, L> {
    config: HandshakeConfig,
    verifier: UpgradeVerifier,
    keys: ParticipantKeyResolver<K>,
    transport: Arc<T>,
    ledger: Arc<L>,
    authorisations: Arc<UpgradeAuthorisations>,
}

impl<K, T, L> Clone for Participant<K, T, L> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            verifier: self.verifier.clone(),
            keys: self.keys.clone(),
            transport: self.transport.clone(),
            ledger: self.ledger.clone(),
            authorisations: self.authorisations.clone(),
        }
    }
}

impl<K, T, L> fmt::Debug for Participant<K, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .field("authorisations", &self.authorisations)
            .finish_non_exhaustive()
    }
}

impl<K, T, L> Participant<K, T, L>
where
    K: KeyCustody,
    T: PeerTransport,
    L: UpgradeLedger,
{
    pub fn new(
        config: HandshakeConfig,
        verifier: UpgradeVerifier,
        custody: Arc<K>,
        transport: Arc<T>,
        ledger: Arc<L>,
    ) -> Self {
        Self {
            config,
            verifier,
            keys: ParticipantKeyResolver::new(custody),
            transport,
            ledger,
            authorisations: Arc::new(UpgradeAuthorisations::new()),
        }
    }

    pub fn with_authorisations(mut self, authorisations: Arc<UpgradeAuthorisations>) -> Self {
        self.authorisations = authorisations;
        self
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    pub fn verifier(&self) -> &UpgradeVerifier {
        &self.verifier
    }

    pub fn keys(&self) -> &ParticipantKeyResolver<K> {
        &self.keys
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn authorisations(&self) -> &UpgradeAuthorisations {
        &self.authorisations
    }

    /// Starts an upgrade from this participant.
    pub fn instigator(&self) -> Instigator<K, T, L> {
        Instigator::new(self.clone())
    }

    /// Prepares to answer an upgrade proposed by `instigator`.
    pub fn acceptor(&self, instigator: PubKey) -> Acceptor<K, T, L> {
        Acceptor::new(self.clone(), instigator)
    }
}
