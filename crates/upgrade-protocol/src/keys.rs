//! Key custody and resolution of the local signing identity.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use strata_upgrade_types::{
    crypto::{pubkey_from_secret, sign_schnorr_sig},
    Buf32, PubKey, SchnorrSig, TxId,
};
use tracing::*;
use zeroize::Zeroizing;

use crate::errors::{KeyCustodyError, KeyResolutionError};

/// Holds the node's signing keys.
///
/// Secrets never leave the custodian; callers only learn which of a set of public keys are
/// controlled locally and can ask for signatures by them.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait KeyCustody: Send + Sync + 'static {
    /// Returns the subset of `candidates` whose secret keys are held locally.
    fn filter_my_keys(&self, candidates: &BTreeSet<PubKey>) -> BTreeSet<PubKey>;

    /// Signs a transaction id with the secret belonging to `key`.
    fn sign(&self, txid: &TxId, key: &PubKey) -> Result<SchnorrSig, KeyCustodyError>;
}

/// In-process key custody over Schnorr secret keys.
#[derive(Default)]
pub struct LocalKeyStore {
    keys: BTreeMap<PubKey, Zeroizing<[u8; 32]>>,
}

impl fmt::Debug for LocalKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeyStore")
            .field("pubkeys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LocalKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_secret_keys(
        secret_keys: impl IntoIterator<Item = Buf32>,
    ) -> Result<Self, KeyCustodyError> {
        let mut store = Self::new();
        for sk in secret_keys {
            store.insert(sk)?;
        }
        Ok(store)
    }

    /// Adds a secret key, returning its public key.
    pub fn insert(&mut self, sk: Buf32) -> Result<PubKey, KeyCustodyError> {
        let pk = pubkey_from_secret(&sk)?;
        self.keys.insert(pk, Zeroizing::new(sk.into()));
        Ok(pk)
    }

    pub fn pubkeys(&self) -> impl Iterator<Item = &PubKey> {
        self.keys.keys()
    }
}

impl KeyCustody for LocalKeyStore {
    fn filter_my_keys(&self, candidates: &BTreeSet<PubKey>) -> BTreeSet<PubKey> {
        candidates
            .iter()
            .filter(|k| self.keys.contains_key(k))
            .copied()
            .collect()
    }

    fn sign(&self, txid: &TxId, key: &PubKey) -> Result<SchnorrSig, KeyCustodyError> {
        let sk = self
            .keys
            .get(key)
            .ok_or(KeyCustodyError::UnknownKey(*key))?;
        Ok(sign_schnorr_sig(txid.inner(), &Buf32::from(**sk))?)
    }
}

/// Maps a set of participants entitled to sign onto the keys this node controls.
#[derive(Debug)]
pub struct ParticipantKeyResolver<K> {
    custody: Arc<K>,
}

impl<K> Clone for ParticipantKeyResolver<K> {
    fn clone(&self) -> Self {
        Self {
            custody: self.custody.clone(),
        }
    }
}

impl<K: KeyCustody> ParticipantKeyResolver<K> {
    pub fn new(custody: Arc<K>) -> Self {
        Self { custody }
    }

    pub fn custody(&self) -> &K {
        &self.custody
    }

    /// Local keys among `candidates`.
    pub fn resolve_own_keys(&self, candidates: &BTreeSet<PubKey>) -> BTreeSet<PubKey> {
        // A custodian may answer with keys nobody asked about.
        self.custody
            .filter_my_keys(candidates)
            .intersection(candidates)
            .copied()
            .collect()
    }

    /// The single local key among `candidates`.
    pub fn resolve_signing_key(
        &self,
        candidates: &BTreeSet<PubKey>,
    ) -> Result<PubKey, KeyResolutionError> {
        let own = self.resolve_own_keys(candidates);
        let mut iter = own.iter();
        match (iter.next(), iter.next()) {
            (Some(key), None) => Ok(*key),
            (None, _) => Err(KeyResolutionError::NoLocalSigningKey),
            (Some(_), Some(_)) => {
                warn!(count = own.len(), "several local keys could sign");
                Err(KeyResolutionError::AmbiguousLocalKey(own.len()))
            }
        }
    }

    pub fn sign(&self, txid: &TxId, key: &PubKey) -> Result<SchnorrSig, KeyCustodyError> {
        self.custody.sign(txid, key)
    }
}
