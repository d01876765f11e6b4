//! Fixture generators shared by the upgrade crates' tests.

use arbitrary::{Arbitrary, Unstructured};
use rand_core::{CryptoRngCore, OsRng};
use strata_upgrade_types::{
    crypto::{generate_secret_key, pubkey_from_secret},
    Buf32, ContractState, NotaryId, PubKey, StateAndRef, StateRef, TxId,
};

/// The default buffer size for the `ArbitraryGenerator`.
const ARB_GEN_LEN: usize = 16_384;

#[derive(Debug)]
pub struct ArbitraryGenerator {
    buf: Vec<u8>, // Persistent buffer
}

impl Default for ArbitraryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArbitraryGenerator {
    /// Creates a new `ArbitraryGenerator` with a default buffer size.
    pub fn new() -> Self {
        Self::new_with_size(ARB_GEN_LEN)
    }

    /// Creates a new `ArbitraryGenerator` with a specified buffer size.
    pub fn new_with_size(s: usize) -> Self {
        Self { buf: vec![0u8; s] }
    }

    /// Generates an arbitrary instance of type `T` using the default RNG, [`OsRng`].
    pub fn generate<T>(&mut self) -> T
    where
        T: for<'a> Arbitrary<'a> + Clone,
    {
        self.generate_with_rng::<T, OsRng>(&mut OsRng)
    }

    /// Generates an arbitrary instance of type `T` from the provided RNG.
    pub fn generate_with_rng<T, R>(&mut self, rng: &mut R) -> T
    where
        T: for<'a> Arbitrary<'a> + Clone,
        R: CryptoRngCore,
    {
        const MAX_ATTEMPTS: usize = 16;
        let mut last_error = None;

        for _ in 0..MAX_ATTEMPTS {
            rng.fill_bytes(&mut self.buf);
            let mut u = Unstructured::new(&self.buf);
            match T::arbitrary(&mut u) {
                Ok(value) => return value,
                Err(err) => last_error = Some(err),
            }
        }

        let error_msg = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        panic!("Failed to generate arbitrary instance: {error_msg}");
    }
}

/// Notary every fixture state is bound to.
pub fn test_notary() -> NotaryId {
    NotaryId::from([0x0a; 32])
}

/// Generates `n` fresh secret keys.
pub fn gen_secret_keys(n: usize) -> Vec<Buf32> {
    (0..n).map(|_| generate_secret_key()).collect()
}

/// Generates `n` valid x-only public keys whose secrets are thrown away.
pub fn gen_pubkeys(n: usize) -> Vec<PubKey> {
    gen_secret_keys(n)
        .iter()
        .map(|sk| pubkey_from_secret(sk).expect("test: valid secret key"))
        .collect()
}

/// Builds an unconsumed state of `contract` owned by `participants`, with random payload and
/// a random creating transaction.
pub fn gen_state_and_ref(contract: &str, participants: &[PubKey]) -> StateAndRef {
    let mut arb = ArbitraryGenerator::new_with_size(256);
    let data: [u8; 16] = arb.generate();
    let txid: TxId = arb.generate();

    let state = ContractState::new(contract.into(), participants.to_vec(), data.to_vec());
    StateAndRef::new(state, Some(test_notary()), StateRef::new(txid, 0))
}
