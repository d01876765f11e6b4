//! Schnorr signature signing and verification.
//!
//! Keys are BIP-340 x-only public keys carried as [`Buf32`]; the signed message is always a
//! 32-byte digest.

use rand::{rngs::OsRng, RngCore};
use secp256k1::{schnorr::Signature, Keypair, Message, SecretKey, XOnlyPublicKey, SECP256K1};

use crate::{Buf32, Buf64};

/// An x-only public key.
pub type PubKey = Buf32;

/// A BIP-340 Schnorr signature.
pub type SchnorrSig = Buf64;

/// Sign a message digest with a Schnorr signature.
pub fn sign_schnorr_sig(msg: &Buf32, sk: &Buf32) -> Result<Buf64, secp256k1::Error> {
    let sk = SecretKey::from_slice(sk.as_ref())?;
    let kp = Keypair::from_secret_key(SECP256K1, &sk);
    let msg = Message::from_digest(*msg.as_ref());
    let sig = SECP256K1.sign_schnorr_no_aux_rand(&msg, &kp);
    Ok(Buf64::from(sig.serialize()))
}

/// Verify a Schnorr signature over a message digest.
pub fn verify_schnorr_sig(sig: &Buf64, msg: &Buf32, pk: &Buf32) -> bool {
    let msg = Message::from_digest(*msg.as_ref());

    let pk = match XOnlyPublicKey::from_slice(pk.as_ref()) {
        Ok(pk) => pk,
        Err(_) => return false,
    };

    let sig = match Signature::from_slice(sig.as_ref()) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    sig.verify(&msg, &pk).is_ok()
}

/// Derives the x-only public key belonging to a secret key.
pub fn pubkey_from_secret(sk: &Buf32) -> Result<PubKey, secp256k1::Error> {
    let sk = SecretKey::from_slice(sk.as_ref())?;
    let (xonly, _) = Keypair::from_secret_key(SECP256K1, &sk).x_only_public_key();
    Ok(Buf32::from(xonly.serialize()))
}

/// Generates a fresh secret key from the OS RNG.
pub fn generate_secret_key() -> Buf32 {
    loop {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        // Out-of-range scalars are astronomically rare, just draw again.
        if SecretKey::from_slice(&bytes).is_ok() {
            return Buf32::from(bytes);
        }
    }
}
