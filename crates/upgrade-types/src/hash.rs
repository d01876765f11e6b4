//! Hashing helpers.

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};

use crate::Buf32;

/// Direct untagged SHA-256 hash.
pub fn raw(buf: &[u8]) -> Buf32 {
    Buf32::from(<[u8; 32]>::from(Sha256::digest(buf)))
}

/// Hashes the borsh encoding of a value.
pub fn compute_borsh_hash<T: BorshSerialize>(v: &T) -> Buf32 {
    let mut hasher = Sha256::new();
    v.serialize(&mut HashWriter(&mut hasher))
        .expect("hash: borsh into hasher");
    Buf32::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Feeds borsh output straight into a hasher without buffering it.
struct HashWriter<'a>(&'a mut Sha256);

impl std::io::Write for HashWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
