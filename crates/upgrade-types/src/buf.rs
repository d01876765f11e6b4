//! Fixed-size byte buffers.

use crate::macros::internal::impl_buf;

/// A 32-byte buffer.
///
/// Used for hashes, x-only public keys and secret keys.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Buf32(pub [u8; 32]);

impl_buf!(Buf32, 32);

/// A 64-byte buffer.
///
/// Used for Schnorr signatures.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Buf64(pub [u8; 64]);

impl_buf!(Buf64, 64);
