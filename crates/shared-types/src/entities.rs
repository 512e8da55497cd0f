//! # Core Primitive Entities
//!
//! The byte-array primitives every subsystem speaks in: hashes, miner
//! public keys and millisecond timestamps.

use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 32-byte miner public key.
pub type Pubkey = [u8; 32];

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

/// The all-zero hash, used as the "unset" sentinel on the wire.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Compute the SHA-256 hash of a byte slice.
pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// XOR two 32-byte values component-wise.
pub fn xor_hashes(a: &Hash, b: &Hash) -> Hash {
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}

/// Interpret the first 8 bytes of a hash as a big-endian `u64`.
///
/// Used wherever a hash has to be reduced to a scheduling index.
pub fn hash_to_u64(h: &Hash) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&h[..8]);
    u64::from_be_bytes(buf)
}

/// Render a hash or pubkey as an abbreviated hex string for log lines.
pub fn short_hex(bytes: &[u8]) -> String {
    let full = hex::encode(bytes);
    if full.len() > 8 {
        format!("{}..", &full[..8])
    } else {
        full
    }
}
