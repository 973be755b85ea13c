//! Maglev flow hash.
//!
//! A CRC-32C rolling hash with a multiplicative finishing step. The table
//! builder uses it to derive each destination's permutation and the lookup
//! path uses it to hash flow keys, so both sides always agree on a slot.

mod crc;
mod flow;

pub use crc::{crc32c_u32, crc32c_u64, crc32c_update};
pub use flow::{FlowKey, FLOW_KEY_LEN, IPPROTO_TCP, IPPROTO_UDP};

/// Multiplier applied by [`hash_finish`].
///
/// Derived experimentally to pass the reference hash vectors.
pub const FINISH_MULTIPLIER: u32 = 0x8052_04f3;

/// Fold one more 32-bit word into a running hash.
#[inline]
pub fn hash_add(hash: u32, data: u32) -> u32 {
    crc32c_u32(hash, data)
}

/// Finish a running hash.
///
/// `final_` is folded in as an 8-byte little-endian value (callers pass the
/// input length), then the result is multiplied by [`FINISH_MULTIPLIER`] and
/// the high half is xored into the low half.
#[inline]
pub fn hash_finish(hash: u32, final_: u64) -> u32 {
    let hash = crc32c_u64(hash, final_).wrapping_mul(FINISH_MULTIPLIER);
    // Increase entropy in the low bits.
    hash ^ (hash >> 16)
}

/// Hash an arbitrary byte string starting from `basis`.
///
/// The input is consumed as little-endian 32-bit words; a trailing partial
/// word is zero padded. Empty input still runs the finishing step.
pub fn hash_bytes(data: &[u8], basis: u32) -> u32 {
    let mut chunks = data.chunks_exact(4);
    let mut hash = basis;

    for chunk in &mut chunks {
        hash = hash_add(
            hash,
            u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        );
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut tail = [0u8; 4];
        tail[..rest.len()].copy_from_slice(rest);
        hash = hash_add(hash, u32::from_le_bytes(tail));
    }

    hash_finish(hash, data.len() as u64)
}
