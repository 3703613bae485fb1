// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Seeded key hashing and minimal perfect hash functions.
//!
//! Keys are reduced to a canonical little-endian byte image and run through
//! seeded xxh3. Every derived quantity (bucket hash, displacement hash,
//! fingerprint) comes from the same image, so any type with a stable byte
//! image can be a key: term strings and unigram-id sequences are the two the
//! index uses.

pub mod perfect_hash;
pub mod perfect_hash_builder;
pub mod perfect_hash_map;

use xxhash_rust::xxh3::xxh3_64_with_seed;

pub use perfect_hash::PerfectHash;
pub use perfect_hash_builder::{PerfectHashBuilder, PerfectHashOptions};
pub use perfect_hash_map::{PerfectHashMap, PerfectHashMapBuilder, PerfectHashMapOptions};

/// Seed for the fingerprint hash, kept distinct from any bucket seed a
/// builder is likely to pick.
pub const FINGERPRINT_SEED: u64 = 47;

/// A key with a canonical byte image.
pub trait HashKey {
    /// Append the canonical little-endian byte image of `self` to `buf`.
    fn key_bytes(&self, buf: &mut Vec<u8>);
}

impl HashKey for str {
    fn key_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

impl HashKey for String {
    fn key_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

impl HashKey for [u64] {
    fn key_bytes(&self, buf: &mut Vec<u8>) {
        for value in self {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

impl HashKey for Vec<u64> {
    fn key_bytes(&self, buf: &mut Vec<u8>) {
        self.as_slice().key_bytes(buf);
    }
}

/// Seeded hash of a key's canonical bytes (the `H0` of the construction).
pub fn hash_key<K: HashKey + ?Sized>(key: &K, seed: u64) -> u64 {
    let mut buf = Vec::with_capacity(16);
    key.key_bytes(&mut buf);
    xxh3_64_with_seed(&buf, seed)
}

/// Displacement hash (`H1`): mixes an already-computed `H0` with a candidate
/// bucket seed.
#[inline]
pub fn displace(hash: u64, seed: u64) -> u64 {
    xxh3_64_with_seed(&hash.to_le_bytes(), seed)
}

/// Fingerprint of a raw byte image, masked to `bits` (at most 32).
#[inline]
pub fn fingerprint_bytes(bytes: &[u8], bits: u8) -> u32 {
    debug_assert!(bits > 0 && bits <= 32);
    let full = xxh3_64_with_seed(bytes, FINGERPRINT_SEED) as u32;
    if bits == 32 {
        full
    } else {
        full & ((1u32 << bits) - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_and_string_share_an_image() {
        assert_eq!(hash_key("postings", 7), hash_key(&"postings".to_string(), 7));
    }

    #[test]
    fn id_sequences_are_order_sensitive() {
        let a = vec![1u64, 2, 3];
        let b = vec![3u64, 2, 1];
        assert_ne!(hash_key(&a, 0), hash_key(&b, 0));
    }

    #[test]
    fn fingerprint_respects_width() {
        let fp = fingerprint_bytes(b"alpha", 8);
        assert!(fp < 256);
        assert_eq!(fingerprint_bytes(b"alpha", 32), fingerprint_bytes(b"alpha", 32));
    }
}
