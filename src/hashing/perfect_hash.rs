// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Query side of the minimal perfect hash.
//!
//! Always answers with an index in `[0, N)`, even for keys that were never
//! enrolled — collision handling for unknown keys belongs to the caller
//! (usually via the fingerprints of [`super::PerfectHashMap`]). This type is
//! the hash function, not a table.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::packed;
use crate::succinct::sarray::SarrayRank;
use crate::succinct::CompressedVector;

use super::perfect_hash_builder::{EMPTY_SLOTS_DIR, METADATA_FILE, SEEDS_DIR};
use super::{displace, hash_key, HashKey};

pub struct PerfectHash {
    /// Per-bucket displacement seeds.
    seeds: CompressedVector,
    /// Rank over the empty slots of the target universe.
    empty_rank: SarrayRank,
    bucket_seed: u64,
    num_bins: u64,
    num_keys: u64,
}

impl PerfectHash {
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();
        let meta_path = prefix.join(METADATA_FILE);
        let file = File::open(&meta_path).map_err(|e| Error::io(&meta_path, e))?;
        let mut reader = BufReader::new(file);
        let bucket_seed = packed::read_u64(&mut reader).map_err(|e| Error::io(&meta_path, e))?;
        let num_bins = packed::read_u64(&mut reader).map_err(|e| Error::io(&meta_path, e))?;

        let empty_rank = SarrayRank::open(prefix.join(EMPTY_SLOTS_DIR))?;
        let num_keys = num_bins - empty_rank.size();
        Ok(Self {
            seeds: CompressedVector::open(prefix.join(SEEDS_DIR))?,
            empty_rank,
            bucket_seed,
            num_bins,
            num_keys,
        })
    }

    /// Number of enrolled keys `N`.
    pub fn len(&self) -> u64 {
        self.num_keys
    }

    pub fn is_empty(&self) -> bool {
        self.num_keys == 0
    }

    /// The bucket-hash seed this function was built with.
    pub fn bucket_seed(&self) -> u64 {
        self.bucket_seed
    }

    /// Hash a key to its index in `[0, N)`.
    pub fn hash<K: HashKey + ?Sized>(&self, key: &K) -> u64 {
        self.hash_raw(hash_key(key, self.bucket_seed))
    }

    /// Hash from a pre-computed `H0` (seeded with [`bucket_seed`](Self::bucket_seed)).
    pub fn hash_raw(&self, hash: u64) -> u64 {
        let bucket = hash % self.seeds.len();
        let seed = self.seeds.get(bucket);
        let pos = displace(hash, seed) % self.num_bins;
        // shift left by the number of empty bins before this position; the
        // clamp only ever fires for non-enrolled keys that land on a
        // trailing empty bin
        (pos - self.empty_rank.rank(pos)).min(self.num_keys.saturating_sub(1))
    }
}
