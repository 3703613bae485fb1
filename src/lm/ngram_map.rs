// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-order hashed n-gram maps.
//!
//! Layer 0 maps unigram surfaces to `(prob, backoff)` — a unigram's id is
//! its slot in this map. Layers `1..N-2` map id sequences to
//! `(prob, backoff)`; the top layer maps id sequences to a bare probability
//! (nothing ever backs off *from* the top order).

use std::path::PathBuf;

use crate::hashing::{
    PerfectHashMap, PerfectHashMapBuilder, PerfectHashMapOptions, PerfectHashOptions,
};

use super::ProbBackoff;

pub type UnigramMap = PerfectHashMap<ProbBackoff>;
pub type MiddleMap = PerfectHashMap<ProbBackoff>;
pub type TopMap = PerfectHashMap<f32>;

pub type UnigramMapBuilder = PerfectHashMapBuilder<ProbBackoff>;
pub type MiddleMapBuilder = PerfectHashMapBuilder<ProbBackoff>;
pub type TopMapBuilder = PerfectHashMapBuilder<f32>;

/// Hashing parameters shared by every layer of one model.
#[derive(Debug, Clone)]
pub struct NgramMapOptions {
    pub max_ram: u64,
    pub num_per_bucket: u64,
    pub load_factor: f64,
    pub fingerprint_bits: u8,
}

impl Default for NgramMapOptions {
    fn default() -> Self {
        Self {
            max_ram: 1024 * 1024 * 1024,
            num_per_bucket: 4,
            load_factor: 0.99,
            fingerprint_bits: 32,
        }
    }
}

impl NgramMapOptions {
    /// Options for one layer's map, rooted at `prefix` and sized for
    /// `num_keys` n-grams.
    pub fn layer(&self, prefix: PathBuf, num_keys: u64) -> PerfectHashMapOptions {
        PerfectHashMapOptions {
            hash: PerfectHashOptions {
                prefix,
                num_keys,
                max_ram: self.max_ram,
                num_per_bucket: self.num_per_bucket,
                load_factor: self.load_factor,
                bucket_seed: 0,
            },
            fingerprint_bits: self.fingerprint_bits,
        }
    }
}
