// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Build and query configuration, loaded from a TOML file.
//!
//! ```toml
//! prefix = "/data/indexes"
//! dataset = "cranfield"
//! uninvert = true
//! indexer-ram-budget = 536870912
//!
//! [ranker]
//! method = "bm25"
//! k1 = 1.2
//! b = 0.75
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::hashing::{PerfectHashMapOptions, PerfectHashOptions};

fn default_ram_budget() -> u64 {
    1024 * 1024 * 1024
}

fn default_max_writers() -> usize {
    8
}

fn default_load_factor() -> f64 {
    0.99
}

fn default_num_per_bucket() -> u64 {
    4
}

fn default_fingerprint_bits() -> u8 {
    32
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Root directory for all index artifacts.
    pub prefix: PathBuf,
    /// Corpus name; also the default on-disk index folder name.
    pub dataset: String,
    /// Override for the index folder name.
    #[serde(default)]
    pub index_name: Option<String>,
    /// Path to the corpus file. Defaults to `<prefix>/<dataset>/<dataset>.dat`.
    #[serde(default)]
    pub corpus: Option<PathBuf>,
    /// Also build the forward index by uninverting.
    #[serde(default)]
    pub uninvert: bool,
    /// Chunk buffer size in bytes.
    #[serde(default = "default_ram_budget")]
    pub indexer_ram_budget: u64,
    /// Maximum concurrent analysis workers.
    #[serde(default = "default_max_writers")]
    pub indexer_max_writers: usize,
    /// Perfect hash load factor α.
    #[serde(default = "default_load_factor")]
    pub load_factor: f64,
    /// Perfect hash keys per bucket.
    #[serde(default = "default_num_per_bucket")]
    pub num_per_bucket: u64,
    /// Fingerprint width for hashed maps.
    #[serde(default = "default_fingerprint_bits")]
    pub fingerprint_bits: u8,
    /// Ranker selection and parameters for the CLI search front-end.
    #[serde(default)]
    pub ranker: Option<toml::Table>,
}

impl IndexConfig {
    /// Load a config file. Unreadable or malformed configs are misuse, not
    /// I/O failures or index corruption — the CLI maps them to exit code 1.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::misuse(format!("cannot read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&text).map_err(|e| {
            Error::misuse(format!("config {} is not valid TOML: {}", path.display(), e))
        })
    }

    /// Directory holding the on-disk index.
    pub fn index_dir(&self) -> PathBuf {
        let name = self.index_name.as_deref().unwrap_or(&self.dataset);
        self.prefix.join(name)
    }

    /// Path of the corpus file to analyze.
    pub fn corpus_file(&self) -> PathBuf {
        self.corpus.clone().unwrap_or_else(|| {
            self.prefix
                .join(&self.dataset)
                .join(format!("{}.dat", self.dataset))
        })
    }

    /// Perfect-hash-map options rooted at `prefix`, sized for `num_keys`.
    pub fn map_options(&self, prefix: PathBuf, num_keys: u64) -> PerfectHashMapOptions {
        PerfectHashMapOptions {
            hash: PerfectHashOptions {
                prefix,
                num_keys,
                max_ram: self.indexer_ram_budget,
                num_per_bucket: self.num_per_bucket,
                load_factor: self.load_factor,
                bucket_seed: 0,
            },
            fingerprint_bits: self.fingerprint_bits,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from("."),
            dataset: "corpus".to_owned(),
            index_name: None,
            corpus: None,
            uninvert: false,
            indexer_ram_budget: default_ram_budget(),
            indexer_max_writers: default_max_writers(),
            load_factor: default_load_factor(),
            num_per_bucket: default_num_per_bucket(),
            fingerprint_bits: default_fingerprint_bits(),
            ranker: None,
        }
    }
}
