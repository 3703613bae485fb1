// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Minimal perfect hash construction: hash, displace, and compress.
//!
//! Keys hash to buckets; buckets are processed in descending size order, each
//! scanning seed values until every key lands on a distinct unoccupied slot
//! of a target universe slightly larger than the key count. The per-bucket
//! seeds compress into a [`CompressedVector`] and an sarray over the empty
//! slots reduces the perfect hash to a minimal one.
//!
//! The bucket-partition phase spills sorted `(bucket, hash)` chunks to disk
//! when the RAM budget is hit and k-way merges them back, so enrollment is
//! not bounded by memory. The seed search runs buckets in parallel; the
//! resulting hash depends on acceptance order, but every build yields a
//! valid minimal perfect hash over the same key set.
//!
//! See the CHD paper: <http://cmph.sourceforge.net/papers/esa09.pdf>.

use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::packed;
use crate::succinct::sarray::{make_sarray, SarrayRank};
use crate::succinct::CompressedVector;

use super::{displace, hash_key, HashKey};

/// Documented ceiling for the per-bucket seed search.
pub const MAX_SEED_ATTEMPTS: u64 = 1 << 32;

/// Metadata file: varint `bucket_seed` followed by varint `num_bins`.
pub const METADATA_FILE: &str = "hash-metadata.bin";
pub const SEEDS_DIR: &str = "seeds";
pub const EMPTY_SLOTS_DIR: &str = "sarray";

#[derive(Debug, Clone)]
pub struct PerfectHashOptions {
    /// Output directory.
    pub prefix: PathBuf,
    /// Exact number of distinct keys that will be enrolled.
    pub num_keys: u64,
    /// Buffer budget in bytes for the bucket-partition phase.
    pub max_ram: u64,
    /// Average keys per bucket.
    pub num_per_bucket: u64,
    /// Load factor α: the target universe is `ceil(num_keys / α)` bins.
    pub load_factor: f64,
    /// Seed of the bucket hash `H0`.
    pub bucket_seed: u64,
}

impl PerfectHashOptions {
    pub fn new(prefix: impl Into<PathBuf>, num_keys: u64) -> Self {
        Self {
            prefix: prefix.into(),
            num_keys,
            max_ram: 1024 * 1024 * 1024,
            num_per_bucket: 4,
            load_factor: 0.99,
            bucket_seed: 0,
        }
    }
}

/// Streaming builder. Call [`insert`](Self::insert) once per distinct key,
/// then [`write`](Self::write).
pub struct PerfectHashBuilder {
    opts: PerfectHashOptions,
    num_buckets: u64,
    buffer: Vec<(u64, u64)>,
    num_chunks: u64,
}

impl PerfectHashBuilder {
    pub fn new(opts: PerfectHashOptions) -> Result<Self> {
        fs::create_dir_all(&opts.prefix).map_err(|e| Error::io(&opts.prefix, e))?;
        // a rebuild must not inherit artifacts from a previous construction
        for stale in [SEEDS_DIR, EMPTY_SLOTS_DIR] {
            let dir = opts.prefix.join(stale);
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            }
        }

        let num_buckets = (opts.num_keys / opts.num_per_bucket.max(1)).max(1);
        Ok(Self {
            opts,
            num_buckets,
            buffer: Vec::new(),
            num_chunks: 0,
        })
    }

    pub fn insert<K: HashKey + ?Sized>(&mut self, key: &K) -> Result<()> {
        self.insert_hash(hash_key(key, self.opts.bucket_seed))
    }

    /// Enroll a pre-computed `H0` hash. All derived quantities depend only on
    /// this value, so callers that stream raw key bytes can hash once.
    pub fn insert_hash(&mut self, hash: u64) -> Result<()> {
        self.buffer.push((hash % self.num_buckets, hash));
        let bytes = self.buffer.len() as u64 * 16;
        if bytes >= self.opts.max_ram {
            self.flush_chunk()?;
        }
        Ok(())
    }

    fn chunk_path(&self, chunk: u64) -> PathBuf {
        self.opts.prefix.join(format!("hash-chunk.{}", chunk))
    }

    fn flush_chunk(&mut self) -> Result<()> {
        self.buffer.sort_unstable();
        let path = self.chunk_path(self.num_chunks);
        let mut out = BufWriter::new(File::create(&path).map_err(|e| Error::io(&path, e))?);
        for &(bucket, hash) in &self.buffer {
            packed::write_u64(&mut out, bucket).map_err(|e| Error::io(&path, e))?;
            packed::write_u64(&mut out, hash).map_err(|e| Error::io(&path, e))?;
        }
        out.flush().map_err(|e| Error::io(&path, e))?;
        self.buffer.clear();
        self.num_chunks += 1;
        Ok(())
    }

    /// Finish enrollment and write the hash function to disk.
    pub fn write(mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.flush_chunk()?;
        }

        let buckets = self.merge_chunks()?;
        for chunk in 0..self.num_chunks {
            let path = self.chunk_path(chunk);
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }

        self.construct(buckets)
    }

    /// Merge the sorted chunk files into per-bucket hash groups.
    fn merge_chunks(&self) -> Result<Vec<(u64, Vec<u64>)>> {
        let mut cursors = Vec::with_capacity(self.num_chunks as usize);
        for chunk in 0..self.num_chunks {
            if let Some(cursor) = ChunkCursor::open(self.chunk_path(chunk))? {
                cursors.push(cursor);
            }
        }

        let mut heap: BinaryHeap<std::cmp::Reverse<ChunkCursor>> =
            cursors.into_iter().map(std::cmp::Reverse).collect();

        let mut buckets: Vec<(u64, Vec<u64>)> = Vec::new();
        let mut total = 0u64;
        while let Some(std::cmp::Reverse(mut cursor)) = heap.pop() {
            let (bucket, hash) = cursor.head;
            match buckets.last_mut() {
                Some((id, hashes)) if *id == bucket => {
                    if hashes.contains(&hash) {
                        return Err(Error::MphBuildFailure {
                            context: format!(
                                "two keys share the 64-bit hash {:#x} in bucket {}; \
                                 retry with a different bucket seed",
                                hash, bucket
                            ),
                        });
                    }
                    hashes.push(hash);
                }
                _ => buckets.push((bucket, vec![hash])),
            }
            total += 1;
            if cursor.advance()? {
                heap.push(std::cmp::Reverse(cursor));
            }
        }

        if total != self.opts.num_keys {
            return Err(Error::MphBuildFailure {
                context: format!(
                    "enrolled {} keys but the builder was sized for {}",
                    total, self.opts.num_keys
                ),
            });
        }
        Ok(buckets)
    }

    /// Seed search over buckets in descending size order, then compression.
    ///
    /// Buckets search in parallel; a mutex serializes acceptance so each
    /// seed's slots are claimed atomically against the shared occupancy
    /// vector. Optimistic probes read the occupancy without the lock — a
    /// stale read only costs a re-check under the lock.
    fn construct(&self, mut buckets: Vec<(u64, Vec<u64>)>) -> Result<()> {
        buckets.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));

        let num_bins = ((self.opts.num_keys as f64 / self.opts.load_factor).ceil() as u64)
            .max(self.opts.num_keys);
        let occupied: Vec<AtomicU64> = (0..(num_bins as usize + 63) / 64)
            .map(|_| AtomicU64::new(0))
            .collect();
        let accept = Mutex::new(());

        let is_free = |p: u64| occupied[(p / 64) as usize].load(Ordering::Relaxed) >> (p % 64) & 1 == 0;

        let assigned: Vec<(u64, u64)> = buckets
            .par_iter()
            .map(|(bucket_id, hashes)| {
                let mut positions = Vec::with_capacity(hashes.len());
                for seed in 0..MAX_SEED_ATTEMPTS {
                    positions.clear();
                    positions.extend(hashes.iter().map(|&h| displace(h, seed) % num_bins));
                    positions.sort_unstable();
                    if positions.windows(2).any(|w| w[0] == w[1]) {
                        continue;
                    }
                    if !positions.iter().all(|&p| is_free(p)) {
                        continue;
                    }
                    let _guard = accept.lock();
                    if !positions.iter().all(|&p| is_free(p)) {
                        continue; // lost the race, try the next seed
                    }
                    for &p in &positions {
                        occupied[(p / 64) as usize].fetch_or(1 << (p % 64), Ordering::Relaxed);
                    }
                    return Ok((*bucket_id, seed));
                }
                Err(Error::MphBuildFailure {
                    context: format!(
                        "seed search exhausted {} attempts for a bucket of {} keys",
                        MAX_SEED_ATTEMPTS,
                        hashes.len()
                    ),
                })
            })
            .collect::<Result<_>>()?;

        let mut seeds = vec![0u64; self.num_buckets as usize];
        for (bucket_id, seed) in assigned {
            seeds[bucket_id as usize] = seed;
        }
        debug!(
            num_keys = self.opts.num_keys,
            num_bins, "perfect hash seed search complete"
        );

        CompressedVector::build(self.opts.prefix.join(SEEDS_DIR), &seeds)?;

        let empty = (0..num_bins).filter(|&p| is_free(p));
        make_sarray(
            self.opts.prefix.join(EMPTY_SLOTS_DIR),
            empty,
            num_bins - self.opts.num_keys,
            num_bins,
        )?;
        // materialize the rank index while we still own the directory
        SarrayRank::open(self.opts.prefix.join(EMPTY_SLOTS_DIR))?;

        let meta_path = self.opts.prefix.join(METADATA_FILE);
        let mut meta =
            BufWriter::new(File::create(&meta_path).map_err(|e| Error::io(&meta_path, e))?);
        packed::write_u64(&mut meta, self.opts.bucket_seed).map_err(|e| Error::io(&meta_path, e))?;
        packed::write_u64(&mut meta, num_bins).map_err(|e| Error::io(&meta_path, e))?;
        meta.flush().map_err(|e| Error::io(&meta_path, e))?;
        Ok(())
    }
}

/// Streaming cursor over one sorted `(bucket, hash)` chunk file.
struct ChunkCursor {
    reader: BufReader<File>,
    path: PathBuf,
    head: (u64, u64),
}

impl ChunkCursor {
    fn open(path: PathBuf) -> Result<Option<Self>> {
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let mut cursor = Self {
            reader: BufReader::new(file),
            path,
            head: (0, 0),
        };
        Ok(if cursor.advance()? { Some(cursor) } else { None })
    }

    /// Read the next record into `head`; false at end of chunk.
    fn advance(&mut self) -> Result<bool> {
        let bucket = match packed::try_read_u64(&mut self.reader) {
            Ok(Some(bucket)) => bucket,
            Ok(None) => return Ok(false),
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        let hash = packed::read_u64(&mut self.reader).map_err(|e| Error::io(&self.path, e))?;
        self.head = (bucket, hash);
        Ok(true)
    }
}

impl PartialEq for ChunkCursor {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head
    }
}

impl Eq for ChunkCursor {}

impl PartialOrd for ChunkCursor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChunkCursor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.head.cmp(&other.head)
    }
}
