// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fingerprinted key→value map over a minimal perfect hash.
//!
//! Two passes. Pass one enrolls every key into the hash builder while
//! spooling `(key bytes, value)` records to a temporary file. Pass two
//! replays that file through the finished hash, externally sorts the
//! `(index, fingerprint, value)` records by index, and writes one fixed-width
//! `(fingerprint, value)` slot per index into `values.bin`.
//!
//! Lookups hash the key, read the slot, and answer only when the stored
//! fingerprint matches — a non-enrolled key slips through with probability
//! `2^-F` for an `F`-bit fingerprint, which callers must treat as acceptable
//! by construction.

use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io::disk_vector::{DiskVector, FixedWidth};
use crate::io::packed;

use super::perfect_hash_builder::{PerfectHashBuilder, PerfectHashOptions};
use super::{fingerprint_bytes, HashKey, PerfectHash};
use xxhash_rust::xxh3::xxh3_64_with_seed;

pub const VALUES_FILE: &str = "values.bin";
const MAP_METADATA_FILE: &str = "map-metadata.bin";
const TMP_FILE: &str = "values.bin.tmp";

/// How many times a build retries with a rehashed bucket seed after an
/// `MphBuildFailure` before giving up.
const SEED_RETRIES: u64 = 3;

#[derive(Debug, Clone)]
pub struct PerfectHashMapOptions {
    pub hash: PerfectHashOptions,
    /// Fingerprint width in bits, at most 32.
    pub fingerprint_bits: u8,
}

impl PerfectHashMapOptions {
    pub fn new(prefix: impl Into<PathBuf>, num_keys: u64) -> Self {
        Self {
            hash: PerfectHashOptions::new(prefix, num_keys),
            fingerprint_bits: 32,
        }
    }
}

/// One `(fingerprint, value)` slot of `values.bin`.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintRecord<V: FixedWidth> {
    pub fingerprint: u32,
    pub value: V,
}

impl<V: FixedWidth> FixedWidth for FingerprintRecord<V> {
    const WIDTH: usize = 4 + V::WIDTH;

    fn read_from(buf: &[u8]) -> Self {
        Self {
            fingerprint: u32::read_from(buf),
            value: V::read_from(&buf[4..]),
        }
    }

    fn write_to(&self, buf: &mut [u8]) {
        self.fingerprint.write_to(buf);
        self.value.write_to(&mut buf[4..]);
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct PerfectHashMapBuilder<V: FixedWidth> {
    opts: PerfectHashMapOptions,
    tmp: BufWriter<File>,
    tmp_path: PathBuf,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
    count: u64,
    _marker: PhantomData<V>,
}

impl<V: FixedWidth> PerfectHashMapBuilder<V> {
    pub fn new(opts: PerfectHashMapOptions) -> Result<Self> {
        fs::create_dir_all(&opts.hash.prefix).map_err(|e| Error::io(&opts.hash.prefix, e))?;
        let tmp_path = opts.hash.prefix.join(TMP_FILE);
        let tmp = BufWriter::new(File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?);
        Ok(Self {
            opts,
            tmp,
            tmp_path,
            key_buf: Vec::new(),
            value_buf: vec![0u8; V::WIDTH],
            count: 0,
            _marker: PhantomData,
        })
    }

    /// Record one `(key, value)` pair. Each distinct key exactly once.
    pub fn insert<K: HashKey + ?Sized>(&mut self, key: &K, value: V) -> Result<()> {
        self.key_buf.clear();
        key.key_bytes(&mut self.key_buf);
        packed::write_bytes(&mut self.tmp, &self.key_buf).map_err(|e| Error::io(&self.tmp_path, e))?;
        value.write_to(&mut self.value_buf);
        self.tmp
            .write_all(&self.value_buf)
            .map_err(|e| Error::io(&self.tmp_path, e))?;
        self.count += 1;
        Ok(())
    }

    /// Build the hash function, reorder the values, and write `values.bin`.
    pub fn write(mut self) -> Result<()> {
        self.tmp.flush().map_err(|e| Error::io(&self.tmp_path, e))?;
        if self.count != self.opts.hash.num_keys {
            return Err(Error::MphBuildFailure {
                context: format!(
                    "map builder saw {} keys but was sized for {}",
                    self.count, self.opts.hash.num_keys
                ),
            });
        }

        let base_seed = self.opts.hash.bucket_seed;
        let mut last_err = None;
        for attempt in 0..SEED_RETRIES {
            let mut hash_opts = self.opts.hash.clone();
            hash_opts.bucket_seed = base_seed.wrapping_add(attempt.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            match self.build_hash(hash_opts) {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(err @ Error::MphBuildFailure { .. }) => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }
        if let Some(err) = last_err {
            return Err(err);
        }

        self.reorder_values()?;
        fs::remove_file(&self.tmp_path).map_err(|e| Error::io(&self.tmp_path, e))?;

        let meta_path = self.opts.hash.prefix.join(MAP_METADATA_FILE);
        let mut meta =
            BufWriter::new(File::create(&meta_path).map_err(|e| Error::io(&meta_path, e))?);
        packed::write_u64(&mut meta, u64::from(self.opts.fingerprint_bits))
            .map_err(|e| Error::io(&meta_path, e))?;
        meta.flush().map_err(|e| Error::io(&meta_path, e))?;
        Ok(())
    }

    /// Pass 1: enroll every spooled key under the given options.
    fn build_hash(&self, hash_opts: PerfectHashOptions) -> Result<()> {
        let seed = hash_opts.bucket_seed;
        let mut builder = PerfectHashBuilder::new(hash_opts)?;
        let mut reader = self.open_tmp()?;
        let mut value_skip = vec![0u8; V::WIDTH];
        loop {
            let key = match read_key_bytes(&mut reader) {
                Some(key) => key.map_err(|e| Error::io(&self.tmp_path, e))?,
                None => break,
            };
            reader
                .read_exact(&mut value_skip)
                .map_err(|e| Error::io(&self.tmp_path, e))?;
            builder.insert_hash(xxh3_64_with_seed(&key, seed))?;
        }
        builder.write()
    }

    /// Pass 2: sort `(index, fingerprint, value)` by index in spilled chunks
    /// and merge into `values.bin`.
    fn reorder_values(&self) -> Result<()> {
        let hash = PerfectHash::open(&self.opts.hash.prefix)?;
        let record_bytes = (16 + V::WIDTH) as u64;
        let buffer_cap = (self.opts.hash.max_ram / record_bytes).max(1024) as usize;

        let mut chunks: Vec<PathBuf> = Vec::new();
        let mut buffer: Vec<(u64, u32, V)> = Vec::with_capacity(buffer_cap);

        let mut reader = self.open_tmp()?;
        let mut value_buf = vec![0u8; V::WIDTH];
        loop {
            let key = match read_key_bytes(&mut reader) {
                Some(key) => key.map_err(|e| Error::io(&self.tmp_path, e))?,
                None => break,
            };
            reader
                .read_exact(&mut value_buf)
                .map_err(|e| Error::io(&self.tmp_path, e))?;

            let idx = hash.hash_raw(xxh3_64_with_seed(&key, hash.bucket_seed()));
            let fp = fingerprint_bytes(&key, self.opts.fingerprint_bits);
            buffer.push((idx, fp, V::read_from(&value_buf)));

            if buffer.len() >= buffer_cap {
                chunks.push(self.flush_value_chunk(&mut buffer, chunks.len())?);
            }
        }
        if !buffer.is_empty() {
            chunks.push(self.flush_value_chunk(&mut buffer, chunks.len())?);
        }

        self.merge_value_chunks(&chunks)?;
        for chunk in &chunks {
            fs::remove_file(chunk).map_err(|e| Error::io(chunk, e))?;
        }
        Ok(())
    }

    fn flush_value_chunk(
        &self,
        buffer: &mut Vec<(u64, u32, V)>,
        chunk_num: usize,
    ) -> Result<PathBuf> {
        buffer.sort_unstable_by_key(|&(idx, _, _)| idx);
        let path = self.opts.hash.prefix.join(format!("value-chunk.{}", chunk_num));
        let mut out = BufWriter::new(File::create(&path).map_err(|e| Error::io(&path, e))?);
        let mut value_bytes = vec![0u8; V::WIDTH];
        for &(idx, fp, value) in buffer.iter() {
            packed::write_u64(&mut out, idx).map_err(|e| Error::io(&path, e))?;
            packed::write_u64(&mut out, u64::from(fp)).map_err(|e| Error::io(&path, e))?;
            value.write_to(&mut value_bytes);
            out.write_all(&value_bytes).map_err(|e| Error::io(&path, e))?;
        }
        out.flush().map_err(|e| Error::io(&path, e))?;
        buffer.clear();
        Ok(path)
    }

    fn merge_value_chunks(&self, chunks: &[PathBuf]) -> Result<()> {
        let mut heap = BinaryHeap::new();
        for path in chunks {
            if let Some(cursor) = ValueChunkCursor::<V>::open(path.clone())? {
                heap.push(std::cmp::Reverse(cursor));
            }
        }

        let out_path = self.opts.hash.prefix.join(VALUES_FILE);
        let mut out = BufWriter::new(File::create(&out_path).map_err(|e| Error::io(&out_path, e))?);
        let mut slot_bytes = vec![0u8; FingerprintRecord::<V>::WIDTH];
        let mut expected = 0u64;
        while let Some(std::cmp::Reverse(mut cursor)) = heap.pop() {
            let (idx, fp, value) = cursor.head;
            if idx != expected {
                return Err(Error::corruption(
                    &out_path,
                    format!("hash image skipped slot {} (got {})", expected, idx),
                ));
            }
            FingerprintRecord { fingerprint: fp, value }.write_to(&mut slot_bytes);
            out.write_all(&slot_bytes).map_err(|e| Error::io(&out_path, e))?;
            expected += 1;
            if cursor.advance()? {
                heap.push(std::cmp::Reverse(cursor));
            }
        }
        if expected != self.opts.hash.num_keys {
            return Err(Error::corruption(
                &out_path,
                format!(
                    "wrote {} of {} value slots",
                    expected, self.opts.hash.num_keys
                ),
            ));
        }
        out.flush().map_err(|e| Error::io(&out_path, e))
    }

    fn open_tmp(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.tmp_path).map_err(|e| Error::io(&self.tmp_path, e))?;
        Ok(BufReader::new(file))
    }
}

/// Read a length-prefixed key; `None` at clean EOF.
fn read_key_bytes<R: Read>(reader: &mut R) -> Option<std::io::Result<Vec<u8>>> {
    let len = match packed::try_read_u64(reader) {
        Ok(Some(len)) => len,
        Ok(None) => return None,
        Err(e) => return Some(Err(e)),
    };
    let mut key = vec![0u8; len as usize];
    match reader.read_exact(&mut key) {
        Ok(()) => Some(Ok(key)),
        Err(e) => Some(Err(e)),
    }
}

struct ValueChunkCursor<V: FixedWidth> {
    reader: BufReader<File>,
    path: PathBuf,
    head: (u64, u32, V),
    value_buf: Vec<u8>,
}

impl<V: FixedWidth> ValueChunkCursor<V> {
    fn open(path: PathBuf) -> Result<Option<Self>> {
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let value_buf = vec![0u8; V::WIDTH];
        let mut cursor = Self {
            reader: BufReader::new(file),
            path,
            head: (0, 0, V::read_from(&value_buf)),
            value_buf,
        };
        Ok(if cursor.advance()? { Some(cursor) } else { None })
    }

    fn advance(&mut self) -> Result<bool> {
        let idx = match packed::try_read_u64(&mut self.reader) {
            Ok(Some(idx)) => idx,
            Ok(None) => return Ok(false),
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        let fp = packed::read_u64(&mut self.reader).map_err(|e| Error::io(&self.path, e))? as u32;
        self.reader
            .read_exact(&mut self.value_buf)
            .map_err(|e| Error::io(&self.path, e))?;
        self.head = (idx, fp, V::read_from(&self.value_buf));
        Ok(true)
    }
}

impl<V: FixedWidth> PartialEq for ValueChunkCursor<V> {
    fn eq(&self, other: &Self) -> bool {
        self.head.0 == other.head.0
    }
}

impl<V: FixedWidth> Eq for ValueChunkCursor<V> {}

impl<V: FixedWidth> PartialOrd for ValueChunkCursor<V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<V: FixedWidth> Ord for ValueChunkCursor<V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.head.0.cmp(&other.head.0)
    }
}

// ============================================================================
// READER
// ============================================================================

pub struct PerfectHashMap<V: FixedWidth> {
    hash: PerfectHash,
    records: DiskVector<FingerprintRecord<V>>,
    fingerprint_bits: u8,
}

impl<V: FixedWidth> PerfectHashMap<V> {
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();
        let hash = PerfectHash::open(prefix)?;
        let records = DiskVector::open(prefix.join(VALUES_FILE))?;
        if records.len() as u64 != hash.len() {
            return Err(Error::corruption(
                prefix.join(VALUES_FILE),
                format!(
                    "{} value slots for a hash over {} keys",
                    records.len(),
                    hash.len()
                ),
            ));
        }

        let meta_path = prefix.join(MAP_METADATA_FILE);
        let file = File::open(&meta_path).map_err(|e| Error::io(&meta_path, e))?;
        let fingerprint_bits =
            packed::read_u64(&mut BufReader::new(file)).map_err(|e| Error::io(&meta_path, e))? as u8;

        Ok(Self {
            hash,
            records,
            fingerprint_bits,
        })
    }

    pub fn len(&self) -> u64 {
        self.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }

    /// The slot index for `key`, or `None` on fingerprint mismatch.
    pub fn index<K: HashKey + ?Sized>(&self, key: &K) -> Option<u64> {
        self.index_and_value(key).map(|(idx, _)| idx)
    }

    /// The stored value for `key`, or `None` on fingerprint mismatch.
    pub fn get<K: HashKey + ?Sized>(&self, key: &K) -> Option<V> {
        self.index_and_value(key).map(|(_, value)| value)
    }

    pub fn index_and_value<K: HashKey + ?Sized>(&self, key: &K) -> Option<(u64, V)> {
        if self.is_empty() {
            return None;
        }
        let mut buf = Vec::with_capacity(16);
        key.key_bytes(&mut buf);
        let idx = self
            .hash
            .hash_raw(xxh3_64_with_seed(&buf, self.hash.bucket_seed()));
        let record = self.records.get(idx as usize);
        (record.fingerprint == fingerprint_bytes(&buf, self.fingerprint_bits))
            .then_some((idx, record.value))
    }

    /// The value stored at a known-valid slot, bypassing the fingerprint.
    pub fn value_at(&self, index: u64) -> V {
        self.records.get(index as usize).value
    }
}
