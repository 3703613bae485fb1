// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sparse rank/select: the sarray structure of Okanohara and Sadakane.
//!
//! A strictly increasing sequence of `M` positions in `[0, N)` splits into
//! low and high halves: each position keeps its low `floor(log2(N/M))` bits
//! in a packed stream, and its high bits go into a unary-coded stream where
//! the `k`-th one sits at bit `(position >> low_bits) + k`. Rank runs a
//! select-0 over the high stream; select runs a select-1. Both piggyback on
//! the darray structures in this module's sibling.
//!
//! The high stream is padded to exactly `M + (N >> low_bits)` bits so that
//! `rank(i)` is defined for every `i <= N`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io::packed;
use crate::succinct::bit_vector::{BitVectorBuilder, BitVectorFile, BitVectorView};
use crate::succinct::darray::{Darray0, Darray1};
use crate::succinct::msb;

const LOW_FILE: &str = "sarray.low.bin";
const HIGH_FILE: &str = "sarray.high.bin";
const NUM_BITS_FILE: &str = "sarray.high.num_bits.bin";
/// Sub-directory holding the select-0 index used by rank queries.
const RANK_DIR: &str = "rank";
/// Sub-directory holding the select-1 index used by select queries.
const SELECT_DIR: &str = "select";

// ============================================================================
// BUILDER
// ============================================================================

/// Streaming builder: positions must arrive in strictly increasing order.
pub struct SarrayBuilder {
    low: BitVectorBuilder<BufWriter<File>>,
    high: BitVectorBuilder<BufWriter<File>>,
    dir: PathBuf,
    low_bits: u8,
    low_mask: u64,
    num_ones: u64,
    num_bits: u64,
    pushed: u64,
    next_high_bit: u64,
}

impl SarrayBuilder {
    /// `num_ones` positions will be recorded over a universe of `num_bits`.
    pub fn new(dir: impl AsRef<Path>, num_ones: u64, num_bits: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let ratio = if num_ones > 0 { num_bits / num_ones } else { 0 };
        let low_bits = if ratio > 0 { msb(ratio) as u8 } else { 0 };

        let low_path = dir.join(LOW_FILE);
        let high_path = dir.join(HIGH_FILE);
        Ok(Self {
            low: BitVectorBuilder::new(BufWriter::new(
                File::create(&low_path).map_err(|e| Error::io(&low_path, e))?,
            )),
            high: BitVectorBuilder::new(BufWriter::new(
                File::create(&high_path).map_err(|e| Error::io(&high_path, e))?,
            )),
            dir,
            low_bits,
            low_mask: if low_bits == 0 { 0 } else { (1u64 << low_bits) - 1 },
            num_ones,
            num_bits,
            pushed: 0,
            next_high_bit: 0,
        })
    }

    pub fn push(&mut self, position: u64) -> Result<()> {
        if self.pushed == self.num_ones {
            return Err(Error::out_of_range(format!(
                "more than {} positions pushed into sarray builder",
                self.num_ones
            )));
        }
        if position >= self.num_bits {
            return Err(Error::out_of_range(format!(
                "sarray position {} outside universe of {} bits",
                position, self.num_bits
            )));
        }
        if self.low_bits > 0 {
            self.low
                .write_bits(position & self.low_mask, self.low_bits)
                .map_err(|e| Error::io(self.dir.join(LOW_FILE), e))?;
        }

        let upper_bit = (position >> self.low_bits) + self.pushed;
        if upper_bit < self.next_high_bit {
            return Err(Error::out_of_range(format!(
                "sarray positions must be strictly increasing (got {} after {} pushes)",
                position, self.pushed
            )));
        }
        self.write_high_zeros(upper_bit - self.next_high_bit)?;
        self.high
            .write_bits(1, 1)
            .map_err(|e| Error::io(self.dir.join(HIGH_FILE), e))?;
        self.next_high_bit = upper_bit + 1;
        self.pushed += 1;
        Ok(())
    }

    fn write_high_zeros(&mut self, mut count: u64) -> Result<()> {
        while count > 0 {
            let chunk = count.min(64);
            self.high
                .write_bits(0, chunk as u8)
                .map_err(|e| Error::io(self.dir.join(HIGH_FILE), e))?;
            count -= chunk;
        }
        Ok(())
    }

    /// Pad the high stream to its fixed size and write all sidecars.
    pub fn finish(mut self) -> Result<()> {
        if self.pushed != self.num_ones {
            return Err(Error::out_of_range(format!(
                "sarray builder got {} of {} promised positions",
                self.pushed, self.num_ones
            )));
        }

        let total_high = self.num_ones + (self.num_bits >> self.low_bits);
        let written = self.high.total_bits();
        self.write_high_zeros(total_high - written)?;

        let low_path = self.dir.join(LOW_FILE);
        let high_path = self.dir.join(HIGH_FILE);
        self.low.finish().map_err(|e| Error::io(&low_path, e))?;
        self.high.finish().map_err(|e| Error::io(&high_path, e))?;

        let nb_path = self.dir.join(NUM_BITS_FILE);
        let mut nb =
            BufWriter::new(File::create(&nb_path).map_err(|e| Error::io(&nb_path, e))?);
        packed::write_u64(&mut nb, total_high).map_err(|e| Error::io(&nb_path, e))?;
        packed::write_u64(&mut nb, u64::from(self.low_bits)).map_err(|e| Error::io(&nb_path, e))?;
        nb.flush().map_err(|e| Error::io(&nb_path, e))?;
        Ok(())
    }
}

/// Build an sarray in `dir` from an iterator of ascending positions.
pub fn make_sarray<I>(dir: impl AsRef<Path>, positions: I, num_ones: u64, num_bits: u64) -> Result<()>
where
    I: IntoIterator<Item = u64>,
{
    let mut builder = SarrayBuilder::new(dir, num_ones, num_bits)?;
    for pos in positions {
        builder.push(pos)?;
    }
    builder.finish()
}

// ============================================================================
// STORAGE
// ============================================================================

/// The high/low bit storage. Query through [`SarrayRank`] or
/// [`SarraySelect`].
pub struct Sarray {
    high: BitVectorFile,
    low: BitVectorFile,
    high_bit_count: u64,
    low_bits: u8,
}

impl Sarray {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let nb_path = dir.join(NUM_BITS_FILE);
        let file = File::open(&nb_path).map_err(|e| Error::io(&nb_path, e))?;
        let mut reader = BufReader::new(file);
        let high_bit_count = packed::read_u64(&mut reader).map_err(|e| Error::io(&nb_path, e))?;
        let low_bits = packed::read_u64(&mut reader).map_err(|e| Error::io(&nb_path, e))? as u8;

        Ok(Self {
            high: BitVectorFile::with_bits(dir.join(HIGH_FILE), high_bit_count)?,
            low: {
                let path = dir.join(LOW_FILE);
                let size = fs::metadata(&path).map_err(|e| Error::io(&path, e))?.len();
                BitVectorFile::with_bits(path, size * 8)?
            },
            high_bit_count,
            low_bits,
        })
    }

    pub fn high_bits(&self) -> BitVectorView<'_> {
        self.high.view()
    }

    pub fn low_bits(&self) -> BitVectorView<'_> {
        self.low.view()
    }

    /// Low bits stored per position (not the total).
    pub fn num_low_bits(&self) -> u8 {
        self.low_bits
    }

    fn high_file(dir: &Path) -> Result<BitVectorFile> {
        let nb_path = dir.join(NUM_BITS_FILE);
        let file = File::open(&nb_path).map_err(|e| Error::io(&nb_path, e))?;
        let count = packed::read_u64(&mut BufReader::new(file)).map_err(|e| Error::io(&nb_path, e))?;
        BitVectorFile::with_bits(dir.join(HIGH_FILE), count)
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Rank queries: `rank(i)` counts stored positions strictly below `i`.
pub struct SarrayRank {
    sarray: Sarray,
    zeros: Darray0,
}

impl SarrayRank {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            sarray: Sarray::open(dir)?,
            zeros: Darray0::open(dir.join(RANK_DIR), Sarray::high_file(dir)?)?,
        })
    }

    /// Number of stored positions.
    pub fn size(&self) -> u64 {
        self.sarray.high_bit_count - self.zeros.num_positions()
    }

    /// Count of stored positions `< i`, for any `i` up to the universe size.
    ///
    /// See <https://github.com/ot/succinct/blob/master/elias_fano.hpp>.
    pub fn rank(&self, i: u64) -> u64 {
        let low_bits = self.sarray.num_low_bits();
        let high_query = i >> low_bits;

        if high_query >= self.zeros.num_positions() {
            return self.size();
        }

        let mut high_pos = self.zeros.select(high_query);
        let mut rank = high_pos - high_query;

        let high = self.sarray.high_bits();
        let low = self.sarray.low_bits();
        let low_val = if low_bits == 0 {
            0
        } else {
            i & ((1u64 << low_bits) - 1)
        };
        while high_pos > 0
            && high.bit(high_pos - 1)
            && low.extract((rank - 1) * u64::from(low_bits), low_bits) >= low_val
        {
            rank -= 1;
            high_pos -= 1;
        }
        rank
    }
}

/// Select queries: `select(k)` recovers the `k`-th stored position.
pub struct SarraySelect {
    sarray: Sarray,
    ones: Darray1,
}

impl SarraySelect {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            sarray: Sarray::open(dir)?,
            ones: Darray1::open(dir.join(SELECT_DIR), Sarray::high_file(dir)?)?,
        })
    }

    pub fn size(&self) -> u64 {
        self.ones.num_positions()
    }

    pub fn select(&self, k: u64) -> u64 {
        let low_bits = self.sarray.num_low_bits();
        let low = self
            .sarray
            .low_bits()
            .extract(k * u64::from(low_bits), low_bits);
        (self.ones.select(k) - k) << low_bits | low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn build(dir: &Path, positions: &[u64], universe: u64) -> (SarrayRank, SarraySelect) {
        make_sarray(dir, positions.iter().copied(), positions.len() as u64, universe).unwrap();
        (SarrayRank::open(dir).unwrap(), SarraySelect::open(dir).unwrap())
    }

    #[test]
    fn rank_and_select_on_scattered_positions() {
        let dir = tempfile::tempdir().unwrap();
        let positions = [0u64, 5, 5000, 10_000, 1_000_000];
        let (rank, select) = build(dir.path(), &positions, 2_000_000);

        for (k, &pos) in positions.iter().enumerate() {
            assert_eq!(select.select(k as u64), pos);
            assert_eq!(rank.rank(pos), k as u64);
            assert_eq!(rank.rank(pos + 1), k as u64 + 1);
        }
        assert_eq!(rank.rank(0), 0);
        assert_eq!(rank.rank(5001), 3);
        assert_eq!(rank.rank(2_000_000), 5);
        assert_eq!(rank.size(), 5);
        assert_eq!(select.size(), 5);
    }

    #[test]
    fn full_universe() {
        let dir = tempfile::tempdir().unwrap();
        let positions: Vec<u64> = (0..500).collect();
        let (rank, select) = build(dir.path(), &positions, 500);

        for k in 0..500u64 {
            assert_eq!(select.select(k), k);
            assert_eq!(rank.rank(k), k);
        }
        assert_eq!(rank.rank(500), 500);
    }

    #[test]
    fn empty_position_set() {
        let dir = tempfile::tempdir().unwrap();
        let (rank, _select) = build(dir.path(), &[], 1000);

        assert_eq!(rank.size(), 0);
        assert_eq!(rank.rank(0), 0);
        assert_eq!(rank.rank(500), 0);
        assert_eq!(rank.rank(1000), 0);
    }

    #[test]
    fn builder_rejects_overflow_and_disorder() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = SarrayBuilder::new(dir.path().join("a"), 1, 100).unwrap();
        builder.push(10).unwrap();
        assert!(builder.push(20).is_err());

        let mut builder = SarrayBuilder::new(dir.path().join("b"), 2, 10).unwrap();
        builder.push(9).unwrap();
        assert!(builder.push(3).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn matches_naive_model(
            raw in prop::collection::btree_set(0u64..10_000, 0..300),
            extra in 1u64..1000,
        ) {
            let positions: Vec<u64> = raw.iter().copied().collect();
            let universe = positions.last().map_or(extra, |&max| max + extra);

            let dir = tempfile::tempdir().unwrap();
            let (rank, select) = build(dir.path(), &positions, universe);

            for (k, &pos) in positions.iter().enumerate() {
                prop_assert_eq!(select.select(k as u64), pos);
            }
            // spot-check rank against the naive count
            for i in (0..=universe).step_by(97) {
                let expected = positions.iter().filter(|&&p| p < i).count() as u64;
                prop_assert_eq!(rank.rank(i), expected);
            }
        }
    }
}
