// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dense select: the darray structure of Okanohara and Sadakane.
//!
//! Ones are grouped into blocks of `L = 1024`. A block spanning more than
//! `L2 = 65536` bits stores every position explicitly (the block entry goes
//! negative and indexes the explicit array); otherwise the entry is the
//! block's first position and every `L3 = 32`-nd one is recorded as a 16-bit
//! offset from it, leaving at most 31 ones to scan by popcount at query
//! time. `Darray0` runs the identical construction over the complemented
//! words for select-0.
//!
//! Adapted from the layout used by Giuseppe Ottaviano's succinct library.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::disk_vector::{DiskVector, DiskVectorWriter};
use crate::io::packed;
use crate::succinct::bit_vector::{BitVectorFile, BitVectorView};
use crate::succinct::select_in_word;

/// `L`: ones per block.
const ONES_PER_BLOCK: u64 = 1 << 10;
/// `L2`: maximum bit span before a block's positions are stored explicitly.
const MAX_DISTANCE: u64 = 1 << 16;
/// `L3`: sub-block stride within non-explicit blocks.
const SUB_BLOCK_STRIDE: u64 = 32;

const BLOCKS_FILE: &str = "darray.blocks.bin";
const SUB_BLOCKS_FILE: &str = "darray.subblocks.bin";
const EXPLICIT_FILE: &str = "darray.explicit.bin";
const NUM_ONES_FILE: &str = "darray.num_ones.bin";

/// How the underlying words are read: identity for select-1, complement for
/// select-0.
pub trait WordTransform {
    fn apply(word: u64) -> u64;
}

pub struct Identity;

impl WordTransform for Identity {
    #[inline]
    fn apply(word: u64) -> u64 {
        word
    }
}

pub struct Complement;

impl WordTransform for Complement {
    #[inline]
    fn apply(word: u64) -> u64 {
        !word
    }
}

/// Select index over the (transformed) ones of a bit vector.
pub struct Darray<T: WordTransform> {
    bits: BitVectorFile,
    blocks: DiskVector<i64>,
    sub_blocks: DiskVector<u16>,
    explicit: DiskVector<u64>,
    num_ones: u64,
    _transform: PhantomData<T>,
}

/// Select-1 over the raw words.
pub type Darray1 = Darray<Identity>;
/// Select-0: same structure over the complemented words.
pub type Darray0 = Darray<Complement>;

/// Word `idx` of `view`, transformed, with any bits past the view's size
/// cleared so complemented tail padding never counts as ones.
#[inline]
fn masked_word<T: WordTransform>(view: &BitVectorView<'_>, idx: u64) -> u64 {
    let base = idx * 64;
    if base >= view.size() {
        return 0;
    }
    let mut word = T::apply(view.word(idx));
    if base + 64 > view.size() {
        word &= (1u64 << (view.size() - base)) - 1;
    }
    word
}

impl<T: WordTransform> Darray<T> {
    /// Open the darray stored in `dir`, building it from `bits` first if the
    /// files are not present.
    pub fn open(dir: impl AsRef<Path>, bits: BitVectorFile) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.join(BLOCKS_FILE).exists() {
            Self::build(dir, bits.view())?;
        }

        let num_ones_path = dir.join(NUM_ONES_FILE);
        let file = fs::File::open(&num_ones_path).map_err(|e| Error::io(&num_ones_path, e))?;
        let num_ones = packed::read_u64(&mut BufReader::new(file))
            .map_err(|e| Error::io(&num_ones_path, e))?;

        Ok(Self {
            bits,
            blocks: DiskVector::open(dir.join(BLOCKS_FILE))?,
            sub_blocks: DiskVector::open(dir.join(SUB_BLOCKS_FILE))?,
            explicit: DiskVector::open(dir.join(EXPLICIT_FILE))?,
            num_ones,
            _transform: PhantomData,
        })
    }

    /// Walk the bit vector once and write the block/sub-block/explicit files.
    pub fn build(dir: &Path, view: BitVectorView<'_>) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let mut blocks = DiskVectorWriter::<i64>::create(dir.join(BLOCKS_FILE))?;
        let mut sub_blocks = DiskVectorWriter::<u16>::create(dir.join(SUB_BLOCKS_FILE))?;
        let mut explicit = DiskVectorWriter::<u64>::create(dir.join(EXPLICIT_FILE))?;

        let mut num_ones = 0u64;
        let mut num_explicit = 0i64;
        let mut current_block = Vec::with_capacity(ONES_PER_BLOCK as usize);

        for word_idx in 0..view.num_words() {
            let mut word = masked_word::<T>(&view, word_idx);
            let base = word_idx * 64;
            while word != 0 {
                let pos = base + u64::from(word.trailing_zeros());
                current_block.push(pos);
                num_ones += 1;
                if current_block.len() == ONES_PER_BLOCK as usize {
                    flush_block(
                        &mut current_block,
                        &mut blocks,
                        &mut sub_blocks,
                        &mut explicit,
                        &mut num_explicit,
                    )?;
                }
                word &= word - 1;
            }
        }

        if !current_block.is_empty() {
            flush_block(
                &mut current_block,
                &mut blocks,
                &mut sub_blocks,
                &mut explicit,
                &mut num_explicit,
            )?;
        }

        blocks.finish()?;
        sub_blocks.finish()?;
        explicit.finish()?;

        let num_ones_path = dir.join(NUM_ONES_FILE);
        let mut out = BufWriter::new(
            fs::File::create(&num_ones_path).map_err(|e| Error::io(&num_ones_path, e))?,
        );
        packed::write_u64(&mut out, num_ones).map_err(|e| Error::io(&num_ones_path, e))?;
        out.flush().map_err(|e| Error::io(&num_ones_path, e))?;
        Ok(())
    }

    /// Number of indexed ones.
    pub fn num_positions(&self) -> u64 {
        self.num_ones
    }

    /// Position of the `k`-th (0-indexed) one.
    pub fn select(&self, k: u64) -> u64 {
        debug_assert!(k < self.num_ones, "select index out of range");

        let block_idx = (k / ONES_PER_BLOCK) as usize;
        let entry = self.blocks.get(block_idx);
        if entry < 0 {
            // explicitly stored block
            let start = (-entry - 1) as u64;
            return self.explicit.get((start + k % ONES_PER_BLOCK) as usize);
        }

        let sub_idx = (k / SUB_BLOCK_STRIDE) as usize;
        let mut one_count = k % SUB_BLOCK_STRIDE;
        let start_pos = entry as u64 + u64::from(self.sub_blocks.get(sub_idx));
        if one_count == 0 {
            return start_pos;
        }

        let view = self.bits.view();
        let mut word_idx = start_pos / 64;
        let mut word = masked_word::<T>(&view, word_idx) & (u64::MAX << (start_pos % 64));
        loop {
            let ones = u64::from(word.count_ones());
            if one_count < ones {
                break;
            }
            one_count -= ones;
            word_idx += 1;
            word = masked_word::<T>(&view, word_idx);
        }
        64 * word_idx + select_in_word(word, one_count)
    }
}

fn flush_block(
    block: &mut Vec<u64>,
    blocks: &mut DiskVectorWriter<i64>,
    sub_blocks: &mut DiskVectorWriter<u16>,
    explicit: &mut DiskVectorWriter<u64>,
    num_explicit: &mut i64,
) -> Result<()> {
    let first = block[0];
    let last = *block.last().unwrap();

    if last - first > MAX_DISTANCE {
        // span too wide for 16-bit offsets: store every position
        blocks.push(-*num_explicit - 1)?;
        *num_explicit += block.len() as i64;
        for &pos in block.iter() {
            explicit.push(pos)?;
        }
        // filler entries keep the global sub-block index aligned
        for _ in (0..block.len()).step_by(SUB_BLOCK_STRIDE as usize) {
            sub_blocks.push(u16::MAX)?;
        }
    } else {
        blocks.push(first as i64)?;
        for i in (0..block.len()).step_by(SUB_BLOCK_STRIDE as usize) {
            sub_blocks.push((block[i] - first) as u16)?;
        }
    }
    block.clear();
    Ok(())
}
