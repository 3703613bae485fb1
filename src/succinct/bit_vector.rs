// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Word-packed bit vectors: streaming builder, on-disk file, zero-copy view.
//!
//! The builder packs arbitrary-length bit runs (up to 64 at a time) into
//! little-endian `u64` words and streams completed words to any `Write`
//! sink. The view reads bits straight out of the mapped word bytes; the
//! two-word splice in `extract` is the only interesting code here.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::io::packed;

/// Suffix of the sidecar file holding the bit count as a varint.
pub const NUM_BITS_SUFFIX: &str = ".num_bits";

#[inline]
fn low_mask(len: u8) -> u64 {
    if len == 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Append-only bit packer over a `Write` sink.
pub struct BitVectorBuilder<W: Write> {
    out: W,
    cur_word: u64,
    bit_in_word: u8,
    total_bits: u64,
}

impl<W: Write> BitVectorBuilder<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            cur_word: 0,
            bit_in_word: 0,
            total_bits: 0,
        }
    }

    /// Append the low `len` bits of `word` (LSB-first). `len` must be ≤ 64.
    pub fn write_bits(&mut self, word: u64, len: u8) -> io::Result<()> {
        assert!(len <= 64, "bit run longer than a word");
        if len == 0 {
            return Ok(());
        }
        let word = word & low_mask(len);

        if 64 - self.bit_in_word >= len {
            self.cur_word |= word << self.bit_in_word;
            self.bit_in_word += len;
            if self.bit_in_word == 64 {
                self.flush_word()?;
            }
        } else {
            // Not enough room: pack what fits, flush, and start the next
            // word with the remainder.
            let written = 64 - self.bit_in_word;
            self.cur_word |= word << self.bit_in_word;
            self.flush_word()?;
            self.cur_word = word >> written;
            self.bit_in_word = len - written;
        }
        self.total_bits += u64::from(len);
        Ok(())
    }

    pub fn total_bits(&self) -> u64 {
        self.total_bits
    }

    fn flush_word(&mut self) -> io::Result<()> {
        self.out.write_all(&self.cur_word.to_le_bytes())?;
        self.cur_word = 0;
        self.bit_in_word = 0;
        Ok(())
    }

    /// Flush any partial word and return the sink and the total bit count.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        if self.bit_in_word > 0 {
            self.flush_word()?;
        }
        self.out.flush()?;
        Ok((self.out, self.total_bits))
    }
}

/// Write a bit vector to `path` along with its `.num_bits` sidecar.
pub fn write_bit_vector_file<F>(path: &Path, fill: F) -> Result<u64>
where
    F: FnOnce(&mut BitVectorBuilder<BufWriter<File>>) -> Result<()>,
{
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut builder = BitVectorBuilder::new(BufWriter::new(file));
    fill(&mut builder)?;
    let (_, num_bits) = builder.finish().map_err(|e| Error::io(path, e))?;

    let sidecar = sidecar_path(path);
    let mut nb = BufWriter::new(File::create(&sidecar).map_err(|e| Error::io(&sidecar, e))?);
    packed::write_u64(&mut nb, num_bits).map_err(|e| Error::io(&sidecar, e))?;
    nb.flush().map_err(|e| Error::io(&sidecar, e))?;
    Ok(num_bits)
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(NUM_BITS_SUFFIX);
    path.with_file_name(name)
}

// ============================================================================
// FILE + VIEW
// ============================================================================

/// An owned, memory-mapped bit vector file.
pub struct BitVectorFile {
    mmap: Option<Mmap>,
    num_bits: u64,
}

impl BitVectorFile {
    /// Open `path`, reading the bit count from its `.num_bits` sidecar.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sidecar = sidecar_path(path);
        let file = File::open(&sidecar).map_err(|e| Error::io(&sidecar, e))?;
        let num_bits =
            packed::read_u64(&mut BufReader::new(file)).map_err(|e| Error::io(&sidecar, e))?;
        Self::with_bits(path, num_bits)
    }

    /// Open `path` with an externally known bit count.
    pub fn with_bits(path: impl AsRef<Path>, num_bits: u64) -> Result<Self> {
        let path = path.as_ref();
        let mmap = crate::io::map_file(path)?;
        let available = mmap.as_ref().map_or(0, |m| m.len() as u64) * 8;
        if num_bits > available {
            return Err(Error::corruption(
                path,
                format!("bit count {} exceeds {} stored bits", num_bits, available),
            ));
        }
        Ok(Self { mmap, num_bits })
    }

    pub fn view(&self) -> BitVectorView<'_> {
        BitVectorView::new(self.mmap.as_deref().unwrap_or(&[]), self.num_bits)
    }
}

/// Zero-copy view over little-endian `u64` word bytes with an explicit bit
/// count.
#[derive(Clone, Copy)]
pub struct BitVectorView<'a> {
    bytes: &'a [u8],
    num_bits: u64,
}

impl<'a> BitVectorView<'a> {
    /// `bytes` must hold whole little-endian words covering `num_bits`.
    pub fn new(bytes: &'a [u8], num_bits: u64) -> Self {
        debug_assert!(bytes.len() % 8 == 0);
        debug_assert!(num_bits <= bytes.len() as u64 * 8);
        Self { bytes, num_bits }
    }

    /// Number of addressable bits.
    #[inline]
    pub fn size(&self) -> u64 {
        self.num_bits
    }

    /// Number of backing words.
    #[inline]
    pub fn num_words(&self) -> u64 {
        self.bytes.len() as u64 / 8
    }

    #[inline]
    pub fn word(&self, idx: u64) -> u64 {
        let start = idx as usize * 8;
        u64::from_le_bytes(self.bytes[start..start + 8].try_into().unwrap())
    }

    #[inline]
    pub fn bit(&self, idx: u64) -> bool {
        debug_assert!(idx < self.num_bits);
        self.word(idx / 64) >> (idx % 64) & 1 == 1
    }

    /// The `len` bits starting at `idx`, LSB-first. Bounds are debug-checked;
    /// use [`try_extract`](Self::try_extract) for a checked variant.
    #[inline]
    pub fn extract(&self, idx: u64, len: u8) -> u64 {
        assert!(len <= 64, "extract of more than 64 bits");
        debug_assert!(idx + u64::from(len) <= self.num_bits, "extract past end");
        if len == 0 {
            return 0;
        }

        let block = idx / 64;
        let shift = idx % 64;
        if shift + u64::from(len) <= 64 {
            (self.word(block) >> shift) & low_mask(len)
        } else {
            // the run straddles two words
            let lo = self.word(block) >> shift;
            let hi = self.word(block + 1) << (64 - shift);
            (lo | hi) & low_mask(len)
        }
    }

    /// Checked [`extract`](Self::extract).
    pub fn try_extract(&self, idx: u64, len: u8) -> Result<u64> {
        if len > 64 {
            return Err(Error::out_of_range(format!(
                "extract of {} bits exceeds word width",
                len
            )));
        }
        if idx + u64::from(len) > self.num_bits {
            return Err(Error::out_of_range(format!(
                "extract of bits [{}, {}) from a vector of {} bits",
                idx,
                idx + u64::from(len),
                self.num_bits
            )));
        }
        Ok(self.extract(idx, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn build_in_memory(writes: &[(u64, u8)]) -> (Vec<u8>, u64) {
        let mut builder = BitVectorBuilder::new(Vec::new());
        for &(word, len) in writes {
            builder.write_bits(word, len).unwrap();
        }
        builder.finish().unwrap()
    }

    #[test]
    fn bits_concatenate_across_word_boundaries() {
        let (bytes, total) = build_in_memory(&[(u64::MAX, 40), (0, 40), (u64::MAX, 40)]);
        assert_eq!(total, 120);
        let view = BitVectorView::new(&bytes, total);
        assert_eq!(view.extract(0, 40), low_mask(40));
        assert_eq!(view.extract(40, 40), 0);
        assert_eq!(view.extract(80, 40), low_mask(40));
    }

    #[test]
    fn extract_at_exact_end_succeeds() {
        let (bytes, total) = build_in_memory(&[(0xDEAD_BEEF_CAFE_F00D, 64), (0x1234, 64)]);
        let view = BitVectorView::new(&bytes, total);
        assert_eq!(view.try_extract(64, 64).unwrap(), 0x1234);
        assert_eq!(view.try_extract(total - 64, 64).unwrap(), 0x1234);
        assert!(view.try_extract(total - 63, 64).is_err());
    }

    #[test]
    fn extract_rejects_oversized_len() {
        let (bytes, total) = build_in_memory(&[(1, 64), (1, 64)]);
        let view = BitVectorView::new(&bytes, total);
        assert!(view.try_extract(0, 65).is_err());
    }

    #[test]
    fn file_round_trip_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bits.bin");

        let num_bits = write_bit_vector_file(&path, |builder| {
            builder.write_bits(0b101, 3).map_err(|e| Error::io(&path, e))?;
            builder
                .write_bits(u64::MAX, 64)
                .map_err(|e| Error::io(&path, e))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(num_bits, 67);

        let file = BitVectorFile::open(&path).unwrap();
        let view = file.view();
        assert_eq!(view.size(), 67);
        assert_eq!(view.extract(0, 3), 0b101);
        assert_eq!(view.extract(3, 64), u64::MAX);
    }

    proptest! {
        #[test]
        fn write_extract_round_trip(
            writes in prop::collection::vec((any::<u64>(), 1u8..=64), 1..200)
        ) {
            let (bytes, total) = build_in_memory(&writes);
            let expected: u64 = writes.iter().map(|&(_, len)| u64::from(len)).sum();
            prop_assert_eq!(total, expected);

            let view = BitVectorView::new(&bytes, total);
            let mut offset = 0u64;
            for &(word, len) in &writes {
                prop_assert_eq!(view.extract(offset, len), word & low_mask(len));
                offset += u64::from(len);
            }
        }

        #[test]
        fn single_bits_match_extract(
            writes in prop::collection::vec((any::<u64>(), 1u8..=64), 1..50)
        ) {
            let (bytes, total) = build_in_memory(&writes);
            let view = BitVectorView::new(&bytes, total);
            for i in 0..total {
                prop_assert_eq!(u64::from(view.bit(i)), view.extract(i, 1));
            }
        }
    }
}
