// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Compressed random-access integer sequences.
//!
//! Each value is stored in its minimal binary width (`msb(v) + 1` bits, one
//! bit for zero) inside a single bit stream. The cumulative bit offsets,
//! including the final total, form a strictly increasing sequence indexed by
//! an [`SarraySelect`]: `select(i)` is where value `i` starts and
//! `select(i+1) - select(i)` is its width. Lookups are two selects and one
//! extract.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::succinct::bit_vector::{write_bit_vector_file, BitVectorFile};
use crate::succinct::msb;
use crate::succinct::sarray::{SarrayBuilder, SarraySelect};

const PAYLOAD_FILE: &str = "compressed-vec.bin";
const OFFSETS_DIR: &str = "sarray";

/// Minimal binary width of `value`.
#[inline]
fn width_of(value: u64) -> u8 {
    if value == 0 {
        1
    } else {
        msb(value) as u8 + 1
    }
}

/// O(1) random-access sequence of unsigned integers with variable widths.
pub struct CompressedVector {
    payload: BitVectorFile,
    offsets: SarraySelect,
    len: u64,
}

impl CompressedVector {
    /// Write `values` into `dir` (payload bit stream + offsets sarray).
    pub fn build(dir: impl AsRef<Path>, values: &[u64]) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let total_bits: u64 = values.iter().map(|&v| u64::from(width_of(v))).sum();

        let mut offsets = SarrayBuilder::new(
            dir.join(OFFSETS_DIR),
            values.len() as u64 + 1,
            total_bits + 1,
        )?;

        let payload_path = dir.join(PAYLOAD_FILE);
        write_bit_vector_file(&payload_path, |builder| {
            offsets.push(0)?;
            for &value in values {
                builder
                    .write_bits(value, width_of(value))
                    .map_err(|e| Error::io(&payload_path, e))?;
                offsets.push(builder.total_bits())?;
            }
            Ok(())
        })?;
        offsets.finish()?;

        // materialize the select index so later opens are read-only
        SarraySelect::open(dir.join(OFFSETS_DIR))?;
        Ok(())
    }

    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let offsets = SarraySelect::open(dir.join(OFFSETS_DIR))?;
        let len = offsets.size().saturating_sub(1);
        Ok(Self {
            payload: BitVectorFile::open(dir.join(PAYLOAD_FILE))?,
            offsets,
            len,
        })
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value at `index`.
    pub fn get(&self, index: u64) -> u64 {
        debug_assert!(index < self.len, "compressed vector index out of range");
        let start = self.offsets.select(index);
        let end = self.offsets.select(index + 1);
        self.payload.view().extract(start, (end - start) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stores_mixed_widths() {
        let dir = tempfile::tempdir().unwrap();
        let values = [0u64, 1, 2, 255, 256, u64::MAX, 0, 42];
        CompressedVector::build(dir.path(), &values).unwrap();

        let vec = CompressedVector::open(dir.path()).unwrap();
        assert_eq!(vec.len(), values.len() as u64);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(vec.get(i as u64), v, "get({})", i);
        }
    }

    #[test]
    fn empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        CompressedVector::build(dir.path(), &[]).unwrap();
        let vec = CompressedVector::open(dir.path()).unwrap();
        assert!(vec.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn get_returns_original(values in prop::collection::vec(any::<u64>(), 1..400)) {
            let dir = tempfile::tempdir().unwrap();
            CompressedVector::build(dir.path(), &values).unwrap();
            let vec = CompressedVector::open(dir.path()).unwrap();
            prop_assert_eq!(vec.len(), values.len() as u64);
            for (i, &v) in values.iter().enumerate() {
                prop_assert_eq!(vec.get(i as u64), v);
            }
        }
    }
}
