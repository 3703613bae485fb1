// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sorted spill chunks and the k-way merge over them.
//!
//! During a build, `(key, sub_key, count)` triples accumulate in memory
//! until the RAM budget is hit, then sort and spill to a chunk file. After
//! analysis, a heap-based merge replays every chunk in global `(key,
//! sub_key)` order, summing the counts of identical pairs. The inverted
//! build keys by `(term, doc)`; uninversion reuses the exact machinery
//! keyed by `(doc, term)`.

use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io::packed;

/// Sort `records` by `(key, sub_key)` and write them to `path` as varint
/// triples. The buffer is cleared.
pub fn write_chunk(path: &Path, records: &mut Vec<(u64, u64, u64)>) -> Result<()> {
    records.sort_unstable();
    let mut out = BufWriter::new(File::create(path).map_err(|e| Error::io(path, e))?);
    for &(key, sub_key, count) in records.iter() {
        packed::write_u64(&mut out, key).map_err(|e| Error::io(path, e))?;
        packed::write_u64(&mut out, sub_key).map_err(|e| Error::io(path, e))?;
        packed::write_u64(&mut out, count).map_err(|e| Error::io(path, e))?;
    }
    out.flush().map_err(|e| Error::io(path, e))?;
    records.clear();
    Ok(())
}

struct ChunkCursor {
    reader: BufReader<File>,
    path: PathBuf,
    head: (u64, u64, u64),
}

impl ChunkCursor {
    fn open(path: PathBuf) -> Result<Option<Self>> {
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let mut cursor = Self {
            reader: BufReader::new(file),
            path,
            head: (0, 0, 0),
        };
        Ok(if cursor.advance()? { Some(cursor) } else { None })
    }

    fn advance(&mut self) -> Result<bool> {
        let key = match packed::try_read_u64(&mut self.reader) {
            Ok(Some(key)) => key,
            Ok(None) => return Ok(false),
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        let sub_key = packed::read_u64(&mut self.reader).map_err(|e| Error::io(&self.path, e))?;
        let count = packed::read_u64(&mut self.reader).map_err(|e| Error::io(&self.path, e))?;
        self.head = (key, sub_key, count);
        Ok(true)
    }
}

impl PartialEq for ChunkCursor {
    fn eq(&self, other: &Self) -> bool {
        (self.head.0, self.head.1) == (other.head.0, other.head.1)
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
        (self.head.0, self.head.1).cmp(&(other.head.0, other.head.1))
    }
}

/// Merging reader over a set of chunk files.
pub struct ChunkMerge {
    heap: BinaryHeap<std::cmp::Reverse<ChunkCursor>>,
}

impl ChunkMerge {
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(paths.len());
        for path in paths {
            if let Some(cursor) = ChunkCursor::open(path.clone())? {
                heap.push(std::cmp::Reverse(cursor));
            }
        }
        Ok(Self { heap })
    }

    /// Next `(key, sub_key, total_count)` in global order, with identical
    /// `(key, sub_key)` pairs from different chunks merged by summing.
    pub fn next_merged(&mut self) -> Result<Option<(u64, u64, u64)>> {
        let std::cmp::Reverse(mut cursor) = match self.heap.pop() {
            Some(cursor) => cursor,
            None => return Ok(None),
        };
        let (key, sub_key, mut count) = cursor.head;
        if cursor.advance()? {
            self.heap.push(std::cmp::Reverse(cursor));
        }

        while let Some(std::cmp::Reverse(top)) = self.heap.peek() {
            if (top.head.0, top.head.1) != (key, sub_key) {
                break;
            }
            let std::cmp::Reverse(mut dup) = self.heap.pop().unwrap();
            count += dup.head.2;
            if dup.advance()? {
                self.heap.push(std::cmp::Reverse(dup));
            }
        }
        Ok(Some((key, sub_key, count)))
    }
}

/// Remove a build's chunk files.
pub fn remove_chunks(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_duplicate_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("chunk-0");
        let b = dir.path().join("chunk-1");

        write_chunk(&a, &mut vec![(1, 10, 2), (1, 11, 1), (3, 5, 4)]).unwrap();
        write_chunk(&b, &mut vec![(1, 10, 3), (2, 0, 1), (3, 5, 1)]).unwrap();

        let mut merge = ChunkMerge::open(&[a, b]).unwrap();
        let mut out = Vec::new();
        while let Some(triple) = merge.next_merged().unwrap() {
            out.push(triple);
        }
        assert_eq!(
            out,
            vec![(1, 10, 5), (1, 11, 1), (2, 0, 1), (3, 5, 5)]
        );
    }

    #[test]
    fn empty_chunk_set_is_empty() {
        let mut merge = ChunkMerge::open(&[]).unwrap();
        assert_eq!(merge.next_merged().unwrap(), None);
    }
}
