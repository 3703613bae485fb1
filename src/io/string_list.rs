// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Id-to-string payload storage.
//!
//! Two files: an offsets disk-vector (`u64` per id, the "string id" is a byte
//! offset) and a blob of length-prefixed UTF-8 strings. Used for the
//! vocabulary inverse (`term_id -> surface`), document names, and the label
//! intern table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::io::disk_vector::{DiskVector, DiskVectorWriter};
use crate::io::packed;

/// Writer for a [`StringList`]. Strings are appended in id order.
pub struct StringListWriter {
    offsets: DiskVectorWriter<u64>,
    blob: BufWriter<File>,
    blob_path: PathBuf,
    cursor: u64,
}

impl StringListWriter {
    /// `offsets_path` holds the id-indexed offsets, `blob_path` the string
    /// payload.
    pub fn create(offsets_path: impl AsRef<Path>, blob_path: impl AsRef<Path>) -> Result<Self> {
        let blob_path = blob_path.as_ref().to_path_buf();
        let blob_file = File::create(&blob_path).map_err(|e| Error::io(&blob_path, e))?;
        Ok(Self {
            offsets: DiskVectorWriter::create(offsets_path)?,
            blob: BufWriter::new(blob_file),
            blob_path,
            cursor: 0,
        })
    }

    /// Append a string, returning its id (dense, in insertion order).
    pub fn push(&mut self, s: &str) -> Result<u64> {
        let id = self.offsets.len() as u64;
        self.offsets.push(self.cursor)?;
        let written =
            packed::write_string(&mut self.blob, s).map_err(|e| Error::io(&self.blob_path, e))?;
        self.cursor += written as u64;
        Ok(id)
    }

    pub fn finish(mut self) -> Result<()> {
        self.blob.flush().map_err(|e| Error::io(&self.blob_path, e))?;
        self.offsets.finish()
    }
}

/// Read-only id → string lookup over the two memory-mapped files.
pub struct StringList {
    offsets: DiskVector<u64>,
    blob: Option<Mmap>,
    blob_path: PathBuf,
}

impl StringList {
    pub fn open(offsets_path: impl AsRef<Path>, blob_path: impl AsRef<Path>) -> Result<Self> {
        let blob_path = blob_path.as_ref().to_path_buf();
        Ok(Self {
            offsets: DiskVector::open(offsets_path)?,
            blob: super::map_file(&blob_path)?,
            blob_path,
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The string stored for `id`, or `None` when `id` is out of range.
    pub fn get(&self, id: u64) -> Result<Option<String>> {
        if id as usize >= self.offsets.len() {
            return Ok(None);
        }
        let offset = self.offsets.get(id as usize) as usize;
        let bytes = self.blob.as_deref().unwrap_or(&[]);
        if offset > bytes.len() {
            return Err(Error::corruption(
                &self.blob_path,
                format!("string offset {} beyond blob of {} bytes", offset, bytes.len()),
            ));
        }
        let (s, _) = packed::decode_string(&bytes[offset..])
            .map_err(|e| Error::io(&self.blob_path, e))?;
        Ok(Some(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let offsets = dir.path().join("ids.bin");
        let blob = dir.path().join("ids.blob");

        let mut writer = StringListWriter::create(&offsets, &blob).unwrap();
        assert_eq!(writer.push("alpha").unwrap(), 0);
        assert_eq!(writer.push("").unwrap(), 1);
        assert_eq!(writer.push("señal").unwrap(), 2);
        writer.finish().unwrap();

        let list = StringList::open(&offsets, &blob).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0).unwrap().as_deref(), Some("alpha"));
        assert_eq!(list.get(1).unwrap().as_deref(), Some(""));
        assert_eq!(list.get(2).unwrap().as_deref(), Some("señal"));
        assert_eq!(list.get(3).unwrap(), None);
    }
}
