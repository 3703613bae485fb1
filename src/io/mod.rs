// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Streaming and memory-mapped I/O primitives.
//!
//! Builders write through buffered streams; readers open the finished files
//! as shared read-only memory maps. Nothing in this module mutates a file
//! after it has been finalized.

pub mod disk_vector;
pub mod packed;
pub mod string_list;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, Result};

pub use disk_vector::{DiskVector, DiskVectorWriter, FixedWidth};
pub use string_list::{StringList, StringListWriter};

/// Map a file read-only. Zero-length files map to `None` since an empty
/// mapping is rejected on some platforms.
pub fn map_file(path: &Path) -> Result<Option<Mmap>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let len = file.metadata().map_err(|e| Error::io(path, e))?.len();
    if len == 0 {
        return Ok(None);
    }
    // SAFETY: the index contract is write-once/read-many; files are never
    // mutated after the builder finalizes them.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
    Ok(Some(mmap))
}
