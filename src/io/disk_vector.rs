// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! A typed, memory-mapped view over a file of fixed-size records.
//!
//! The file is nothing but `len` records of `T::WIDTH` bytes each, all
//! little-endian. Records decode on access via [`FixedWidth`] rather than by
//! transmuting the mapping, which keeps the layout reproducible across
//! platforms and the crate free of pointer casts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};

/// A record type with a fixed little-endian on-disk encoding.
pub trait FixedWidth: Copy {
    /// Encoded size in bytes.
    const WIDTH: usize;

    /// Decode from exactly `WIDTH` bytes.
    fn read_from(buf: &[u8]) -> Self;

    /// Encode into exactly `WIDTH` bytes.
    fn write_to(&self, buf: &mut [u8]);
}

macro_rules! fixed_width_int {
    ($($ty:ty),*) => {$(
        impl FixedWidth for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn read_from(buf: &[u8]) -> Self {
                <$ty>::from_le_bytes(buf[..Self::WIDTH].try_into().unwrap())
            }

            #[inline]
            fn write_to(&self, buf: &mut [u8]) {
                buf[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

fixed_width_int!(u16, u32, u64, i64);

impl FixedWidth for f32 {
    const WIDTH: usize = 4;

    #[inline]
    fn read_from(buf: &[u8]) -> Self {
        f32::from_le_bytes(buf[..4].try_into().unwrap())
    }

    #[inline]
    fn write_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_le_bytes());
    }
}

/// Read-only view over a file of `T` records.
pub struct DiskVector<T: FixedWidth> {
    mmap: Option<Mmap>,
    len: usize,
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: FixedWidth> std::fmt::Debug for DiskVector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskVector")
            .field("path", &self.path)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl<T: FixedWidth> DiskVector<T> {
    /// Open `path` as a vector of `T`. Fails with [`Error::BadFileSize`] if
    /// the file size is not a multiple of the record width.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mmap = super::map_file(&path)?;
        let size = mmap.as_ref().map_or(0, |m| m.len() as u64);
        if size % T::WIDTH as u64 != 0 {
            return Err(Error::BadFileSize {
                path,
                size,
                width: T::WIDTH,
            });
        }
        Ok(Self {
            mmap,
            len: (size / T::WIDTH as u64) as usize,
            path,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record at `index`. Panics if `index >= len()`; all internal callers
    /// bound their indices against `len()` first.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        assert!(index < self.len, "disk vector index {} out of bounds", index);
        let bytes = self.mmap.as_deref().unwrap();
        T::read_from(&bytes[index * T::WIDTH..])
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

/// Buffered writer producing a file readable by [`DiskVector`].
pub struct DiskVectorWriter<T: FixedWidth> {
    out: BufWriter<File>,
    path: PathBuf,
    scratch: Vec<u8>,
    written: usize,
    _marker: PhantomData<T>,
}

impl<T: FixedWidth> DiskVectorWriter<T> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
            scratch: vec![0u8; T::WIDTH],
            written: 0,
            _marker: PhantomData,
        })
    }

    pub fn push(&mut self, record: T) -> Result<()> {
        record.write_to(&mut self.scratch);
        self.write_scratch()
    }

    fn write_scratch(&mut self) -> Result<()> {
        self.out
            .write_all(&self.scratch)
            .map_err(|e| Error::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Flush and close the file.
    pub fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }
}

/// Convenience: write a whole iterator of records to `path`.
pub fn write_disk_vector<T, I>(path: impl AsRef<Path>, records: I) -> Result<()>
where
    T: FixedWidth,
    I: IntoIterator<Item = T>,
{
    let mut writer = DiskVectorWriter::create(path)?;
    for record in records {
        writer.push(record)?;
    }
    writer.finish()
}
