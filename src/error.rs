// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for index construction and query evaluation.
//!
//! Everything fallible in this crate funnels into [`Error`]. The variants map
//! one-to-one onto the failure classes a caller can meaningfully react to:
//! retry with a different seed (`MphBuildFailure`), rebuild the index
//! (`Corruption`, `VocabularyCorruption`), fix the file (`BadFileSize`), or
//! give up (`Io`). `NotFound` is deliberately *not* here: map misses are
//! returned as `Option`, never as errors.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user input: a malformed configuration file, an unknown
    /// ranker method, a bad parameter. Distinct from [`Error::Io`] so CLI
    /// front-ends can report misuse separately from real I/O failures.
    #[error("invalid usage: {context}")]
    Misuse { context: String },

    /// An underlying read/write/open failure, with the file it happened on.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A disk-vector file whose size is not a multiple of its record width.
    #[error("bad file size for {path}: {size} bytes is not a multiple of {width}-byte records")]
    BadFileSize {
        path: PathBuf,
        size: u64,
        width: usize,
    },

    /// Bit-vector extract or succinct select beyond the end of the structure.
    #[error("out of range: {context}")]
    OutOfRange { context: String },

    /// An on-disk invariant does not hold.
    #[error("corruption in {path}: {context}")]
    Corruption { path: PathBuf, context: String },

    /// Seed search exhausted while constructing a minimal perfect hash.
    /// Retrying with a different base seed may succeed.
    #[error("perfect hash construction failed: {context}")]
    MphBuildFailure { context: String },

    /// Duplicate term id or missing inverse entry in the vocabulary.
    #[error("vocabulary corruption: {context}")]
    VocabularyCorruption { context: String },

    /// Caller-requested abort observed at a cooperative checkpoint.
    #[error("operation cancelled: {context}")]
    Cancelled { context: String },
}

impl Error {
    /// Wrap an `io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn misuse(context: impl Into<String>) -> Self {
        Error::Misuse {
            context: context.into(),
        }
    }

    pub fn corruption(path: impl Into<PathBuf>, context: impl Into<String>) -> Self {
        Error::Corruption {
            path: path.into(),
            context: context.into(),
        }
    }

    pub fn out_of_range(context: impl Into<String>) -> Self {
        Error::OutOfRange {
            context: context.into(),
        }
    }
}
