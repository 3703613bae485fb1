// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Identifier newtypes shared across the index, ranker, and language model.
//!
//! Document, term, and label ids are distinct types on purpose: an index
//! mixes all three in tight loops and an accidental swap would be silent
//! with bare integers.

use serde::{Deserialize, Serialize};

/// Position of a document within the index, assigned densely at build time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
pub struct DocId(pub u64);

impl DocId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id)
    }
}

/// Position of a term in the vocabulary, dense in `[0, V)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
pub struct TermId(pub u64);

impl TermId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u64> for TermId {
    fn from(id: u64) -> Self {
        TermId(id)
    }
}

/// Interned class label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
pub struct LabelId(pub u32);

impl LabelId {
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for LabelId {
    fn from(id: u32) -> Self {
        LabelId(id)
    }
}
