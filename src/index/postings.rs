// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Postings block codec and the streaming reader over it.
//!
//! Each term's block is a varint header (document frequency, corpus term
//! count) followed by gap-coded `(doc_id, count)` pairs: the first doc id is
//! stored raw, every later one as its positive delta. Doc ids cluster, so
//! the gaps stay small and the varints stay short.
//!
//! The stream decodes forward-only with O(1) work per step; a cursor can be
//! saved and restored in O(1), which is what lets the ranker hold one
//! position per query term.

use std::io;

use crate::error::{Error, Result};
use crate::io::disk_vector::FixedWidth;
use crate::io::packed;

/// Row of `postings.index_offsets`, indexed by term id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingsOffset {
    /// Byte offset of the term's block within the postings file.
    pub offset: u64,
    /// Block length in bytes.
    pub length: u64,
    /// Number of documents containing the term.
    pub doc_freq: u64,
    /// Total occurrences across the corpus.
    pub corpus_count: u64,
}

impl FixedWidth for PostingsOffset {
    const WIDTH: usize = 32;

    fn read_from(buf: &[u8]) -> Self {
        Self {
            offset: u64::read_from(buf),
            length: u64::read_from(&buf[8..]),
            doc_freq: u64::read_from(&buf[16..]),
            corpus_count: u64::read_from(&buf[24..]),
        }
    }

    fn write_to(&self, buf: &mut [u8]) {
        self.offset.write_to(buf);
        self.length.write_to(&mut buf[8..]);
        self.doc_freq.write_to(&mut buf[16..]);
        self.corpus_count.write_to(&mut buf[24..]);
    }
}

/// Encode one term's postings into `out`, returning `(doc_freq,
/// corpus_count)`. `postings` must be strictly increasing in doc id with
/// counts ≥ 1.
pub fn encode_block(out: &mut Vec<u8>, postings: &[(u64, u64)]) -> (u64, u64) {
    let doc_freq = postings.len() as u64;
    let corpus_count: u64 = postings.iter().map(|&(_, count)| count).sum();

    // Vec<u8> writes cannot fail
    packed::write_u64(out, doc_freq).unwrap();
    packed::write_u64(out, corpus_count).unwrap();

    let mut prev_doc = 0u64;
    for (i, &(doc, count)) in postings.iter().enumerate() {
        debug_assert!(count >= 1);
        debug_assert!(i == 0 || doc > prev_doc, "doc ids must strictly increase");
        let gap = if i == 0 { doc } else { doc - prev_doc };
        packed::write_u64(out, gap).unwrap();
        packed::write_u64(out, count).unwrap();
        prev_doc = doc;
    }
    (doc_freq, corpus_count)
}

/// Saved position of a [`PostingsStream`]; restore is O(1).
#[derive(Debug, Clone, Copy)]
pub struct PostingsCursor {
    pos: usize,
    prev_doc: u64,
    read: u64,
}

/// Forward-only iterator over one term's `(doc_id, count)` pairs.
pub struct PostingsStream<'a> {
    bytes: &'a [u8],
    doc_freq: u64,
    corpus_count: u64,
    pos: usize,
    prev_doc: u64,
    read: u64,
}

impl<'a> PostingsStream<'a> {
    /// Decode the block header and position the stream before the first
    /// posting.
    pub fn new(bytes: &'a [u8]) -> io::Result<Self> {
        let (doc_freq, mut pos) = packed::decode_u64(bytes)?;
        let (corpus_count, consumed) = packed::decode_u64(&bytes[pos..])?;
        pos += consumed;
        Ok(Self {
            bytes,
            doc_freq,
            corpus_count,
            pos,
            prev_doc: 0,
            read: 0,
        })
    }

    /// List length (document frequency).
    pub fn size(&self) -> u64 {
        self.doc_freq
    }

    /// Sum of all counts (corpus term count).
    pub fn total_counts(&self) -> u64 {
        self.corpus_count
    }

    /// Next `(doc_id, count)` pair, or `None` at end of list. Advancing past
    /// the end keeps returning `None`.
    pub fn advance(&mut self) -> Result<Option<(u64, u64)>> {
        if self.read == self.doc_freq {
            return Ok(None);
        }
        let (gap, consumed) = packed::decode_u64(&self.bytes[self.pos..])
            .map_err(|e| Error::out_of_range(format!("truncated postings block: {}", e)))?;
        self.pos += consumed;
        let (count, consumed) = packed::decode_u64(&self.bytes[self.pos..])
            .map_err(|e| Error::out_of_range(format!("truncated postings block: {}", e)))?;
        self.pos += consumed;

        let doc = if self.read == 0 { gap } else { self.prev_doc + gap };
        self.prev_doc = doc;
        self.read += 1;
        Ok(Some((doc, count)))
    }

    pub fn save(&self) -> PostingsCursor {
        PostingsCursor {
            pos: self.pos,
            prev_doc: self.prev_doc,
            read: self.read,
        }
    }

    pub fn restore(&mut self, cursor: PostingsCursor) {
        self.pos = cursor.pos;
        self.prev_doc = cursor.prev_doc;
        self.read = cursor.read;
    }

    /// Drain the remainder of the stream into a vector.
    pub fn collect_remaining(&mut self) -> Result<Vec<(u64, u64)>> {
        let mut out = Vec::with_capacity((self.doc_freq - self.read) as usize);
        while let Some(pair) = self.advance()? {
            out.push(pair);
        }
        Ok(out)
    }
}
