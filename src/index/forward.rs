// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Forward index: per-document `(term, count)` runs, built by uninverting.
//!
//! Uninversion is the inverted build run backwards: stream every term's
//! postings, emit `(doc, term, count)` triples through the same spill/merge
//! machinery keyed by doc id, and write one block per document under the
//! `fwd/` subdirectory. Documents whose analyzer produced no features get an
//! empty block so the offsets table stays dense in doc id.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::io::disk_vector::{DiskVector, DiskVectorWriter};
use crate::types::{DocId, TermId};

use super::chunk::{self, ChunkMerge};
use super::inverted::InvertedIndex;
use super::postings::{encode_block, PostingsOffset, PostingsStream};
use super::{FORWARD_SUBDIR, POSTINGS_FILE, POSTINGS_OFFSETS_FILE};

const TRIPLE_BYTES: u64 = 24;

/// Build the forward index inside `dir/fwd` from the inverted files already
/// present in `dir`.
pub fn uninvert(dir: &Path, config: &IndexConfig, cancel: Option<&CancelToken>) -> Result<()> {
    let inverted = InvertedIndex::open(dir)?;
    let fwd_dir = dir.join(FORWARD_SUBDIR);
    fs::create_dir_all(&fwd_dir).map_err(|e| Error::io(&fwd_dir, e))?;

    let mut buffer: Vec<(u64, u64, u64)> = Vec::new();
    let mut chunks: Vec<PathBuf> = Vec::new();

    for term in 0..inverted.num_terms() {
        let mut stream = inverted.stream_for(TermId(term))?;
        while let Some((doc, count)) = stream.advance()? {
            buffer.push((doc, term, count));
            if buffer.len() as u64 * TRIPLE_BYTES >= config.indexer_ram_budget {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(Error::Cancelled {
                            context: "uninvert stopped at chunk boundary".to_owned(),
                        });
                    }
                }
                let path = fwd_dir.join(format!("chunk-{}", chunks.len()));
                chunk::write_chunk(&path, &mut buffer)?;
                chunks.push(path);
            }
        }
    }
    if !buffer.is_empty() {
        let path = fwd_dir.join(format!("chunk-{}", chunks.len()));
        chunk::write_chunk(&path, &mut buffer)?;
        chunks.push(path);
    }

    merge_documents(&fwd_dir, &chunks, inverted.num_docs())?;
    chunk::remove_chunks(&chunks)?;
    info!(docs = inverted.num_docs(), "forward index written");
    Ok(())
}

/// Merge `(doc, term, count)` chunks into one postings block per document.
fn merge_documents(fwd_dir: &Path, chunks: &[PathBuf], num_docs: u64) -> Result<()> {
    let postings_path = fwd_dir.join(POSTINGS_FILE);
    let mut out = BufWriter::new(
        File::create(&postings_path).map_err(|e| Error::io(&postings_path, e))?,
    );
    let mut offsets =
        DiskVectorWriter::<PostingsOffset>::create(fwd_dir.join(POSTINGS_OFFSETS_FILE))?;

    let mut merge = ChunkMerge::open(chunks)?;
    let mut pending: Option<(u64, Vec<(u64, u64)>)> = None;
    let mut block = Vec::new();
    let mut byte_offset = 0u64;

    let mut write_row = |terms: &[(u64, u64)],
                         offsets: &mut DiskVectorWriter<PostingsOffset>,
                         out: &mut BufWriter<File>|
     -> Result<()> {
        block.clear();
        let (unique_terms, length) = encode_block(&mut block, terms);
        out.write_all(&block).map_err(|e| Error::io(&postings_path, e))?;
        offsets.push(PostingsOffset {
            offset: byte_offset,
            length: block.len() as u64,
            doc_freq: unique_terms,
            corpus_count: length,
        })?;
        byte_offset += block.len() as u64;
        Ok(())
    };

    while let Some((doc, term, count)) = merge.next_merged()? {
        match &mut pending {
            Some((current, terms)) if *current == doc => terms.push((term, count)),
            _ => {
                if let Some((done, terms)) = pending.take() {
                    // empty rows for documents between the last flushed doc
                    // and this one
                    for _ in offsets.len() as u64..done {
                        write_row(&[], &mut offsets, &mut out)?;
                    }
                    write_row(&terms, &mut offsets, &mut out)?;
                }
                pending = Some((doc, vec![(term, count)]));
            }
        }
    }
    if let Some((done, terms)) = pending.take() {
        for _ in offsets.len() as u64..done {
            write_row(&[], &mut offsets, &mut out)?;
        }
        write_row(&terms, &mut offsets, &mut out)?;
    }
    // trailing featureless documents
    for _ in offsets.len() as u64..num_docs {
        write_row(&[], &mut offsets, &mut out)?;
    }
    drop(write_row);

    out.flush().map_err(|e| Error::io(&postings_path, e))?;
    offsets.finish()
}

/// Read-only handle over `index/fwd`.
pub struct ForwardIndex {
    dir: PathBuf,
    postings: Option<Mmap>,
    offsets: DiskVector<PostingsOffset>,
}

impl ForwardIndex {
    /// `dir` is the index root; the forward files live in its `fwd/`
    /// subdirectory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().join(FORWARD_SUBDIR);
        let postings = crate::io::map_file(&dir.join(POSTINGS_FILE))?;
        let offsets: DiskVector<PostingsOffset> =
            DiskVector::open(dir.join(POSTINGS_OFFSETS_FILE))?;

        let file_size = postings.as_ref().map_or(0, |m| m.len() as u64);
        let mut expected = 0u64;
        for (doc, record) in offsets.iter().enumerate() {
            if record.offset != expected {
                return Err(Error::corruption(
                    dir.join(POSTINGS_OFFSETS_FILE),
                    format!(
                        "document {} starts at byte {} but the previous block ends at {}",
                        doc, record.offset, expected
                    ),
                ));
            }
            expected += record.length;
        }
        if expected != file_size {
            return Err(Error::corruption(
                dir.join(POSTINGS_FILE),
                format!("blocks cover {} bytes of a {}-byte file", expected, file_size),
            ));
        }

        Ok(Self {
            dir,
            postings,
            offsets,
        })
    }

    pub fn num_docs(&self) -> u64 {
        self.offsets.len() as u64
    }

    /// Distinct terms in a document.
    pub fn unique_terms(&self, doc: DocId) -> u64 {
        self.offsets.get(doc.as_usize()).doc_freq
    }

    /// Length of a document in tokens.
    pub fn doc_length(&self, doc: DocId) -> u64 {
        self.offsets.get(doc.as_usize()).corpus_count
    }

    /// Stream of `(term_id, count)` pairs for one document.
    pub fn stream_for(&self, doc: DocId) -> Result<PostingsStream<'_>> {
        let record = self.offsets.get(doc.as_usize());
        let bytes = self.postings.as_deref().unwrap_or(&[]);
        let start = record.offset as usize;
        let end = start + record.length as usize;
        PostingsStream::new(&bytes[start..end])
            .map_err(|e| Error::io(self.dir.join(POSTINGS_FILE), e))
    }
}
