// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inverted index: two-pass external-sort build and the read-only handle.
//!
//! The build analyzes documents in parallel batches, interns terms to dense
//! ids, and spills sorted `(term, doc, count)` chunks whenever the RAM
//! budget fills. A k-way merge then writes every term's postings block
//! back-to-back and records its byte range and statistics in the offsets
//! table. Metadata and the vocabulary map land last, and the whole directory
//! is renamed into place only once every invariant has been checked — a
//! failed build removes its partial output before surfacing the error.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::IndexConfig;
use crate::corpus::{Analyzer, Document};
use crate::error::{Error, Result};
use crate::io::disk_vector::{DiskVector, DiskVectorWriter};
use crate::types::{DocId, TermId};

use super::chunk::{self, ChunkMerge};
use super::metadata::{DocumentMetadata, MetadataWriter};
use super::postings::{encode_block, PostingsOffset, PostingsStream};
use super::vocabulary::{Vocabulary, VocabularyBuilder};
use super::{forward, POSTINGS_FILE, POSTINGS_OFFSETS_FILE};

/// Bytes of buffer accounting per spilled triple.
const TRIPLE_BYTES: u64 = 24;

/// Shared between the analysis thread and background chunk writers.
#[derive(Default)]
struct ChunkState {
    paths: Vec<PathBuf>,
    in_flight: usize,
    error: Option<Error>,
}

pub struct InvertedIndex {
    dir: PathBuf,
    postings: Option<Mmap>,
    offsets: DiskVector<PostingsOffset>,
    vocab: Vocabulary,
    metadata: DocumentMetadata,
}

impl std::fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvertedIndex")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl InvertedIndex {
    // ========================================================================
    // BUILD
    // ========================================================================

    /// Build an index from `corpus` into `config.index_dir()`.
    ///
    /// The directory must not already exist. On failure or cancellation the
    /// partial output is removed before the error is returned.
    pub fn build<I>(
        config: &IndexConfig,
        corpus: I,
        analyzer: &dyn Analyzer,
        cancel: Option<&CancelToken>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        let final_dir = config.index_dir();
        if final_dir.exists() {
            return Err(Error::io(
                &final_dir,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "index directory already exists",
                ),
            ));
        }

        let mut partial = final_dir.clone().into_os_string();
        partial.push(".partial");
        let partial: PathBuf = partial.into();

        match Self::build_into(&partial, config, corpus, analyzer, cancel) {
            Ok(()) => {
                fs::rename(&partial, &final_dir).map_err(|e| Error::io(&final_dir, e))?;
                Self::open(&final_dir)
            }
            Err(err) => {
                // explicit unwind: a failed build leaves nothing behind
                let _ = fs::remove_dir_all(&partial);
                Err(err)
            }
        }
    }

    fn build_into<I>(
        dir: &Path,
        config: &IndexConfig,
        corpus: I,
        analyzer: &dyn Analyzer,
        cancel: Option<&CancelToken>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let mut metadata = MetadataWriter::create(dir)?;
        let mut vocab = VocabularyBuilder::new();
        let mut buffer: Vec<(u64, u64, u64)> = Vec::new();

        // chunk ids and directory entries are the only state shared with the
        // background writers; everything else stays on this thread
        let chunk_state = Mutex::new(ChunkState::default());
        let max_writers = config.indexer_max_writers.max(1);

        let progress = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template(" > analyzing: {pos} docs {spinner}")
                .expect("static template"),
        );

        let batch_size = max_writers * 64;
        let mut corpus = corpus.into_iter();
        rayon::in_place_scope(|scope| -> Result<()> {
            loop {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(Error::Cancelled {
                            context: "index build stopped at batch boundary".to_owned(),
                        });
                    }
                }

                let batch: Vec<Document> = corpus
                    .by_ref()
                    .take(batch_size)
                    .collect::<Result<Vec<_>>>()?;
                if batch.is_empty() {
                    return Ok(());
                }

                // analysis is the expensive part; feature maps come back in
                // document order so interning stays deterministic
                let analyzed: Vec<(Document, BTreeMap<String, u64>)> = batch
                    .into_par_iter()
                    .map(|doc| {
                        let features = analyzer.analyze(&doc.content);
                        (doc, features)
                    })
                    .collect();

                for (doc, features) in analyzed {
                    let length: u64 = features.values().sum();
                    let unique = features.len() as u64;
                    let doc_id = metadata.add(&doc.name, length, unique, doc.label.as_deref())?;

                    for (term, count) in features {
                        let term_id = vocab.intern(&term);
                        buffer.push((term_id.get(), doc_id.get(), count));
                    }
                    progress.inc(1);

                    if buffer.len() as u64 * TRIPLE_BYTES >= config.indexer_ram_budget {
                        let (path, spawn) = {
                            let mut state = chunk_state.lock();
                            if let Some(err) = state.error.take() {
                                return Err(err);
                            }
                            let path = dir.join(format!("chunk-{}", state.paths.len()));
                            state.paths.push(path.clone());
                            let spawn = state.in_flight < max_writers;
                            if spawn {
                                state.in_flight += 1;
                            }
                            (path, spawn)
                        };

                        let mut full = std::mem::take(&mut buffer);
                        if spawn {
                            let chunk_state = &chunk_state;
                            scope.spawn(move |_| {
                                let result = chunk::write_chunk(&path, &mut full);
                                let mut state = chunk_state.lock();
                                state.in_flight -= 1;
                                if let Err(err) = result {
                                    state.error.get_or_insert(err);
                                }
                            });
                        } else {
                            // writer limit reached: natural backpressure
                            chunk::write_chunk(&path, &mut full)?;
                        }
                    }
                }
            }
        })?;

        let mut state = chunk_state.into_inner();
        if let Some(err) = state.error.take() {
            return Err(err);
        }
        if !buffer.is_empty() {
            let path = dir.join(format!("chunk-{}", state.paths.len()));
            chunk::write_chunk(&path, &mut buffer)?;
            state.paths.push(path);
        }
        let chunks = state.paths;
        progress.finish_and_clear();
        info!(
            docs = metadata.num_docs(),
            vocabulary = vocab.len(),
            chunks = chunks.len(),
            "analysis complete"
        );

        let (sum_doc_freq, sum_corpus_count) = merge_postings(dir, &chunks, vocab.len())?;
        chunk::remove_chunks(&chunks)?;

        // the two aggregate invariants that catch most build bugs
        if sum_doc_freq != metadata.total_unique_terms() {
            return Err(Error::corruption(
                dir.join(POSTINGS_FILE),
                format!(
                    "sum of document frequencies {} != sum of unique-term counts {}",
                    sum_doc_freq,
                    metadata.total_unique_terms()
                ),
            ));
        }
        if sum_corpus_count != metadata.total_terms() {
            return Err(Error::corruption(
                dir.join(POSTINGS_FILE),
                format!(
                    "sum of corpus counts {} != sum of document lengths {}",
                    sum_corpus_count,
                    metadata.total_terms()
                ),
            ));
        }

        vocab.finalize(dir, config)?;
        metadata.finish(dir)?;

        if config.uninvert {
            forward::uninvert(dir, config, cancel)?;
        }
        Ok(())
    }

    // ========================================================================
    // OPEN
    // ========================================================================

    /// Open an index directory, validating the on-disk invariants.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let postings = crate::io::map_file(&dir.join(POSTINGS_FILE))?;
        let offsets: DiskVector<PostingsOffset> =
            DiskVector::open(dir.join(POSTINGS_OFFSETS_FILE))?;
        let vocab = Vocabulary::open(&dir)?;
        let metadata = DocumentMetadata::open(&dir)?;

        if vocab.len() != offsets.len() as u64 {
            return Err(Error::corruption(
                dir.join(POSTINGS_OFFSETS_FILE),
                format!(
                    "{} offset rows for a vocabulary of {} terms",
                    offsets.len(),
                    vocab.len()
                ),
            ));
        }

        let file_size = postings.as_ref().map_or(0, |m| m.len() as u64);
        let mut expected = 0u64;
        for (term, record) in offsets.iter().enumerate() {
            if record.offset != expected {
                return Err(Error::corruption(
                    dir.join(POSTINGS_OFFSETS_FILE),
                    format!(
                        "term {} starts at byte {} but the previous block ends at {}",
                        term, record.offset, expected
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
            vocab,
            metadata,
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn num_docs(&self) -> u64 {
        self.metadata.num_docs()
    }

    pub fn num_terms(&self) -> u64 {
        self.offsets.len() as u64
    }

    pub fn total_corpus_terms(&self) -> u64 {
        self.metadata.total_terms()
    }

    pub fn avg_doc_length(&self) -> f64 {
        self.metadata.avg_doc_length()
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.vocab.term_id(term)
    }

    pub fn term_string(&self, id: TermId) -> Result<Option<String>> {
        self.vocab.term_string(id)
    }

    pub fn doc_size(&self, doc: DocId) -> u64 {
        self.metadata.doc_size(doc)
    }

    pub fn unique_terms(&self, doc: DocId) -> u64 {
        self.metadata.unique_terms(doc)
    }

    pub fn doc_name(&self, doc: DocId) -> Result<Option<String>> {
        self.metadata.doc_name(doc)
    }

    pub fn doc_freq(&self, term: TermId) -> u64 {
        self.offsets.get(term.as_usize()).doc_freq
    }

    pub fn corpus_count(&self, term: TermId) -> u64 {
        self.offsets.get(term.as_usize()).corpus_count
    }

    /// Stream over a term's postings.
    pub fn stream_for(&self, term: TermId) -> Result<PostingsStream<'_>> {
        let record = self.offsets.get(term.as_usize());
        let bytes = self.postings.as_deref().unwrap_or(&[]);
        let start = record.offset as usize;
        let end = start + record.length as usize;
        let stream = PostingsStream::new(&bytes[start..end])
            .map_err(|e| Error::io(self.dir.join(POSTINGS_FILE), e))?;
        if stream.size() != record.doc_freq || stream.total_counts() != record.corpus_count {
            return Err(Error::corruption(
                self.dir.join(POSTINGS_FILE),
                format!(
                    "block header for term {} disagrees with the offsets table",
                    term.get()
                ),
            ));
        }
        Ok(stream)
    }
}

/// Merge the sorted chunks into the postings file, returning the summed
/// document frequencies and corpus counts.
fn merge_postings(dir: &Path, chunks: &[PathBuf], num_terms: u64) -> Result<(u64, u64)> {
    let postings_path = dir.join(POSTINGS_FILE);
    let mut out = BufWriter::new(
        File::create(&postings_path).map_err(|e| Error::io(&postings_path, e))?,
    );
    let mut offsets = DiskVectorWriter::<PostingsOffset>::create(dir.join(POSTINGS_OFFSETS_FILE))?;

    let mut merge = ChunkMerge::open(chunks)?;
    let mut current: Option<u64> = None;
    let mut postings: Vec<(u64, u64)> = Vec::new();
    let mut block = Vec::new();
    let mut byte_offset = 0u64;
    let mut sum_doc_freq = 0u64;
    let mut sum_corpus_count = 0u64;

    let mut flush = |term: u64,
                     postings: &mut Vec<(u64, u64)>,
                     offsets: &mut DiskVectorWriter<PostingsOffset>,
                     out: &mut BufWriter<File>|
     -> Result<()> {
        if term != offsets.len() as u64 {
            return Err(Error::VocabularyCorruption {
                context: format!(
                    "postings for term {} arrived when {} terms were written; \
                     term ids must be dense",
                    term,
                    offsets.len()
                ),
            });
        }
        block.clear();
        let (doc_freq, corpus_count) = encode_block(&mut block, postings);
        out.write_all(&block).map_err(|e| Error::io(&postings_path, e))?;
        offsets.push(PostingsOffset {
            offset: byte_offset,
            length: block.len() as u64,
            doc_freq,
            corpus_count,
        })?;
        byte_offset += block.len() as u64;
        sum_doc_freq += doc_freq;
        sum_corpus_count += corpus_count;
        postings.clear();
        Ok(())
    };

    while let Some((term, doc, count)) = merge.next_merged()? {
        if current != Some(term) {
            if let Some(done) = current {
                flush(done, &mut postings, &mut offsets, &mut out)?;
            }
            current = Some(term);
        }
        postings.push((doc, count));
    }
    if let Some(done) = current {
        flush(done, &mut postings, &mut offsets, &mut out)?;
    }
    drop(flush);

    if offsets.len() as u64 != num_terms {
        return Err(Error::VocabularyCorruption {
            context: format!(
                "{} interned terms but {} postings blocks were written",
                num_terms,
                offsets.len()
            ),
        });
    }

    out.flush().map_err(|e| Error::io(&postings_path, e))?;
    offsets.finish()?;
    Ok((sum_doc_freq, sum_corpus_count))
}
