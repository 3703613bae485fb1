// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! The inverted and forward index: on-disk layout, builder, and handles.
//!
//! An index is a directory of write-once files:
//!
//! ```text
//! <index>/
//!   postings.index                 concatenated varint postings blocks
//!   postings.index_offsets         (offset, length, doc_freq, corpus_count) per term
//!   termids.mapping/               hashed map: term string -> term id
//!   termids.mapping.inverse        blob of term surfaces (the reverse payload)
//!   termids.mapping.inverse_index  term id -> blob offset
//!   docids.mapping                 doc id -> name blob offset
//!   docids.mapping.inverse         blob of document names
//!   docsizes.counts                doc id -> length in tokens
//!   docs.uniqueterms               doc id -> distinct term count
//!   docs.labels                    doc id -> label id + 1 (0 = unlabeled)
//!   label.ids / label.ids.inverse  label intern table
//!   fwd/                           optional forward index, same layout
//! ```

pub mod chunk;
pub mod forward;
pub mod inverted;
pub mod metadata;
pub mod postings;
pub mod vocabulary;

pub use forward::ForwardIndex;
pub use inverted::InvertedIndex;
pub use postings::{PostingsCursor, PostingsOffset, PostingsStream};

pub const POSTINGS_FILE: &str = "postings.index";
pub const POSTINGS_OFFSETS_FILE: &str = "postings.index_offsets";
pub const TERMIDS_MAP_DIR: &str = "termids.mapping";
pub const TERMIDS_INVERSE_FILE: &str = "termids.mapping.inverse";
pub const TERMIDS_INVERSE_INDEX_FILE: &str = "termids.mapping.inverse_index";
pub const DOCIDS_FILE: &str = "docids.mapping";
pub const DOCIDS_INVERSE_FILE: &str = "docids.mapping.inverse";
pub const DOC_SIZES_FILE: &str = "docsizes.counts";
pub const DOC_UNIQUE_TERMS_FILE: &str = "docs.uniqueterms";
pub const DOC_LABELS_FILE: &str = "docs.labels";
pub const LABEL_IDS_FILE: &str = "label.ids";
pub const LABEL_IDS_INVERSE_FILE: &str = "label.ids.inverse";
pub const FORWARD_SUBDIR: &str = "fwd";
