// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Write-once text indexing and retrieval.
//!
//! `stele` builds inverted (and optionally forward) indexes over a corpus
//! and evaluates ranked queries against them. Everything on disk is built
//! once by a dedicated builder and then memory-mapped read-only; the heavy
//! lifting sits in a small family of succinct structures shared by every
//! subsystem.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐    ┌────────────┐    ┌─────────────┐
//! │  corpus   │───▶│   index    │───▶│   ranking   │
//! │ (analyzer │    │ (external  │    │ (doc-at-a-  │
//! │ boundary) │    │ sort build)│    │ time top-K) │
//! └───────────┘    └────────────┘    └─────────────┘
//!                        │
//!        ┌───────────────┼────────────────┐
//!        ▼               ▼                ▼
//! ┌────────────┐  ┌────────────┐  ┌─────────────┐
//! │  hashing   │  │  succinct  │  │     io      │
//! │ (MPH, maps)│  │ (sarray,   │  │ (varint,    │
//! │            │  │  darray)   │  │  mmap views)│
//! └────────────┘  └────────────┘  └─────────────┘
//! ```
//!
//! The language model (`lm`) reuses the hashed maps for per-order n-gram
//! tables and adds stateful back-off scoring.
//!
//! # Usage
//!
//! ```no_run
//! use stele::config::IndexConfig;
//! use stele::corpus::{LineCorpus, WhitespaceAnalyzer};
//! use stele::index::InvertedIndex;
//! use stele::ranking::{score_query, OkapiBm25, QueryOptions};
//!
//! # fn main() -> stele::Result<()> {
//! let config = IndexConfig::from_file("config.toml")?;
//! let corpus = LineCorpus::open(config.corpus_file(), &config.dataset)?;
//! let index = InvertedIndex::build(&config, corpus, &WhitespaceAnalyzer, None)?;
//!
//! let query = vec![("search".to_owned(), 1.0), ("engine".to_owned(), 1.0)];
//! let results = score_query(
//!     &index,
//!     &OkapiBm25::default(),
//!     &query,
//!     10,
//!     QueryOptions::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod corpus;
pub mod error;
pub mod hashing;
pub mod index;
pub mod io;
pub mod lm;
pub mod ranking;
pub mod succinct;
pub mod types;

pub use cancel::CancelToken;
pub use config::IndexConfig;
pub use error::{Error, Result};
pub use index::{ForwardIndex, InvertedIndex};
pub use lm::{LanguageModel, LmState};
pub use ranking::{score_query, QueryOptions, RankerRegistry, SearchResult};
pub use types::{DocId, LabelId, TermId};
