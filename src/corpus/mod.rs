// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! The corpus boundary: documents and the analyzer interface.
//!
//! Real token pipelines (filter chains, stemmers, stop lists) live outside
//! this crate; the index only needs a bag of term counts per document. The
//! whitespace analyzer here is the narrow reference implementation used by
//! the CLI and the test suite.

pub mod analyzer;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub use analyzer::{Analyzer, WhitespaceAnalyzer};

/// A raw input document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Name or path, surfaced in search results.
    pub name: String,
    /// Full text handed to the analyzer.
    pub content: String,
    /// Optional class label.
    pub label: Option<String>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One document per line. Names are `<dataset>-<line number>`.
pub struct LineCorpus {
    reader: BufReader<File>,
    path: PathBuf,
    dataset: String,
    line: u64,
}

impl LineCorpus {
    pub fn open(path: impl AsRef<Path>, dataset: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        Ok(Self {
            reader: BufReader::new(file),
            path,
            dataset: dataset.into(),
            line: 0,
        })
    }
}

impl Iterator for LineCorpus {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => {
                let name = format!("{}-{}", self.dataset, self.line);
                self.line += 1;
                Some(Ok(Document::new(name, buf.trim_end_matches(['\n', '\r']))))
            }
            Err(e) => Some(Err(Error::io(&self.path, e))),
        }
    }
}
