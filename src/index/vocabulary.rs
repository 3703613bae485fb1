// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! The vocabulary: a bijection between term surfaces and dense term ids.
//!
//! Build side interns surfaces in first-observation order, which keeps term
//! ids dense in `[0, V)` and lets `postings.index_offsets` be a plain
//! disk-vector. Finalization persists two structures: a hashed map from
//! surface to id (fingerprint-checked, so out-of-vocabulary lookups answer
//! `None`) and a string-list payload for the reverse direction.

use std::collections::HashMap;
use std::path::Path;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::hashing::{PerfectHashMap, PerfectHashMapBuilder};
use crate::io::string_list::{StringList, StringListWriter};
use crate::types::TermId;

use super::{TERMIDS_INVERSE_FILE, TERMIDS_INVERSE_INDEX_FILE, TERMIDS_MAP_DIR};

// ============================================================================
// BUILD SIDE
// ============================================================================

/// In-memory interner used while documents are analyzed.
#[derive(Default)]
pub struct VocabularyBuilder {
    ids: HashMap<String, u64>,
    terms: Vec<String>,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `term`, assigning the next dense id on first sight.
    pub fn intern(&mut self, term: &str) -> TermId {
        if let Some(&id) = self.ids.get(term) {
            return TermId(id);
        }
        let id = self.terms.len() as u64;
        self.ids.insert(term.to_owned(), id);
        self.terms.push(term.to_owned());
        TermId(id)
    }

    pub fn len(&self) -> u64 {
        self.terms.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Persist the surface → id map and the reverse payload into `dir`.
    pub fn finalize(self, dir: &Path, config: &IndexConfig) -> Result<()> {
        if self.ids.len() != self.terms.len() {
            return Err(Error::VocabularyCorruption {
                context: format!(
                    "{} interned ids for {} surfaces",
                    self.ids.len(),
                    self.terms.len()
                ),
            });
        }

        let mut inverse = StringListWriter::create(
            dir.join(TERMIDS_INVERSE_INDEX_FILE),
            dir.join(TERMIDS_INVERSE_FILE),
        )?;
        for term in &self.terms {
            inverse.push(term)?;
        }
        inverse.finish()?;

        let mut map = PerfectHashMapBuilder::<u64>::new(
            config.map_options(dir.join(TERMIDS_MAP_DIR), self.terms.len() as u64),
        )?;
        for (id, term) in self.terms.iter().enumerate() {
            map.insert(term.as_str(), id as u64)?;
        }
        map.write()
    }
}

// ============================================================================
// READ SIDE
// ============================================================================

pub struct Vocabulary {
    map: PerfectHashMap<u64>,
    inverse: StringList,
}

impl Vocabulary {
    pub fn open(dir: &Path) -> Result<Self> {
        let map = PerfectHashMap::open(dir.join(TERMIDS_MAP_DIR))?;
        let inverse = StringList::open(
            dir.join(TERMIDS_INVERSE_INDEX_FILE),
            dir.join(TERMIDS_INVERSE_FILE),
        )?;
        if map.len() != inverse.len() as u64 {
            return Err(Error::VocabularyCorruption {
                context: format!(
                    "hashed map covers {} terms but the inverse payload has {}",
                    map.len(),
                    inverse.len()
                ),
            });
        }
        Ok(Self { map, inverse })
    }

    pub fn len(&self) -> u64 {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Id of a surface string; `None` for out-of-vocabulary terms.
    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.map.get(term).map(TermId)
    }

    /// Surface string of a term id.
    pub fn term_string(&self, id: TermId) -> Result<Option<String>> {
        self.inverse.get(id.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_first_seen_dense() {
        let mut builder = VocabularyBuilder::new();
        assert_eq!(builder.intern("a"), TermId(0));
        assert_eq!(builder.intern("b"), TermId(1));
        assert_eq!(builder.intern("a"), TermId(0));
        assert_eq!(builder.intern("c"), TermId(2));
        assert_eq!(builder.len(), 3);
    }

    #[test]
    fn finalize_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig::default();

        let mut builder = VocabularyBuilder::new();
        for term in ["alpha", "beta", "gamma"] {
            builder.intern(term);
        }
        builder.finalize(dir.path(), &config).unwrap();

        let vocab = Vocabulary::open(dir.path()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.term_id("beta"), Some(TermId(1)));
        assert_eq!(vocab.term_string(TermId(2)).unwrap().as_deref(), Some("gamma"));
        assert_eq!(vocab.term_id("delta"), None);
    }
}
