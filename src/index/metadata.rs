// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-document metadata: sizes, unique-term counts, labels, and names.
//!
//! Four parallel structures indexed by doc id, plus a small intern table for
//! class labels. The row counts must agree with each other and with the
//! document count recorded by the postings build; [`DocumentMetadata::open`]
//! refuses an index where they do not.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::disk_vector::{DiskVector, DiskVectorWriter};
use crate::io::string_list::{StringList, StringListWriter};
use crate::types::{DocId, LabelId};

use super::{
    DOCIDS_FILE, DOCIDS_INVERSE_FILE, DOC_LABELS_FILE, DOC_SIZES_FILE, DOC_UNIQUE_TERMS_FILE,
    LABEL_IDS_FILE, LABEL_IDS_INVERSE_FILE,
};

// ============================================================================
// WRITER
// ============================================================================

pub struct MetadataWriter {
    sizes: DiskVectorWriter<u64>,
    unique: DiskVectorWriter<u64>,
    labels: DiskVectorWriter<u32>,
    names: StringListWriter,
    label_ids: HashMap<String, u32>,
    label_order: Vec<String>,
    total_terms: u64,
    total_unique: u64,
}

impl MetadataWriter {
    pub fn create(dir: &Path) -> Result<Self> {
        Ok(Self {
            sizes: DiskVectorWriter::create(dir.join(DOC_SIZES_FILE))?,
            unique: DiskVectorWriter::create(dir.join(DOC_UNIQUE_TERMS_FILE))?,
            labels: DiskVectorWriter::create(dir.join(DOC_LABELS_FILE))?,
            names: StringListWriter::create(dir.join(DOCIDS_FILE), dir.join(DOCIDS_INVERSE_FILE))?,
            label_ids: HashMap::new(),
            label_order: Vec::new(),
            total_terms: 0,
            total_unique: 0,
        })
    }

    /// Record one document's row; rows are assigned ascending doc ids.
    pub fn add(
        &mut self,
        name: &str,
        length: u64,
        unique_terms: u64,
        label: Option<&str>,
    ) -> Result<DocId> {
        let doc_id = DocId(self.sizes.len() as u64);
        self.sizes.push(length)?;
        self.unique.push(unique_terms)?;
        self.names.push(name)?;
        self.total_terms += length;
        self.total_unique += unique_terms;

        // 0 is the unlabeled sentinel; stored ids are shifted by one
        let stored = match label {
            None => 0,
            Some(label) => match self.label_ids.get(label) {
                Some(&id) => id + 1,
                None => {
                    let id = self.label_order.len() as u32;
                    self.label_ids.insert(label.to_owned(), id);
                    self.label_order.push(label.to_owned());
                    id + 1
                }
            },
        };
        self.labels.push(stored)?;
        Ok(doc_id)
    }

    pub fn num_docs(&self) -> u64 {
        self.sizes.len() as u64
    }

    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    pub fn total_unique_terms(&self) -> u64 {
        self.total_unique
    }

    pub fn finish(self, dir: &Path) -> Result<()> {
        self.sizes.finish()?;
        self.unique.finish()?;
        self.labels.finish()?;
        self.names.finish()?;

        let mut labels = StringListWriter::create(
            dir.join(LABEL_IDS_FILE),
            dir.join(LABEL_IDS_INVERSE_FILE),
        )?;
        for label in &self.label_order {
            labels.push(label)?;
        }
        labels.finish()
    }
}

// ============================================================================
// READER
// ============================================================================

pub struct DocumentMetadata {
    sizes: DiskVector<u64>,
    unique: DiskVector<u64>,
    labels: DiskVector<u32>,
    names: StringList,
    label_names: Vec<String>,
    total_terms: u64,
}

impl DocumentMetadata {
    pub fn open(dir: &Path) -> Result<Self> {
        let sizes: DiskVector<u64> = DiskVector::open(dir.join(DOC_SIZES_FILE))?;
        let unique: DiskVector<u64> = DiskVector::open(dir.join(DOC_UNIQUE_TERMS_FILE))?;
        let labels: DiskVector<u32> = DiskVector::open(dir.join(DOC_LABELS_FILE))?;
        let names = StringList::open(dir.join(DOCIDS_FILE), dir.join(DOCIDS_INVERSE_FILE))?;

        let num_docs = sizes.len();
        for (len, file) in [
            (unique.len(), DOC_UNIQUE_TERMS_FILE),
            (labels.len(), DOC_LABELS_FILE),
            (names.len(), DOCIDS_FILE),
        ] {
            if len != num_docs {
                return Err(Error::corruption(
                    dir.join(file),
                    format!("{} metadata rows for {} documents", len, num_docs),
                ));
            }
        }

        let label_list = StringList::open(
            dir.join(LABEL_IDS_FILE),
            dir.join(LABEL_IDS_INVERSE_FILE),
        )?;
        let mut label_names = Vec::with_capacity(label_list.len());
        for id in 0..label_list.len() as u64 {
            match label_list.get(id)? {
                Some(name) => label_names.push(name),
                None => {
                    return Err(Error::corruption(
                        dir.join(LABEL_IDS_FILE),
                        format!("missing label string for id {}", id),
                    ))
                }
            }
        }

        let total_terms = sizes.iter().sum();
        Ok(Self {
            sizes,
            unique,
            labels,
            names,
            label_names,
            total_terms,
        })
    }

    pub fn num_docs(&self) -> u64 {
        self.sizes.len() as u64
    }

    /// Total tokens across the corpus (`|C|`).
    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    pub fn avg_doc_length(&self) -> f64 {
        if self.sizes.is_empty() {
            0.0
        } else {
            self.total_terms as f64 / self.sizes.len() as f64
        }
    }

    pub fn doc_size(&self, doc: DocId) -> u64 {
        self.sizes.get(doc.as_usize())
    }

    pub fn unique_terms(&self, doc: DocId) -> u64 {
        self.unique.get(doc.as_usize())
    }

    pub fn label_id(&self, doc: DocId) -> Option<LabelId> {
        match self.labels.get(doc.as_usize()) {
            0 => None,
            stored => Some(LabelId(stored - 1)),
        }
    }

    pub fn label(&self, doc: DocId) -> Option<&str> {
        self.label_id(doc)
            .and_then(|id| self.label_names.get(id.get() as usize))
            .map(String::as_str)
    }

    pub fn doc_name(&self, doc: DocId) -> Result<Option<String>> {
        self.names.get(doc.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_rows_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MetadataWriter::create(dir.path()).unwrap();
        assert_eq!(
            writer.add("doc-a", 4, 3, Some("spam")).unwrap(),
            DocId(0)
        );
        assert_eq!(writer.add("doc-b", 3, 2, None).unwrap(), DocId(1));
        assert_eq!(
            writer.add("doc-c", 1, 1, Some("spam")).unwrap(),
            DocId(2)
        );
        writer.finish(dir.path()).unwrap();

        let meta = DocumentMetadata::open(dir.path()).unwrap();
        assert_eq!(meta.num_docs(), 3);
        assert_eq!(meta.total_terms(), 8);
        assert_eq!(meta.doc_size(DocId(0)), 4);
        assert_eq!(meta.unique_terms(DocId(1)), 2);
        assert_eq!(meta.label(DocId(0)), Some("spam"));
        assert_eq!(meta.label(DocId(1)), None);
        assert_eq!(meta.label_id(DocId(2)), Some(LabelId(0)));
        assert_eq!(meta.doc_name(DocId(2)).unwrap().as_deref(), Some("doc-c"));
    }
}
