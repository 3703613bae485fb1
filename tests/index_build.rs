//! End-to-end index construction over toy corpora.

use std::path::Path;

use stele::cancel::CancelToken;
use stele::config::IndexConfig;
use stele::corpus::{Document, WhitespaceAnalyzer};
use stele::error::Error;
use stele::index::{ForwardIndex, InvertedIndex};
use stele::types::{DocId, TermId};

fn toy_config(prefix: &Path) -> IndexConfig {
    IndexConfig {
        prefix: prefix.to_path_buf(),
        dataset: "toy".to_owned(),
        ..IndexConfig::default()
    }
}

fn toy_docs() -> Vec<stele::Result<Document>> {
    ["a b b c", "b c c", "a"]
        .iter()
        .enumerate()
        .map(|(i, text)| Ok(Document::new(format!("toy-{}", i), *text)))
        .collect()
}

fn build_toy(prefix: &Path) -> InvertedIndex {
    InvertedIndex::build(&toy_config(prefix), toy_docs(), &WhitespaceAnalyzer, None).unwrap()
}

#[test]
fn three_document_corpus_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());

    assert_eq!(index.num_docs(), 3);
    assert_eq!(index.num_terms(), 3);
    assert_eq!(index.total_corpus_terms(), 8);

    for (term, df, cf) in [("a", 2, 2), ("b", 2, 3), ("c", 2, 3)] {
        let id = index.term_id(term).expect("in vocabulary");
        assert_eq!(index.doc_freq(id), df, "df({})", term);
        assert_eq!(index.corpus_count(id), cf, "cf({})", term);
    }

    assert_eq!(
        (0..3).map(|d| index.doc_size(DocId(d))).collect::<Vec<_>>(),
        vec![4, 3, 1]
    );
    assert_eq!(
        (0..3)
            .map(|d| index.unique_terms(DocId(d)))
            .collect::<Vec<_>>(),
        vec![3, 2, 1]
    );

    assert_eq!(index.term_id("d"), None);
    assert_eq!(index.doc_name(DocId(2)).unwrap().as_deref(), Some("toy-2"));
}

#[test]
fn postings_lists_are_sorted_and_complete() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());

    let b = index.term_id("b").unwrap();
    let mut stream = index.stream_for(b).unwrap();
    assert_eq!(stream.advance().unwrap(), Some((0, 2)));
    assert_eq!(stream.advance().unwrap(), Some((1, 1)));
    assert_eq!(stream.advance().unwrap(), None);

    let a = index.term_id("a").unwrap();
    let mut stream = index.stream_for(a).unwrap();
    assert_eq!(stream.advance().unwrap(), Some((0, 1)));
    assert_eq!(stream.advance().unwrap(), Some((2, 1)));
    assert_eq!(stream.advance().unwrap(), None);
}

#[test]
fn aggregate_invariants_hold_on_a_larger_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let docs: Vec<stele::Result<Document>> = (0..200)
        .map(|i| {
            let text = format!(
                "word{} word{} shared common common word{}",
                i % 17,
                i % 5,
                (i * 3) % 11
            );
            Ok(Document::new(format!("doc-{}", i), text))
        })
        .collect();
    let config = toy_config(dir.path());
    let index = InvertedIndex::build(&config, docs, &WhitespaceAnalyzer, None).unwrap();

    let sum_df: u64 = (0..index.num_terms())
        .map(|t| index.doc_freq(TermId(t)))
        .sum();
    let sum_unique: u64 = (0..index.num_docs())
        .map(|d| index.unique_terms(DocId(d)))
        .sum();
    assert_eq!(sum_df, sum_unique);

    let sum_cf: u64 = (0..index.num_terms())
        .map(|t| index.corpus_count(TermId(t)))
        .sum();
    let sum_len: u64 = (0..index.num_docs()).map(|d| index.doc_size(DocId(d))).sum();
    assert_eq!(sum_cf, sum_len);
    assert_eq!(sum_cf, index.total_corpus_terms());

    // every surface round-trips through the vocabulary
    for term in 0..index.num_terms() {
        let surface = index.term_string(TermId(term)).unwrap().unwrap();
        assert_eq!(index.term_id(&surface), Some(TermId(term)));
    }
}

#[test]
fn small_ram_budget_spills_chunks_without_changing_the_result() {
    let tight = tempfile::tempdir().unwrap();
    let roomy = tempfile::tempdir().unwrap();

    let docs = || -> Vec<stele::Result<Document>> {
        (0..50)
            .map(|i| Ok(Document::new(format!("d{}", i), format!("x y{} z{}", i % 3, i % 7))))
            .collect()
    };

    let mut tight_config = toy_config(tight.path());
    tight_config.indexer_ram_budget = 96; // a few triples per chunk

    let a = InvertedIndex::build(&tight_config, docs(), &WhitespaceAnalyzer, None).unwrap();
    let b = InvertedIndex::build(&toy_config(roomy.path()), docs(), &WhitespaceAnalyzer, None)
        .unwrap();

    assert_eq!(a.num_terms(), b.num_terms());
    for term in 0..a.num_terms() {
        let id = TermId(term);
        assert_eq!(a.doc_freq(id), b.doc_freq(id));
        assert_eq!(a.corpus_count(id), b.corpus_count(id));
    }
}

#[test]
fn builds_are_bit_identical_across_directories() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    build_toy(first.path());
    build_toy(second.path());

    for file in [
        "postings.index",
        "postings.index_offsets",
        "docsizes.counts",
        "docs.uniqueterms",
        "docs.labels",
        "docids.mapping",
        "docids.mapping.inverse",
        "termids.mapping.inverse",
    ] {
        let a = std::fs::read(first.path().join("toy").join(file)).unwrap();
        let b = std::fs::read(second.path().join("toy").join(file)).unwrap();
        assert_eq!(a, b, "{} differs between builds", file);
    }
}

#[test]
fn labels_intern_and_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let docs = vec![
        Ok(Document::new("d0", "spam spam").with_label("spam")),
        Ok(Document::new("d1", "ham").with_label("ham")),
        Ok(Document::new("d2", "eggs")),
        Ok(Document::new("d3", "more spam").with_label("spam")),
    ];
    let index =
        InvertedIndex::build(&toy_config(dir.path()), docs, &WhitespaceAnalyzer, None).unwrap();

    let meta = index.metadata();
    assert_eq!(meta.label(DocId(0)), Some("spam"));
    assert_eq!(meta.label(DocId(1)), Some("ham"));
    assert_eq!(meta.label(DocId(2)), None);
    assert_eq!(meta.label_id(DocId(0)), meta.label_id(DocId(3)));
}

#[test]
fn uninvert_builds_a_consistent_forward_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = toy_config(dir.path());
    config.uninvert = true;

    let index = InvertedIndex::build(&config, toy_docs(), &WhitespaceAnalyzer, None).unwrap();
    let forward = ForwardIndex::open(config.index_dir()).unwrap();
    assert_eq!(forward.num_docs(), 3);

    // doc 0 = "a b b c" with term ids in first-seen order a=0, b=1, c=2
    let mut stream = forward.stream_for(DocId(0)).unwrap();
    assert_eq!(stream.advance().unwrap(), Some((0, 1)));
    assert_eq!(stream.advance().unwrap(), Some((1, 2)));
    assert_eq!(stream.advance().unwrap(), Some((2, 1)));
    assert_eq!(stream.advance().unwrap(), None);

    for d in 0..3 {
        assert_eq!(forward.doc_length(DocId(d)), index.doc_size(DocId(d)));
        assert_eq!(forward.unique_terms(DocId(d)), index.unique_terms(DocId(d)));
    }
}

#[test]
fn cancelled_build_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = toy_config(dir.path());

    let token = CancelToken::new();
    token.cancel();
    let err = InvertedIndex::build(&config, toy_docs(), &WhitespaceAnalyzer, Some(&token))
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }));

    assert!(!config.index_dir().exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "partial outputs left: {:?}", leftovers);
}

#[test]
fn build_refuses_an_existing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = toy_config(dir.path());
    std::fs::create_dir_all(config.index_dir()).unwrap();

    let err = InvertedIndex::build(&config, toy_docs(), &WhitespaceAnalyzer, None).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn truncated_postings_fail_at_open() {
    let dir = tempfile::tempdir().unwrap();
    build_toy(dir.path());
    let index_dir = dir.path().join("toy");

    let postings = index_dir.join("postings.index");
    let bytes = std::fs::read(&postings).unwrap();
    std::fs::write(&postings, &bytes[..bytes.len() - 2]).unwrap();

    let err = InvertedIndex::open(&index_dir).unwrap_err();
    assert!(matches!(err, Error::Corruption { .. }), "got {:?}", err);
}

#[test]
fn metadata_row_count_mismatch_is_corruption() {
    let dir = tempfile::tempdir().unwrap();
    build_toy(dir.path());
    let index_dir = dir.path().join("toy");

    // drop one row from the sizes vector
    let sizes = index_dir.join("docsizes.counts");
    let bytes = std::fs::read(&sizes).unwrap();
    std::fs::write(&sizes, &bytes[..bytes.len() - 8]).unwrap();

    let err = InvertedIndex::open(&index_dir).unwrap_err();
    assert!(matches!(err, Error::Corruption { .. }), "got {:?}", err);
}
