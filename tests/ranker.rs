//! Ranker pipeline behavior: scoring order, admission filtering, top-K
//! bounds, and the ranker registry.

use std::path::Path;

use stele::cancel::CancelToken;
use stele::config::IndexConfig;
use stele::corpus::{Document, WhitespaceAnalyzer};
use stele::index::InvertedIndex;
use stele::ranking::{
    score_query, DirichletPrior, JelinekMercer, OkapiBm25, QueryOptions, RankerRegistry,
};
use stele::types::DocId;

fn build_toy(prefix: &Path) -> InvertedIndex {
    let config = IndexConfig {
        prefix: prefix.to_path_buf(),
        dataset: "toy".to_owned(),
        ..IndexConfig::default()
    };
    let docs = ["a b b c", "b c c", "a"]
        .iter()
        .enumerate()
        .map(|(i, text)| Ok(Document::new(format!("toy-{}", i), *text)))
        .collect::<Vec<_>>();
    InvertedIndex::build(&config, docs, &WhitespaceAnalyzer, None).unwrap()
}

fn query(terms: &[&str]) -> Vec<(String, f64)> {
    terms.iter().map(|t| (t.to_string(), 1.0)).collect()
}

#[test]
fn bm25_ranks_relative_term_frequency() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());

    let scorer = OkapiBm25 {
        k1: 1.2,
        b: 0.75,
        k3: 500.0,
    };
    let results = score_query(
        &index,
        &scorer,
        &query(&["b", "c"]),
        3,
        QueryOptions::default(),
    )
    .unwrap();

    // doc 1 ("b c c") has higher relative tf than doc 0 ("a b b c");
    // doc 2 matches neither term
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].doc_id, DocId(1));
    assert_eq!(results[1].doc_id, DocId(0));
    assert!(results[0].score > results[1].score);
    assert!(results.iter().all(|r| r.score > 0.0));
}

#[test]
fn empty_query_and_zero_k_yield_empty_rankings() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());
    let scorer = OkapiBm25::default();

    let no_terms = score_query(&index, &scorer, &[], 10, QueryOptions::default()).unwrap();
    assert!(no_terms.is_empty());

    let zero_k =
        score_query(&index, &scorer, &query(&["b"]), 0, QueryOptions::default()).unwrap();
    assert!(zero_k.is_empty());
}

#[test]
fn oov_terms_are_ignored_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());

    let results = score_query(
        &index,
        &OkapiBm25::default(),
        &query(&["b", "nonexistent"]),
        10,
        QueryOptions::default(),
    )
    .unwrap();
    assert_eq!(results.len(), 2); // docs 0 and 1 contain "b"

    let all_oov = score_query(
        &index,
        &OkapiBm25::default(),
        &query(&["nope", "nada"]),
        10,
        QueryOptions::default(),
    )
    .unwrap();
    assert!(all_oov.is_empty());
}

#[test]
fn admission_filter_is_never_violated() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());

    let reject_doc_1 = |doc: DocId| doc != DocId(1);
    let results = score_query(
        &index,
        &OkapiBm25::default(),
        &query(&["b", "c"]),
        10,
        QueryOptions {
            filter: Some(&reject_doc_1),
            cancel: None,
        },
    )
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].doc_id, DocId(0));
}

#[test]
fn top_k_truncates_and_orders_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexConfig {
        prefix: dir.path().to_path_buf(),
        dataset: "big".to_owned(),
        ..IndexConfig::default()
    };
    // 40 docs all containing "common"; doc i repeats it i+1 times, padded to
    // identical length so higher tf always wins
    let docs: Vec<stele::Result<Document>> = (0..40)
        .map(|i| {
            let mut words = vec!["common"; i + 1];
            words.resize(41, "filler");
            Ok(Document::new(format!("d{}", i), words.join(" ")))
        })
        .collect();
    let index = InvertedIndex::build(&config, docs, &WhitespaceAnalyzer, None).unwrap();

    let results = score_query(
        &index,
        &OkapiBm25::default(),
        &query(&["common"]),
        5,
        QueryOptions::default(),
    )
    .unwrap();

    assert_eq!(results.len(), 5);
    for pair in results.windows(2) {
        assert!(
            pair[0].score > pair[1].score
                || (pair[0].score == pair[1].score && pair[0].doc_id < pair[1].doc_id)
        );
    }
    // highest tf wins
    assert_eq!(results[0].doc_id, DocId(39));

    // no duplicates
    let mut ids: Vec<u64> = results.iter().map(|r| r.doc_id.get()).collect();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[test]
fn score_ties_break_by_ascending_doc_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexConfig {
        prefix: dir.path().to_path_buf(),
        dataset: "ties".to_owned(),
        ..IndexConfig::default()
    };
    // identical documents score identically
    let docs: Vec<stele::Result<Document>> = (0..6)
        .map(|i| Ok(Document::new(format!("d{}", i), "same text here")))
        .collect();
    let index = InvertedIndex::build(&config, docs, &WhitespaceAnalyzer, None).unwrap();

    let results = score_query(
        &index,
        &OkapiBm25::default(),
        &query(&["same"]),
        4,
        QueryOptions::default(),
    )
    .unwrap();

    let ids: Vec<u64> = results.iter().map(|r| r.doc_id.get()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[test]
fn cancellation_returns_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());

    let token = CancelToken::new();
    token.cancel();
    let results = score_query(
        &index,
        &OkapiBm25::default(),
        &query(&["b", "c"]),
        10,
        QueryOptions {
            filter: None,
            cancel: Some(&token),
        },
    )
    .unwrap();
    assert!(results.is_empty());
}

#[test]
fn language_model_rankers_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let index = build_toy(dir.path());

    let jm = score_query(
        &index,
        &JelinekMercer::default(),
        &query(&["b", "c"]),
        3,
        QueryOptions::default(),
    )
    .unwrap();
    assert_eq!(jm.len(), 2);
    assert_eq!(jm[0].doc_id, DocId(1));

    let dirichlet = score_query(
        &index,
        &DirichletPrior { mu: 10.0 },
        &query(&["b", "c"]),
        3,
        QueryOptions::default(),
    )
    .unwrap();
    assert_eq!(dirichlet.len(), 2);
}

#[test]
fn registry_builds_rankers_from_toml() {
    let registry = RankerRegistry::with_defaults();

    let params: toml::Table = toml::from_str("k1 = 2.0\nb = 0.5").unwrap();
    assert!(registry.create("bm25", &params).is_ok());
    assert!(registry.create("dirichlet-prior", &toml::Table::new()).is_ok());
    assert!(registry.create("no-such-method", &toml::Table::new()).is_err());

    let bad: toml::Table = toml::from_str("k1 = \"high\"").unwrap();
    assert!(registry.create("bm25", &bad).is_err());
}
