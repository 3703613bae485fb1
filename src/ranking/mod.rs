// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Document-at-a-time query evaluation.
//!
//! One scoring context per query term holds a postings stream positioned at
//! that term's next admitted document. Each round scores the minimum doc id
//! across the active contexts, advances the matching cursors, and offers the
//! result to a bounded top-K heap. Out-of-vocabulary terms contribute
//! nothing; an admission filter keeps rejected documents from ever being
//! scored; cancellation returns the partial top-K accumulated so far.

pub mod models;

use std::collections::BinaryHeap;
use std::collections::HashMap;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::index::{InvertedIndex, PostingsStream};
use crate::types::{DocId, TermId};

pub use models::{AbsoluteDiscount, DirichletPrior, JelinekMercer, OkapiBm25, PivotedLength};

/// The statistics a scoring function sees for one `(query, term, document)`
/// triple.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreData {
    pub avg_doc_length: f64,
    pub num_docs: u64,
    pub total_corpus_terms: u64,
    /// Sum of query term weights.
    pub query_length: f64,
    pub query_term_weight: f64,
    pub term_id: TermId,
    pub doc_id: DocId,
    pub doc_size: u64,
    pub doc_unique_terms: u64,
    /// Document frequency of the term.
    pub doc_count: u64,
    /// Corpus-wide occurrences of the term.
    pub corpus_term_count: u64,
    /// Occurrences of the term in the current document.
    pub doc_term_count: u64,
}

/// A per-term scoring function plus its per-document constant.
pub trait RankingFunction: Send + Sync {
    /// Contribution of one matched query term.
    fn score_one(&self, sd: &ScoreData) -> f64;

    /// Document-dependent constant added once per scored document. The term
    /// fields of `sd` are zeroed when this is called.
    fn initial_score(&self, _sd: &ScoreData) -> f64 {
        0.0
    }
}

/// A scored document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub score: f64,
}

// ============================================================================
// RANKER FACTORIES
// ============================================================================

/// Factory: ranker parameters arrive as a TOML table (usually the
/// `[ranker]` section of a config file).
pub type RankerFactory = fn(&toml::Table) -> Result<Box<dyn RankingFunction>>;

/// Registry of ranking functions keyed by method name. The five built-in
/// methods are pre-registered; embedders may add their own.
pub struct RankerRegistry {
    factories: HashMap<String, RankerFactory>,
}

impl RankerRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("bm25", models::bm25_factory);
        registry.register("pivoted-length", models::pivoted_length_factory);
        registry.register("jelinek-mercer", models::jelinek_mercer_factory);
        registry.register("dirichlet-prior", models::dirichlet_prior_factory);
        registry.register("absolute-discount", models::absolute_discount_factory);
        registry
    }

    pub fn register(&mut self, name: &str, factory: RankerFactory) {
        self.factories.insert(name.to_owned(), factory);
    }

    pub fn create(&self, name: &str, params: &toml::Table) -> Result<Box<dyn RankingFunction>> {
        match self.factories.get(name) {
            Some(factory) => factory(params),
            None => Err(Error::misuse(format!("unknown ranker method {:?}", name))),
        }
    }
}

impl Default for RankerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// TOP-K HEAP
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    doc_id: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// Greater means better: higher score, ties broken by lower doc id.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

/// Bounded min-heap keeping the K best candidates.
struct TopK {
    limit: usize,
    heap: BinaryHeap<std::cmp::Reverse<Candidate>>,
}

impl TopK {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            heap: BinaryHeap::with_capacity(limit.saturating_add(1)),
        }
    }

    fn offer(&mut self, candidate: Candidate) {
        if self.limit == 0 {
            return;
        }
        if self.heap.len() < self.limit {
            self.heap.push(std::cmp::Reverse(candidate));
        } else if candidate > self.heap.peek().expect("heap is non-empty").0 {
            self.heap.pop();
            self.heap.push(std::cmp::Reverse(candidate));
        }
    }

    fn into_sorted(self) -> Vec<SearchResult> {
        let mut results: Vec<Candidate> = self.heap.into_iter().map(|rev| rev.0).collect();
        results.sort_by(|a, b| b.cmp(a));
        results
            .into_iter()
            .map(|c| SearchResult {
                doc_id: DocId(c.doc_id),
                score: c.score,
            })
            .collect()
    }
}

// ============================================================================
// DOCUMENT-AT-A-TIME PIPELINE
// ============================================================================

struct PostingsContext<'a> {
    stream: PostingsStream<'a>,
    /// Current admitted posting, `None` once exhausted.
    cursor: Option<(u64, u64)>,
    term_id: TermId,
    query_term_weight: f64,
    doc_count: u64,
    corpus_term_count: u64,
}

impl<'a> PostingsContext<'a> {
    fn advance(&mut self, filter: &dyn Fn(DocId) -> bool) -> Result<()> {
        loop {
            match self.stream.advance()? {
                Some((doc, count)) if filter(DocId(doc)) => {
                    self.cursor = Some((doc, count));
                    return Ok(());
                }
                Some(_) => continue,
                None => {
                    self.cursor = None;
                    return Ok(());
                }
            }
        }
    }
}

/// Options for [`score_query`].
#[derive(Default)]
pub struct QueryOptions<'a> {
    /// Admission filter; documents it rejects are never scored.
    pub filter: Option<&'a dyn Fn(DocId) -> bool>,
    /// Cooperative cancellation; a fired token yields the partial top-K.
    pub cancel: Option<&'a CancelToken>,
}

/// Score `query` (pairs of term and weight) against `index`, returning at
/// most `num_results` documents sorted by `(score desc, doc_id asc)`.
pub fn score_query(
    index: &InvertedIndex,
    scorer: &dyn RankingFunction,
    query: &[(String, f64)],
    num_results: usize,
    opts: QueryOptions<'_>,
) -> Result<Vec<SearchResult>> {
    let accept_all = |_: DocId| true;
    let filter: &dyn Fn(DocId) -> bool = opts.filter.unwrap_or(&accept_all);

    let query_length: f64 = query.iter().map(|&(_, weight)| weight).sum();

    // one context per in-vocabulary query term, positioned at its first
    // admitted document
    let mut contexts = Vec::with_capacity(query.len());
    for (term, weight) in query {
        let Some(term_id) = index.term_id(term) else {
            continue; // OOV terms contribute nothing
        };
        let stream = index.stream_for(term_id)?;
        let mut context = PostingsContext {
            doc_count: stream.size(),
            corpus_term_count: stream.total_counts(),
            stream,
            cursor: None,
            term_id,
            query_term_weight: *weight,
        };
        context.advance(filter)?;
        contexts.push(context);
    }

    let base = ScoreData {
        avg_doc_length: index.avg_doc_length(),
        num_docs: index.num_docs(),
        total_corpus_terms: index.total_corpus_terms(),
        query_length,
        ..ScoreData::default()
    };

    let mut top_k = TopK::new(num_results);
    let mut current = contexts
        .iter()
        .filter_map(|ctx| ctx.cursor.map(|(doc, _)| doc))
        .min();

    while let Some(doc) = current {
        if let Some(token) = opts.cancel {
            if token.is_cancelled() {
                break; // partial top-K
            }
        }

        let doc_id = DocId(doc);
        let mut sd = ScoreData {
            doc_id,
            doc_size: index.doc_size(doc_id),
            doc_unique_terms: index.unique_terms(doc_id),
            ..base
        };
        let mut score = scorer.initial_score(&sd);

        let mut next: Option<u64> = None;
        for context in &mut contexts {
            if let Some((ctx_doc, count)) = context.cursor {
                if ctx_doc == doc {
                    sd.term_id = context.term_id;
                    sd.query_term_weight = context.query_term_weight;
                    sd.doc_count = context.doc_count;
                    sd.corpus_term_count = context.corpus_term_count;
                    sd.doc_term_count = count;
                    score += scorer.score_one(&sd);
                    context.advance(filter)?;
                }
            }
            if let Some((ctx_doc, _)) = context.cursor {
                next = Some(next.map_or(ctx_doc, |n| n.min(ctx_doc)));
            }
        }

        top_k.offer(Candidate { score, doc_id: doc });
        current = next;
    }

    Ok(top_k.into_sorted())
}
