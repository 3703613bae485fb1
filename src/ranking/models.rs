// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! The built-in ranking functions.
//!
//! Formulas follow the standard IR literature: Okapi BM25 with the smoothed
//! idf, pivoted length normalization, and the three unigram language-model
//! smoothings (Jelinek-Mercer, Dirichlet prior, absolute discounting). All
//! arithmetic is `f64`; counts arrive as `u64` in [`ScoreData`].

use crate::error::{Error, Result};

use super::{RankingFunction, ScoreData};

fn param(table: &toml::Table, key: &str, default: f64) -> Result<f64> {
    match table.get(key) {
        None => Ok(default),
        Some(toml::Value::Float(f)) => Ok(*f),
        Some(toml::Value::Integer(i)) => Ok(*i as f64),
        Some(other) => Err(Error::misuse(format!(
            "ranker parameter {:?} must be a number, got {}",
            key, other
        ))),
    }
}

// ============================================================================
// OKAPI BM25
// ============================================================================

/// Okapi BM25 with the `+1` smoothed idf (scores stay positive even for
/// terms in most documents).
#[derive(Debug, Clone, Copy)]
pub struct OkapiBm25 {
    pub k1: f64,
    pub b: f64,
    pub k3: f64,
}

impl Default for OkapiBm25 {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            k3: 500.0,
        }
    }
}

impl RankingFunction for OkapiBm25 {
    fn score_one(&self, sd: &ScoreData) -> f64 {
        let doc_len = sd.doc_size as f64;
        let tf = sd.doc_term_count as f64;
        let qtf = sd.query_term_weight;

        let idf = (1.0
            + (sd.num_docs as f64 - sd.doc_count as f64 + 0.5) / (sd.doc_count as f64 + 0.5))
            .ln();
        let tf_part = tf * (self.k1 + 1.0)
            / (tf + self.k1 * (1.0 - self.b + self.b * doc_len / sd.avg_doc_length));
        let qtf_part = qtf * (self.k3 + 1.0) / (self.k3 + qtf);

        idf * tf_part * qtf_part
    }
}

pub(super) fn bm25_factory(params: &toml::Table) -> Result<Box<dyn RankingFunction>> {
    let defaults = OkapiBm25::default();
    Ok(Box::new(OkapiBm25 {
        k1: param(params, "k1", defaults.k1)?,
        b: param(params, "b", defaults.b)?,
        k3: param(params, "k3", defaults.k3)?,
    }))
}

// ============================================================================
// PIVOTED LENGTH NORMALIZATION
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PivotedLength {
    pub s: f64,
}

impl Default for PivotedLength {
    fn default() -> Self {
        Self { s: 0.2 }
    }
}

impl RankingFunction for PivotedLength {
    fn score_one(&self, sd: &ScoreData) -> f64 {
        let tf = sd.doc_term_count as f64;
        let doc_len = sd.doc_size as f64;
        let norm = (1.0 - self.s) + self.s * doc_len / sd.avg_doc_length;
        let tf_part = (1.0 + (1.0 + tf.ln()).ln()) / norm;
        let idf = ((sd.num_docs as f64 + 1.0) / sd.doc_count as f64).ln();
        sd.query_term_weight * tf_part * idf
    }
}

pub(super) fn pivoted_length_factory(params: &toml::Table) -> Result<Box<dyn RankingFunction>> {
    Ok(Box::new(PivotedLength {
        s: param(params, "s", PivotedLength::default().s)?,
    }))
}

// ============================================================================
// JELINEK-MERCER SMOOTHING
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct JelinekMercer {
    pub lambda: f64,
}

impl Default for JelinekMercer {
    fn default() -> Self {
        Self { lambda: 0.7 }
    }
}

impl RankingFunction for JelinekMercer {
    fn score_one(&self, sd: &ScoreData) -> f64 {
        let tf = sd.doc_term_count as f64;
        let doc_len = sd.doc_size as f64;
        let ratio = tf * sd.total_corpus_terms as f64
            / (sd.corpus_term_count as f64 * doc_len);
        sd.query_term_weight * (1.0 + (1.0 - self.lambda) / self.lambda * ratio).ln()
    }
}

pub(super) fn jelinek_mercer_factory(params: &toml::Table) -> Result<Box<dyn RankingFunction>> {
    Ok(Box::new(JelinekMercer {
        lambda: param(params, "lambda", JelinekMercer::default().lambda)?,
    }))
}

// ============================================================================
// DIRICHLET PRIOR SMOOTHING
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct DirichletPrior {
    pub mu: f64,
}

impl Default for DirichletPrior {
    fn default() -> Self {
        Self { mu: 2000.0 }
    }
}

impl RankingFunction for DirichletPrior {
    fn score_one(&self, sd: &ScoreData) -> f64 {
        let tf = sd.doc_term_count as f64;
        let ratio =
            tf * sd.total_corpus_terms as f64 / (self.mu * sd.corpus_term_count as f64);
        sd.query_term_weight * (1.0 + ratio).ln()
    }

    fn initial_score(&self, sd: &ScoreData) -> f64 {
        sd.query_length * (self.mu / (sd.doc_size as f64 + self.mu)).ln()
    }
}

pub(super) fn dirichlet_prior_factory(params: &toml::Table) -> Result<Box<dyn RankingFunction>> {
    Ok(Box::new(DirichletPrior {
        mu: param(params, "mu", DirichletPrior::default().mu)?,
    }))
}

// ============================================================================
// ABSOLUTE DISCOUNTING
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct AbsoluteDiscount {
    pub delta: f64,
}

impl Default for AbsoluteDiscount {
    fn default() -> Self {
        Self { delta: 0.7 }
    }
}

impl RankingFunction for AbsoluteDiscount {
    fn score_one(&self, sd: &ScoreData) -> f64 {
        let tf = sd.doc_term_count as f64;
        let doc_len = sd.doc_size as f64;
        let collection_prob = sd.corpus_term_count as f64 / sd.total_corpus_terms as f64;
        let contribution = (tf - self.delta).max(0.0) / doc_len;
        let constant = self.delta * sd.doc_unique_terms as f64 / doc_len;
        sd.query_term_weight * (1.0 + contribution / (constant * collection_prob)).ln()
    }

    fn initial_score(&self, sd: &ScoreData) -> f64 {
        let constant = self.delta * sd.doc_unique_terms as f64 / sd.doc_size as f64;
        sd.query_length * constant.ln()
    }
}

pub(super) fn absolute_discount_factory(params: &toml::Table) -> Result<Box<dyn RankingFunction>> {
    Ok(Box::new(AbsoluteDiscount {
        delta: param(params, "delta", AbsoluteDiscount::default().delta)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocId, TermId};

    fn sample() -> ScoreData {
        ScoreData {
            avg_doc_length: 8.0 / 3.0,
            num_docs: 3,
            total_corpus_terms: 8,
            query_length: 2.0,
            query_term_weight: 1.0,
            term_id: TermId(1),
            doc_id: DocId(1),
            doc_size: 3,
            doc_unique_terms: 2,
            doc_count: 2,
            corpus_term_count: 3,
            doc_term_count: 2,
        }
    }

    #[test]
    fn bm25_matches_hand_computation() {
        let ranker = OkapiBm25 {
            k1: 1.2,
            b: 0.75,
            k3: 500.0,
        };
        let sd = sample();

        let idf = (1.0f64 + (3.0 - 2.0 + 0.5) / 2.5).ln();
        let tf_part = 2.0 * 2.2 / (2.0 + 1.2 * (0.25 + 0.75 * 3.0 / (8.0 / 3.0)));
        let qtf_part = 501.0 / 501.0;
        let expected = idf * tf_part * qtf_part;

        assert!((ranker.score_one(&sd) - expected).abs() < 1e-12);
        assert!(ranker.score_one(&sd) > 0.0);
    }

    #[test]
    fn bm25_idf_positive_even_for_ubiquitous_terms() {
        let ranker = OkapiBm25::default();
        let mut sd = sample();
        sd.doc_count = sd.num_docs; // term occurs in every document
        assert!(ranker.score_one(&sd) > 0.0);
    }

    #[test]
    fn dirichlet_initial_score_penalizes_long_docs() {
        let ranker = DirichletPrior { mu: 100.0 };
        let mut short = sample();
        short.doc_size = 5;
        let mut long = sample();
        long.doc_size = 5000;
        assert!(ranker.initial_score(&short) > ranker.initial_score(&long));
    }

    #[test]
    fn jelinek_mercer_rewards_rare_terms() {
        let ranker = JelinekMercer::default();
        let mut rare = sample();
        rare.corpus_term_count = 1;
        let mut common = sample();
        common.corpus_term_count = 6;
        assert!(ranker.score_one(&rare) > ranker.score_one(&common));
    }

    #[test]
    fn absolute_discount_floors_at_zero_contribution() {
        let ranker = AbsoluteDiscount { delta: 0.7 };
        let mut sd = sample();
        sd.doc_term_count = 0;
        // max(tf - delta, 0) = 0, so only the log(1 + 0) = 0 term remains
        assert_eq!(ranker.score_one(&sd), 0.0);
    }
}
