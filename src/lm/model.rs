// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! The back-off language model.
//!
//! `score` appends the token to the history, finds the longest stored
//! suffix (top order first, then middle layers, finally the unigram), and
//! charges the back-off weight of every context that had to be shortened.
//! The matched suffix becomes the outgoing state, so consecutive calls walk
//! a sentence in O(tokens) map lookups.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::hashing::perfect_hash_map::VALUES_FILE;

use super::arpa::{self, ArpaHandler};
use super::ngram_map::{
    MiddleMap, MiddleMapBuilder, NgramMapOptions, TopMap, TopMapBuilder, UnigramMap,
    UnigramMapBuilder,
};
use super::{LmState, ProbBackoff};

/// Token used for out-of-vocabulary words; every ARPA model carries it.
pub const UNKNOWN_TOKEN: &str = "<unk>";

pub struct LanguageModel {
    /// The model's n-gram order `N`.
    order: usize,
    unigrams: UnigramMap,
    /// `middle[k - 2]` maps `k`-id sequences, for `k` in `2..N`.
    middle: Vec<MiddleMap>,
    top: TopMap,
    unk: (u64, ProbBackoff),
}

impl LanguageModel {
    // ========================================================================
    // BUILD
    // ========================================================================

    /// Convert an ARPA file into per-order hashed maps under `prefix`.
    /// Returns the model order. `prefix` must not already exist.
    pub fn build_from_arpa(
        arpa_path: impl AsRef<Path>,
        prefix: impl AsRef<Path>,
        opts: &NgramMapOptions,
    ) -> Result<usize> {
        let prefix = prefix.as_ref();
        if prefix.exists() {
            return Err(Error::io(
                prefix,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "language model directory already exists",
                ),
            ));
        }
        let mut partial = prefix.to_path_buf().into_os_string();
        partial.push(".partial");
        let partial: PathBuf = partial.into();

        let result = Self::build_into(arpa_path.as_ref(), &partial, opts);
        match result {
            Ok(order) => {
                fs::rename(&partial, prefix).map_err(|e| Error::io(prefix, e))?;
                Ok(order)
            }
            Err(err) => {
                let _ = fs::remove_dir_all(&partial);
                Err(err)
            }
        }
    }

    fn build_into(arpa_path: &Path, prefix: &Path, opts: &NgramMapOptions) -> Result<usize> {
        fs::create_dir_all(prefix).map_err(|e| Error::io(prefix, e))?;
        let mut handler = BuildHandler {
            prefix: prefix.to_path_buf(),
            opts: opts.clone(),
            counts: Vec::new(),
            order: 0,
            observed: 0,
            ids: Vec::new(),
            unigram_builder: None,
            unigrams: None,
            middle_builder: None,
            top_builder: None,
        };
        arpa::read_arpa(arpa_path, &mut handler)?;
        handler.finish_order()?;

        let order = handler.counts.len();
        if order < 2 {
            return Err(Error::corruption(
                arpa_path,
                format!("language model order {} is below the minimum of 2", order),
            ));
        }
        info!(order, "language model built");
        Ok(order)
    }

    // ========================================================================
    // OPEN
    // ========================================================================

    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();

        let mut order = 0usize;
        while prefix.join(order.to_string()).join(VALUES_FILE).exists() {
            order += 1;
        }
        if order < 2 {
            return Err(Error::corruption(
                prefix,
                format!("found {} n-gram layers; a model needs at least 2", order),
            ));
        }

        let unigrams = UnigramMap::open(prefix.join("0"))?;
        let mut middle = Vec::with_capacity(order.saturating_sub(2));
        for layer in 1..order - 1 {
            middle.push(MiddleMap::open(prefix.join(layer.to_string()))?);
        }
        let top = TopMap::open(prefix.join((order - 1).to_string()))?;

        let unk = unigrams.index_and_value(UNKNOWN_TOKEN).ok_or_else(|| {
            Error::corruption(prefix, "unigram layer is missing <unk>".to_owned())
        })?;

        Ok(Self {
            order,
            unigrams,
            middle,
            top,
            unk,
        })
    }

    /// The model's n-gram order `N`.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of distinct unigrams.
    pub fn vocab_size(&self) -> u64 {
        self.unigrams.len()
    }

    /// Resolve a token to its unigram id (`<unk>` for OOV tokens).
    pub fn token_id(&self, token: &str) -> u64 {
        self.unigrams
            .index_and_value(token)
            .map_or(self.unk.0, |(id, _)| id)
    }

    // ========================================================================
    // SCORING
    // ========================================================================

    /// Score `token` after `state`, returning the base-10 log-probability
    /// and the outgoing state (the matched suffix).
    pub fn score(&self, state: &LmState, token: &str) -> (f64, LmState) {
        let (id, unigram) = self
            .unigrams
            .index_and_value(token)
            .unwrap_or(self.unk);
        self.score_id(state, id, unigram)
    }

    /// Score a token already resolved to its unigram id.
    pub fn score_id(&self, state: &LmState, id: u64, unigram: ProbBackoff) -> (f64, LmState) {
        let mut out = state.clone();
        out.push(id);
        while out.len() > self.order {
            out.shrink();
        }

        // longest match: top order first
        if out.len() == self.order {
            if let Some(prob) = self.top.get(&out.previous) {
                out.shrink();
                return (f64::from(prob), out);
            }
            out.shrink();
        }

        let mut matched: Option<f32> = None;
        while out.len() > 1 {
            if let Some(entry) = self.middle[out.len() - 2].get(&out.previous) {
                matched = Some(entry.prob);
                break;
            }
            out.shrink();
        }
        let mut score = f64::from(matched.unwrap_or(unigram.prob));

        // a context extension never pays back-off
        if out.len() > state.len() {
            return (score, out);
        }

        // charge back-off for every context from the full history down to
        // the matched suffix
        let mut context = state.clone();
        for _ in 0..=(state.len() - out.len()) {
            score += f64::from(self.context_backoff(&context));
            context.shrink();
        }
        (score, out)
    }

    /// Sum of per-token scores over a whitespace-split sentence, starting
    /// from an empty history.
    pub fn score_sentence(&self, sentence: &str) -> f64 {
        let mut state = LmState::new();
        let mut total = 0.0;
        for token in sentence.split_whitespace() {
            let (prob, next) = self.score(&state, token);
            total += prob;
            state = next;
        }
        total
    }

    fn context_backoff(&self, context: &LmState) -> f32 {
        match context.len() {
            0 => 0.0,
            1 => self.unigrams.value_at(context.previous[0]).backoff,
            k => self.middle[k - 2]
                .get(&context.previous)
                .map_or(0.0, |entry| entry.backoff),
        }
    }
}

// ============================================================================
// ARPA -> MAP LAYERS
// ============================================================================

struct BuildHandler {
    prefix: PathBuf,
    opts: NgramMapOptions,
    counts: Vec<u64>,
    order: usize,
    observed: u64,
    ids: Vec<u64>,
    unigram_builder: Option<UnigramMapBuilder>,
    unigrams: Option<UnigramMap>,
    middle_builder: Option<MiddleMapBuilder>,
    top_builder: Option<TopMapBuilder>,
}

impl BuildHandler {
    fn layer_dir(&self, order: usize) -> PathBuf {
        self.prefix.join(order.to_string())
    }

    fn is_top(&self, order: usize) -> bool {
        order == self.counts.len() - 1
    }

    /// Finalize the current order's builder and stand up the next one.
    fn finish_order(&mut self) -> Result<()> {
        if self.order == 0 {
            let builder = self.unigram_builder.take().ok_or_else(|| {
                Error::corruption(&self.prefix, "ARPA file listed no unigrams".to_owned())
            })?;
            builder.write()?;
            // the written unigram map resolves ids for every higher order
            self.unigrams = Some(UnigramMap::open(self.layer_dir(0))?);

            if self.counts.len() > 1 {
                let opts = self.opts.layer(self.layer_dir(1), self.counts[1]);
                if self.is_top(1) {
                    self.top_builder = Some(TopMapBuilder::new(opts)?);
                } else {
                    self.middle_builder = Some(MiddleMapBuilder::new(opts)?);
                }
            }
        } else if !self.is_top(self.order) {
            let builder = self.middle_builder.take().ok_or_else(|| {
                Error::corruption(&self.prefix, "middle order builder missing".to_owned())
            })?;
            builder.write()?;

            let next = self.order + 1;
            let opts = self.opts.layer(self.layer_dir(next), self.counts[next]);
            if self.is_top(next) {
                self.top_builder = Some(TopMapBuilder::new(opts)?);
            } else {
                self.middle_builder = Some(MiddleMapBuilder::new(opts)?);
            }
        } else {
            let builder = self.top_builder.take().ok_or_else(|| {
                Error::corruption(&self.prefix, "top order builder missing".to_owned())
            })?;
            builder.write()?;
        }
        self.observed = 0;
        Ok(())
    }
}

impl ArpaHandler for BuildHandler {
    fn count(&mut self, count: u64) -> Result<()> {
        self.counts.push(count);
        if self.counts.len() == 1 {
            let opts = self.opts.layer(self.layer_dir(0), count);
            self.unigram_builder = Some(UnigramMapBuilder::new(opts)?);
        }
        Ok(())
    }

    fn ngram(&mut self, order: usize, ngram: &str, prob: f32, backoff: f32) -> Result<()> {
        if order > self.order {
            self.finish_order()?;
            self.order = order;
        }

        self.observed += 1;
        if order >= self.counts.len() || self.observed > self.counts[order] {
            return Err(Error::corruption(
                &self.prefix,
                format!("too many {}-grams in ARPA input", order + 1),
            ));
        }

        if order == 0 {
            let builder = self.unigram_builder.as_mut().ok_or_else(|| {
                Error::corruption(&self.prefix, "unigram builder missing".to_owned())
            })?;
            builder.insert(ngram, ProbBackoff { prob, backoff })?;
            return Ok(());
        }

        let unigrams = self.unigrams.as_ref().ok_or_else(|| {
            Error::corruption(&self.prefix, "unigram map not yet written".to_owned())
        })?;
        self.ids.clear();
        for token in ngram.split_whitespace() {
            match unigrams.index(token) {
                Some(id) => self.ids.push(id),
                None => {
                    return Err(Error::corruption(
                        &self.prefix,
                        format!("ngram {:?} contains unknown unigram {:?}", ngram, token),
                    ))
                }
            }
        }
        if self.ids.len() != order + 1 {
            return Err(Error::corruption(
                &self.prefix,
                format!(
                    "{:?} has {} tokens but sits in the {}-gram section",
                    ngram,
                    self.ids.len(),
                    order + 1
                ),
            ));
        }

        if self.is_top(order) {
            let builder = self.top_builder.as_mut().ok_or_else(|| {
                Error::corruption(&self.prefix, "top order builder missing".to_owned())
            })?;
            builder.insert(self.ids.as_slice(), prob)?;
        } else {
            let builder = self.middle_builder.as_mut().ok_or_else(|| {
                Error::corruption(&self.prefix, "middle order builder missing".to_owned())
            })?;
            builder.insert(self.ids.as_slice(), ProbBackoff { prob, backoff })?;
        }
        Ok(())
    }
}
