// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Back-off language models over hashed n-gram maps.
//!
//! An ARPA model becomes one hashed map per order: unigrams keyed by
//! surface string, middle orders keyed by sequences of unigram ids, the top
//! order mapping sequences to a bare probability. A unigram's id is its slot
//! in the unigram map, so ids come for free. Scoring walks the longest
//! matching suffix of the history and charges back-off weights for every
//! context it had to shorten.

pub mod arpa;
pub mod model;
pub mod ngram_map;

use crate::io::disk_vector::FixedWidth;

pub use model::LanguageModel;
pub use ngram_map::NgramMapOptions;

/// Log-probability and back-off weight of one n-gram (base-10 logs, as in
/// ARPA files).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbBackoff {
    pub prob: f32,
    pub backoff: f32,
}

impl FixedWidth for ProbBackoff {
    const WIDTH: usize = 8;

    fn read_from(buf: &[u8]) -> Self {
        Self {
            prob: f32::read_from(buf),
            backoff: f32::read_from(&buf[4..]),
        }
    }

    fn write_to(&self, buf: &mut [u8]) {
        self.prob.write_to(buf);
        self.backoff.write_to(&mut buf[4..]);
    }
}

/// Scoring state: the most recent unigram ids, at most `order - 1` of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LmState {
    pub previous: Vec<u64>,
}

impl LmState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the oldest id from the history.
    pub fn shrink(&mut self) {
        if !self.previous.is_empty() {
            self.previous.remove(0);
        }
    }

    pub fn push(&mut self, id: u64) {
        self.previous.push(id);
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prob_backoff_round_trips() {
        let value = ProbBackoff {
            prob: -1.25,
            backoff: -0.5,
        };
        let mut buf = [0u8; 8];
        value.write_to(&mut buf);
        assert_eq!(ProbBackoff::read_from(&buf), value);
    }

    #[test]
    fn shrink_drops_the_oldest_id() {
        let mut state = LmState {
            previous: vec![3, 7, 9],
        };
        state.shrink();
        assert_eq!(state.previous, vec![7, 9]);
        state.shrink();
        state.shrink();
        state.shrink();
        assert!(state.is_empty());
    }
}
