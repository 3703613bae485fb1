// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! The analyzer interface the index builder consumes.
//!
//! An analyzer reduces document text to a feature map of term counts. The
//! map is ordered so that term interning is deterministic: building the same
//! corpus twice assigns the same term ids.

use std::collections::BTreeMap;

/// Turns document text into a bag of term counts.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, content: &str) -> BTreeMap<String, u64>;
}

/// Splits on ASCII/Unicode whitespace, no normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceAnalyzer;

impl Analyzer for WhitespaceAnalyzer {
    fn analyze(&self, content: &str) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for token in content.split_whitespace() {
            *counts.entry(token.to_owned()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_repeated_tokens() {
        let counts = WhitespaceAnalyzer.analyze("a b b c");
        assert_eq!(counts.len(), 3);
        assert_eq!(counts["a"], 1);
        assert_eq!(counts["b"], 2);
        assert_eq!(counts["c"], 1);
    }

    #[test]
    fn empty_text_has_no_features() {
        assert!(WhitespaceAnalyzer.analyze("   \t\n").is_empty());
    }
}
