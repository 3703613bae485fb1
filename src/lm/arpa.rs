// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Streaming reader for ARPA-format language model files.
//!
//! The header announces per-order n-gram counts (`ngram 1=4981`), then each
//! `\N-grams:` section lists `log10_prob \t ngram \t log10_backoff` lines,
//! back-off omitted on the highest order and on final-position grams.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// Callbacks driven while an ARPA file streams by.
pub trait ArpaHandler {
    /// Called once per `ngram N=count` header line, in order.
    fn count(&mut self, count: u64) -> Result<()>;

    /// Called for every n-gram line. `order` is 0-based (unigrams are 0).
    fn ngram(&mut self, order: usize, ngram: &str, prob: f32, backoff: f32) -> Result<()>;
}

/// Stream `path` through `handler`.
pub fn read_arpa<H: ArpaHandler>(path: impl AsRef<Path>, handler: &mut H) -> Result<()> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    // header: collect counts until the unigram section starts
    for line in lines.by_ref() {
        let line = line.map_err(|e| Error::io(path, e))?;
        if let Some(rest) = line.strip_prefix("ngram ") {
            let count = rest
                .split_once('=')
                .and_then(|(_, count)| count.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    Error::corruption(path, format!("malformed ngram count line: {:?}", line))
                })?;
            handler.count(count)?;
        }
        if line.starts_with("\\1-grams:") {
            break;
        }
    }

    let mut order = 0usize;
    for line in lines {
        let line = line.map_err(|e| Error::io(path, e))?;
        if line.is_empty() || line.starts_with("\\end\\") {
            continue;
        }
        if line.starts_with('\\') {
            order += 1;
            continue;
        }

        let mut fields = line.split('\t');
        let prob = fields
            .next()
            .and_then(|p| p.trim().parse::<f32>().ok())
            .ok_or_else(|| {
                Error::corruption(path, format!("malformed probability in line {:?}", line))
            })?;
        let ngram = fields.next().ok_or_else(|| {
            Error::corruption(path, format!("missing ngram in line {:?}", line))
        })?;
        let backoff = match fields.next() {
            Some(field) => field.trim().parse::<f32>().map_err(|_| {
                Error::corruption(path, format!("malformed backoff in line {:?}", line))
            })?,
            None => 0.0,
        };
        handler.ngram(order, ngram, prob, backoff)?;
    }
    Ok(())
}
