// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stele CLI: build, inspect, and query on-disk indexes.
//!
//! ```bash
//! # Build an inverted index (plus forward index when `uninvert = true`)
//! stele index --config config.toml
//!
//! # Ranked search over an existing index
//! stele search --config config.toml --query "succinct rank select" --top-k 10
//!
//! # Corpus and vocabulary statistics
//! stele stats --config config.toml
//!
//! # Build a language model from an ARPA file and score a sentence
//! stele lm --arpa model.arpa --prefix ./lm-bin --sentence "a b c"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stele::config::IndexConfig;
use stele::corpus::{LineCorpus, WhitespaceAnalyzer};
use stele::error::Error;
use stele::index::{ForwardIndex, InvertedIndex};
use stele::lm::{LanguageModel, NgramMapOptions};
use stele::ranking::{score_query, QueryOptions, RankerRegistry};
use stele::types::TermId;

#[derive(Parser)]
#[command(name = "stele", version, about = "Text indexing and retrieval toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from the configured corpus.
    Index {
        #[arg(long)]
        config: PathBuf,
    },
    /// Run a ranked query against an existing index.
    Search {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        query: String,
        /// Ranker method; overrides the config's `[ranker]` section.
        #[arg(long)]
        ranker: Option<String>,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Print corpus and vocabulary statistics for an index.
    Stats {
        #[arg(long)]
        config: PathBuf,
    },
    /// Build (if needed) a language model from an ARPA file and score a
    /// sentence with it.
    Lm {
        #[arg(long)]
        arpa: PathBuf,
        /// Directory for the binary model files.
        #[arg(long)]
        prefix: PathBuf,
        #[arg(long)]
        sentence: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 1 = misuse, 2 = I/O failure, 3 = corruption detected at open.
fn exit_code(err: &Error) -> u8 {
    match err {
        Error::Misuse { .. } => 1,
        Error::Io { .. } | Error::BadFileSize { .. } => 2,
        Error::Corruption { .. } | Error::VocabularyCorruption { .. } => 3,
        _ => 1,
    }
}

fn run(cli: Cli) -> stele::Result<()> {
    match cli.command {
        Commands::Index { config } => {
            let config = IndexConfig::from_file(config)?;
            let corpus = LineCorpus::open(config.corpus_file(), &config.dataset)?;
            let index = InvertedIndex::build(&config, corpus, &WhitespaceAnalyzer, None)?;
            println!(
                "indexed {} documents, {} terms -> {}",
                index.num_docs(),
                index.num_terms(),
                index.dir().display()
            );
            Ok(())
        }
        Commands::Search {
            config,
            query,
            ranker,
            top_k,
        } => {
            let config = IndexConfig::from_file(config)?;
            let index = InvertedIndex::open(config.index_dir())?;

            let empty = toml::Table::new();
            let params = config.ranker.as_ref().unwrap_or(&empty);
            let method = ranker
                .as_deref()
                .or_else(|| params.get("method").and_then(|v| v.as_str()))
                .unwrap_or("bm25");
            let scorer = RankerRegistry::with_defaults().create(method, params)?;

            let terms: Vec<(String, f64)> = query
                .split_whitespace()
                .map(|term| (term.to_owned(), 1.0))
                .collect();
            let results = score_query(&index, &*scorer, &terms, top_k, QueryOptions::default())?;

            for (rank, result) in results.iter().enumerate() {
                let name = index
                    .doc_name(result.doc_id)?
                    .unwrap_or_else(|| format!("doc-{}", result.doc_id.get()));
                println!("{:>3}. {:<40} {:.4}", rank + 1, name, result.score);
            }
            Ok(())
        }
        Commands::Stats { config } => {
            let config = IndexConfig::from_file(config)?;
            let index = InvertedIndex::open(config.index_dir())?;
            println!("documents:      {}", index.num_docs());
            println!("vocabulary:     {}", index.num_terms());
            println!("corpus terms:   {}", index.total_corpus_terms());
            println!("avg doc length: {:.2}", index.avg_doc_length());

            // spot-check the heaviest terms when the index is small enough
            // to scan
            if index.num_terms() <= 1_000_000 {
                let mut heaviest: Option<(TermId, u64)> = None;
                for term in 0..index.num_terms() {
                    let count = index.corpus_count(TermId(term));
                    if heaviest.map_or(true, |(_, best)| count > best) {
                        heaviest = Some((TermId(term), count));
                    }
                }
                if let Some((term, count)) = heaviest {
                    let surface = index
                        .term_string(term)?
                        .unwrap_or_else(|| format!("term-{}", term.get()));
                    println!("heaviest term:  {:?} ({} occurrences)", surface, count);
                }
            }

            if config.uninvert {
                let forward = ForwardIndex::open(config.index_dir())?;
                println!("forward index:  {} documents", forward.num_docs());
            }
            Ok(())
        }
        Commands::Lm {
            arpa,
            prefix,
            sentence,
        } => {
            if !prefix.exists() {
                LanguageModel::build_from_arpa(&arpa, &prefix, &NgramMapOptions::default())?;
            }
            let model = LanguageModel::open(&prefix)?;
            let total = model.score_sentence(&sentence);
            println!(
                "order-{} model, {} unigrams: log10 p = {:.4}",
                model.order(),
                model.vocab_size(),
                total
            );
            Ok(())
        }
    }
}
