//! Language model build and back-off scoring against hand-computed
//! references.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use stele::lm::{LanguageModel, LmState, NgramMapOptions};

const TOY_ARPA: &str = "\\data\\
ngram 1=4
ngram 2=3
ngram 3=2

\\1-grams:
-1.0\t<unk>
-0.5\ta\t-0.4
-0.7\tb\t-0.3
-0.9\tc\t-0.2

\\2-grams:
-0.3\ta b\t-0.1
-0.4\tb c\t-0.15
-0.6\tc a

\\3-grams:
-0.2\ta b c
-0.5\tb c a

\\end\\
";

fn build_toy(dir: &Path) -> LanguageModel {
    let arpa = dir.join("toy.arpa");
    let mut file = File::create(&arpa).unwrap();
    file.write_all(TOY_ARPA.as_bytes()).unwrap();
    drop(file);

    let prefix = dir.join("lm-bin");
    let order =
        LanguageModel::build_from_arpa(&arpa, &prefix, &NgramMapOptions::default()).unwrap();
    assert_eq!(order, 3);
    LanguageModel::open(&prefix).unwrap()
}

#[test]
fn model_reports_order_and_vocabulary() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_toy(dir.path());
    assert_eq!(model.order(), 3);
    assert_eq!(model.vocab_size(), 4);
}

#[test]
fn unigram_scores_from_an_empty_history() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_toy(dir.path());

    let (prob, state) = model.score(&LmState::new(), "a");
    assert!((prob - (-0.5)).abs() < 1e-6);
    assert_eq!(state.len(), 1);

    // out-of-vocabulary tokens resolve to <unk>
    let (prob, _) = model.score(&LmState::new(), "zebra");
    assert!((prob - (-1.0)).abs() < 1e-6);
}

#[test]
fn longest_suffix_wins_and_state_tracks_it() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_toy(dir.path());

    // "a" then "b": the bigram (a b) matches, no back-off
    let (_, after_a) = model.score(&LmState::new(), "a");
    let (prob_b, after_ab) = model.score(&after_a, "b");
    assert!((prob_b - (-0.3)).abs() < 1e-6);
    assert_eq!(after_ab.len(), 2);

    // "c" completes the stored trigram (a b c); the state shrinks to the
    // last order-1 ids
    let (prob_c, after_abc) = model.score(&after_ab, "c");
    assert!((prob_c - (-0.2)).abs() < 1e-6);
    assert_eq!(after_abc.len(), 2);
}

#[test]
fn backoff_weights_charge_for_shortened_contexts() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_toy(dir.path());

    // after "c", scoring "c": no (c c) bigram exists, so
    // p(c|c) = b(c) + p(c) = -0.2 + -0.9 = -1.1
    let (_, after_c) = model.score(&LmState::new(), "c");
    let (prob, state) = model.score(&after_c, "c");
    assert!((prob - (-1.1)).abs() < 1e-6, "got {}", prob);
    assert_eq!(state.len(), 1);
}

#[test]
fn trigram_miss_backs_off_through_the_bigram() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_toy(dir.path());

    // history [c a], token "b": no (c a b) trigram, but (a b) exists;
    // charge the (c a) back-off (absent in the file, hence 0):
    // p(b|c a) = b(c a) + p(b|a) = 0 + -0.3
    let (_, after_c) = model.score(&LmState::new(), "c");
    let (_, after_ca) = model.score(&after_c, "a");
    assert_eq!(after_ca.previous.len(), 2);

    let (prob, state) = model.score(&after_ca, "b");
    assert!((prob - (-0.3)).abs() < 1e-6, "got {}", prob);
    assert_eq!(state.len(), 2); // matched suffix (a b)
}

#[test]
fn sentence_score_sums_per_token_scores() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_toy(dir.path());

    // hand computation:
    //   p(a)       = -0.5
    //   p(b|a)     = -0.3          (bigram a b)
    //   p(c|a b)   = -0.2          (trigram a b c)
    //   p(a|b c)   = -0.5          (trigram b c a)
    //   p(b|c a)   = 0 + -0.3     (backoff through c a to bigram a b)
    let total = model.score_sentence("a b c a b");
    assert!((total - (-1.8)).abs() < 1e-6, "got {}", total);

    let simple = model.score_sentence("a b c");
    assert!((simple - (-1.0)).abs() < 1e-6, "got {}", simple);
}

#[test]
fn rebuild_into_existing_prefix_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let model = build_toy(dir.path());
    drop(model);

    let arpa = dir.path().join("toy.arpa");
    let err = LanguageModel::build_from_arpa(
        &arpa,
        dir.path().join("lm-bin"),
        &NgramMapOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, stele::Error::Io { .. }));
}
