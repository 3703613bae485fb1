//! Minimal perfect hash and hashed-map behavior.

use std::collections::HashSet;

use stele::hashing::{
    PerfectHash, PerfectHashBuilder, PerfectHashMap, PerfectHashMapBuilder,
    PerfectHashMapOptions, PerfectHashOptions,
};

fn build_hash(dir: &std::path::Path, keys: &[&str], load_factor: f64) -> PerfectHash {
    let mut opts = PerfectHashOptions::new(dir, keys.len() as u64);
    opts.load_factor = load_factor;
    let mut builder = PerfectHashBuilder::new(opts).unwrap();
    for key in keys {
        builder.insert(*key).unwrap();
    }
    builder.write().unwrap();
    PerfectHash::open(dir).unwrap()
}

#[test]
fn five_keys_hash_to_a_bijection() {
    let dir = tempfile::tempdir().unwrap();
    let keys = ["alpha", "beta", "gamma", "delta", "epsilon"];
    let hash = build_hash(dir.path(), &keys, 0.95);

    assert_eq!(hash.len(), 5);
    let image: HashSet<u64> = keys.iter().map(|k| hash.hash(*k)).collect();
    assert_eq!(image, (0..5).collect::<HashSet<u64>>());

    // unknown keys still land inside [0, 5)
    assert!(hash.hash("zeta") < 5);
}

#[test]
fn large_string_key_set_is_a_bijection() {
    let dir = tempfile::tempdir().unwrap();
    let keys: Vec<String> = (0..2500).map(|i| format!("term-{:05}", i * 7)).collect();
    let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let hash = build_hash(dir.path(), &refs, 0.99);

    let mut seen = vec![false; keys.len()];
    for key in &keys {
        let idx = hash.hash(key.as_str()) as usize;
        assert!(idx < keys.len());
        assert!(!seen[idx], "collision at {}", idx);
        seen[idx] = true;
    }
    assert!(seen.iter().all(|&hit| hit));
}

#[test]
fn single_key_hashes_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    let hash = build_hash(dir.path(), &["only"], 0.99);
    assert_eq!(hash.len(), 1);
    assert_eq!(hash.hash("only"), 0);
    // even unknown keys reduce to the single slot
    assert_eq!(hash.hash("other"), 0);
}

#[test]
fn map_returns_enrolled_values_and_rejects_strangers() {
    let dir = tempfile::tempdir().unwrap();
    let keys = ["alpha", "beta", "gamma", "delta", "epsilon"];
    let values = [10u64, 20, 30, 40, 50];

    let mut opts = PerfectHashMapOptions::new(dir.path(), keys.len() as u64);
    opts.hash.load_factor = 0.95;
    let mut builder = PerfectHashMapBuilder::<u64>::new(opts).unwrap();
    for (key, value) in keys.iter().zip(values) {
        builder.insert(*key, value).unwrap();
    }
    builder.write().unwrap();

    let map: PerfectHashMap<u64> = PerfectHashMap::open(dir.path()).unwrap();
    assert_eq!(map.len(), 5);
    for (key, value) in keys.iter().zip(values) {
        assert_eq!(map.get(*key), Some(value), "lookup of {:?}", key);
    }

    // a fingerprint mismatch answers None; a 32-bit fingerprint makes a
    // false positive across a handful of probes vanishingly unlikely
    for stranger in ["zeta", "eta", "theta", "iota", "kappa"] {
        assert_eq!(map.get(stranger), None, "stranger {:?}", stranger);
    }
}

#[test]
fn map_over_id_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let keys: Vec<Vec<u64>> = vec![
        vec![1, 2, 3],
        vec![4, 5, 6],
        vec![1_489_237, 1_930_481_390, 1_394_483],
        vec![7, 839, 2019],
        vec![1129, 219, 1],
    ];

    let opts = PerfectHashMapOptions::new(dir.path(), keys.len() as u64);
    let mut builder = PerfectHashMapBuilder::<u64>::new(opts).unwrap();
    for (i, key) in keys.iter().enumerate() {
        builder.insert(key, i as u64 * 100).unwrap();
    }
    builder.write().unwrap();

    let map: PerfectHashMap<u64> = PerfectHashMap::open(dir.path()).unwrap();
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(map.get(key), Some(i as u64 * 100));
    }
    assert_eq!(map.get(&vec![3u64, 2, 1]), None);
}

#[test]
fn value_at_bypasses_the_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let keys = ["a", "b", "c"];
    let mut builder =
        PerfectHashMapBuilder::<u64>::new(PerfectHashMapOptions::new(dir.path(), 3)).unwrap();
    for (i, key) in keys.iter().enumerate() {
        builder.insert(*key, i as u64).unwrap();
    }
    builder.write().unwrap();

    let map: PerfectHashMap<u64> = PerfectHashMap::open(dir.path()).unwrap();
    for key in keys {
        let (idx, value) = map.index_and_value(key).unwrap();
        assert_eq!(map.value_at(idx), value);
    }
}

#[test]
fn spilled_build_matches_in_memory_build() {
    // a tiny RAM budget forces multiple chunks through the external sort
    let dir = tempfile::tempdir().unwrap();
    let keys: Vec<String> = (0..800).map(|i| format!("key-{}", i)).collect();

    let mut opts = PerfectHashOptions::new(dir.path(), keys.len() as u64);
    opts.max_ram = 256; // 16 records per chunk
    let mut builder = PerfectHashBuilder::new(opts).unwrap();
    for key in &keys {
        builder.insert(key.as_str()).unwrap();
    }
    builder.write().unwrap();

    let hash = PerfectHash::open(dir.path()).unwrap();
    let image: HashSet<u64> = keys.iter().map(|k| hash.hash(k.as_str())).collect();
    assert_eq!(image.len(), keys.len());
}
