use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use guessrank_core::model::level_index::{RawLevels, RawTransitions};
use guessrank_core::model::store::build_catalog;
use guessrank_core::model::{Catalog, CheckpointDir, ClassId, Decomposer, Enumerator, Guess, LevelIndex, RankEstimator};
use guessrank_core::{Config, GuessError};

fn levels(entries: &[(u32, &[&str])]) -> RawLevels {
	entries
		.iter()
		.map(|(level, tokens)| (level.to_string(), tokens.iter().map(|t| t.to_string()).collect()))
		.collect()
}

/// Trigram model over {x, y, z}; windows starting with 'z' have no Mid row.
fn trigram_config(checkpoints_dir: &Path) -> Config {
	Config {
		order: 3,
		alphabet: "xyz".to_owned(),
		max_level: 3,
		fallback_level: 1,
		sample_interval: 3,
		level_factor: 2,
		max_length: 5,
		coverage: [(2, 4), (3, 6), (4, 5)].into_iter().collect(),
		checkpoints_dir: checkpoints_dir.to_owned(),
		..Config::default()
	}
}

fn trigram_index(config: &Config) -> LevelIndex {
	let start = levels(&[(0, &["xx", "xy"]), (1, &["yx", ""]), (3, &["zz"])]);
	let mut mid = RawTransitions::new();
	for window in ["xx", "xy", "xz"] {
		mid.insert(window.to_owned(), levels(&[(0, &["x"]), (2, &["y", ""])]));
	}
	for window in ["yx", "yy"] {
		mid.insert(window.to_owned(), levels(&[(1, &[""]), (0, &["z"])]));
	}
	mid.insert("yz".to_owned(), levels(&[(3, &[""])]));
	LevelIndex::from_raw(config, &start, &mid, None).unwrap()
}

fn every_password(alphabet: &[char], length: usize) -> Vec<String> {
	let mut out = vec![String::new()];
	for _ in 0..length {
		out = out
			.into_iter()
			.flat_map(|prefix| alphabet.iter().map(move |c| format!("{prefix}{c}")))
			.collect();
	}
	out
}

#[test]
fn class_sizes_match_brute_force() {
	let scratch = tempfile::tempdir().unwrap();
	let config = trigram_config(scratch.path());
	let index = trigram_index(&config);
	let decomposer = Decomposer::new(&index);

	for length in 2..=4 {
		let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
		for password in every_password(index.alphabet().symbols(), length) {
			let key = decomposer.decompose(&password).unwrap();
			*counts.entry(key.total_level()).or_default() += 1;
		}
		for (level, count) in counts {
			let enumerator = Enumerator::new(&index, ClassId::new(length, level)).unwrap();
			assert_eq!(enumerator.count(), count, "class {length}_{level}");
		}
	}
}

#[test]
fn ranks_are_a_permutation_of_the_indexed_space() {
	let scratch = tempfile::tempdir().unwrap();
	let config = trigram_config(scratch.path());
	let index = Arc::new(trigram_index(&config));
	let catalog = Catalog::from_coverage(&config.coverage);
	let dir = CheckpointDir::new(config.checkpoint_root());
	let totals = build_catalog(Arc::clone(&index), &catalog, config.sample_interval, &dir, config.level_factor).unwrap();
	let indexed: u64 = totals.iter().map(|(_, total)| total).sum();

	let discovered = Catalog::discover(config.checkpoint_root()).unwrap();
	let estimator = RankEstimator::new(&config, &index, &discovered, &dir).unwrap();
	let decomposer = Decomposer::new(&index);

	let mut seen = HashSet::new();
	for length in 2..=4 {
		for password in every_password(index.alphabet().symbols(), length) {
			let class = decomposer.decompose(&password).unwrap().class();
			match estimator.estimate(&password).unwrap() {
				Guess::Exact(rank) => {
					assert!(catalog.contains(class));
					assert!(rank >= 1 && rank <= indexed, "{password} ranked {rank}");
					assert!(seen.insert(rank), "{password} shares rank {rank}");
				}
				Guess::BeyondThreshold { lower_bound } => {
					assert!(!catalog.contains(class));
					assert!(lower_bound <= indexed);
				}
			}
		}
	}
	assert_eq!(seen.len() as u64, indexed);
}

#[test]
fn rejects_bad_input_before_touching_checkpoints() {
	let scratch = tempfile::tempdir().unwrap();
	let config = trigram_config(scratch.path());
	let index = trigram_index(&config);
	let catalog = Catalog::from_coverage(&config.coverage);
	// Nothing was built: any checkpoint access would fail with an I/O error.
	let dir = CheckpointDir::new(config.checkpoint_root());
	let estimator = RankEstimator::new(&config, &index, &catalog, &dir).unwrap();

	assert!(matches!(
		estimator.estimate("xqx"),
		Err(GuessError::InvalidSymbol { symbol: 'q', position: 1 })
	));
	assert!(matches!(estimator.estimate("x"), Err(GuessError::TooShort { length: 1, min: 2 })));
	assert!(matches!(
		estimator.estimate("xxxxx"),
		Err(GuessError::LengthExceeded { length: 5, max: 4 })
	));
}
