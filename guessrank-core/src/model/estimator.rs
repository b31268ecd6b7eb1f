use std::fmt;

use log::{debug, info};

use crate::config::Config;
use crate::error::{GuessError, Result};
use super::Level;
use super::catalog::Catalog;
use super::checkpoint::Checkpoint;
use super::component::{ClassId, DecompositionKey};
use super::decomposer::Decomposer;
use super::enumerator::Enumerator;
use super::level_index::LevelIndex;
use super::store::CheckpointSource;

/// Answer to a rank query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guess {
	/// 1-based position of the password in the global guessing order.
	Exact(u64),
	/// The password's class is not indexed; at least `lower_bound` guesses
	/// come before it.
	BeyondThreshold { lower_bound: u64 },
}

impl fmt::Display for Guess {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Guess::Exact(n) => write!(f, "{n}"),
			Guess::BeyondThreshold { lower_bound } => write!(f, "beyond threshold (more than {lower_bound})"),
		}
	}
}

/// Estimates guess numbers from a level index, its catalog and checkpoints.
///
/// All three must come from the same model snapshot and the same sampling
/// interval / level factor, otherwise answers are wrong or the query fails
/// with `StructuralInconsistency`.
pub struct RankEstimator<'a, S> {
	index: &'a LevelIndex,
	catalog: &'a Catalog,
	source: &'a S,
	sample_interval: u64,
	level_factor: Level,
	max_length: usize,
}

impl<'a, S: CheckpointSource> RankEstimator<'a, S> {
	/// # Errors
	/// Returns `InvalidConfig` if the configuration does not pass [`Config::validate`].
	pub fn new(config: &Config, index: &'a LevelIndex, catalog: &'a Catalog, source: &'a S) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			index,
			catalog,
			source,
			sample_interval: config.sample_interval,
			level_factor: config.level_factor,
			max_length: config.max_length,
		})
	}

	/// Computes the guess number of a password.
	///
	/// # Steps
	/// 1. Validates symbols and length, then decomposes the password.
	/// 2. Sums the exact counts of every catalogued class ordered before its class.
	/// 3. Brackets the password between two samples of its class checkpoint.
	/// 4. Resumes enumeration from the lower sample until the password shows up.
	///
	/// # Errors
	/// - `InvalidSymbol` before any table or checkpoint access.
	/// - `TooShort` / `LengthExceeded` for lengths outside the indexed range.
	/// - `StructuralInconsistency` when checkpoints and tables disagree.
	pub fn estimate(&self, password: &str) -> Result<Guess> {
		let symbols = self.index.alphabet().parse(password)?;
		let max = self.catalog.max_length().map_or(self.max_length, |m| m.min(self.max_length));
		if symbols.len() > max {
			return Err(GuessError::LengthExceeded { length: symbols.len(), max });
		}

		let decomposer = Decomposer::new(self.index);
		let key = decomposer.decompose_symbols(&symbols)?;
		let class = key.class();
		debug!("Password class {class}, components {:?}", key.components());

		let mut skipped: u64 = 0;
		for prior in self.catalog.preceding(class, self.level_factor) {
			skipped += self.source.total(prior)?;
		}
		if !self.catalog.contains(class) {
			info!("Class {class} is not indexed, {skipped} passwords come before it");
			return Ok(Guess::BeyondThreshold { lower_bound: skipped });
		}
		info!("Skipped over {skipped} passwords of earlier classes");

		let checkpoint = self.source.checkpoint(class)?;
		self.check_sampling(&checkpoint, class)?;
		let local = self.local_rank(&decomposer, &checkpoint, &key, &symbols)?;
		Ok(Guess::Exact(skipped + local))
	}

	/// 1-based rank of the password within its own class.
	fn local_rank(
		&self,
		decomposer: &Decomposer,
		checkpoint: &Checkpoint,
		key: &DecompositionKey,
		symbols: &[char],
	) -> Result<u64> {
		let below = bracket(decomposer, checkpoint.samples(), key)?;
		let before = below as u64 * self.sample_interval;
		info!("Narrowed search between {} and {}", before, before + self.sample_interval);

		// The resumed walk starts on the bracket sample itself, which is the
		// `before`-th password and must not be counted twice.
		let lower_bound = match below {
			0 => None,
			i => Some(decomposer.decompose(&checkpoint.samples()[i - 1])?),
		};

		let enumerator = Enumerator::new(self.index, key.class())?;
		let consumed = enumerator.position_of(symbols, lower_bound.as_ref()).ok_or_else(|| {
			GuessError::StructuralInconsistency(format!(
				"class {} was exhausted without reaching the password",
				key.class()
			))
		})?;

		Ok(match lower_bound {
			None => consumed,
			Some(_) => before + consumed - 1,
		})
	}

	fn check_sampling(&self, checkpoint: &Checkpoint, class: ClassId) -> Result<()> {
		let expected = checkpoint.total() / self.sample_interval;
		if checkpoint.samples().len() as u64 != expected {
			return Err(GuessError::StructuralInconsistency(format!(
				"checkpoint {class} holds {} samples, expected {expected} for interval {}",
				checkpoint.samples().len(),
				self.sample_interval
			)));
		}
		Ok(())
	}
}

/// Number of samples whose decomposition sorts at or before `key`.
///
/// Samples are in canonical order, so this is a binary search for the
/// first sample strictly after `key`.
pub fn bracket(decomposer: &Decomposer, samples: &[String], key: &DecompositionKey) -> Result<usize> {
	let (mut head, mut tail) = (0, samples.len());
	while head < tail {
		let mid = head + (tail - head) / 2;
		if decomposer.decompose(&samples[mid])? > *key {
			tail = mid;
		} else {
			head = mid + 1;
		}
	}
	Ok(head)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::catalog::Catalog;
	use crate::model::checkpoint::CheckpointBuilder;
	use crate::model::level_index::RawTransitions;
	use crate::model::store::MemoryStore;
	use crate::model::test_support::{random_index, raw, scenario_config, scenario_index};
	use std::cell::Cell;
	use std::ops::ControlFlow;

	fn build_store(index: &LevelIndex, catalog: &Catalog, interval: u64) -> MemoryStore {
		let builder = CheckpointBuilder::new(index, interval).unwrap();
		catalog.ordered(2).into_iter().map(|c| (c, builder.build(c).unwrap())).collect()
	}

	fn passwords(index: &LevelIndex, class: ClassId) -> Vec<String> {
		let mut out = Vec::new();
		Enumerator::new(index, class).unwrap().walk(None, |p| {
			out.push(p.iter().collect());
			ControlFlow::Continue(())
		});
		out
	}

	#[test]
	fn scenario_guess_numbers() {
		let config = scenario_config();
		let index = scenario_index();
		let catalog = Catalog::from_coverage(&config.coverage);
		let store = build_store(&index, &catalog, config.sample_interval);
		let estimator = RankEstimator::new(&config, &index, &catalog, &store).unwrap();

		// Length 1: "a" (level 0), "b" (level 1); then (2,0) = ["aa"], (2,1) = ["ab", "bb"].
		assert_eq!(estimator.estimate("a").unwrap(), Guess::Exact(1));
		assert_eq!(estimator.estimate("b").unwrap(), Guess::Exact(2));
		assert_eq!(estimator.estimate("aa").unwrap(), Guess::Exact(3));
		assert_eq!(estimator.estimate("ab").unwrap(), Guess::Exact(4));
		assert_eq!(estimator.estimate("bb").unwrap(), Guess::Exact(5));
		assert_eq!(estimator.estimate("ba").unwrap(), Guess::Exact(6));
	}

	#[test]
	fn every_password_gets_its_global_position() {
		let index = random_index(3, "abc", 3, 42);
		let config = Config {
			order: 3,
			alphabet: "abc".to_owned(),
			max_level: 3,
			fallback_level: 1,
			level_factor: 2,
			..Config::default()
		};
		let catalog = Catalog::from_coverage(&[(2, 5), (3, 8), (4, 8)].into_iter().collect());

		for interval in [1, 2, 5, 1000] {
			let store = build_store(&index, &catalog, interval);
			let config = Config { sample_interval: interval, ..config.clone() };
			let estimator = RankEstimator::new(&config, &index, &catalog, &store).unwrap();

			let mut expected = 0;
			for class in catalog.ordered(2) {
				for password in passwords(&index, class) {
					expected += 1;
					assert_eq!(estimator.estimate(&password).unwrap(), Guess::Exact(expected), "{password}");
				}
			}
		}
	}

	#[test]
	fn first_and_last_of_a_class() {
		let index = random_index(2, "abcd", 3, 3);
		let config = Config {
			order: 2,
			alphabet: "abcd".to_owned(),
			max_level: 3,
			fallback_level: 1,
			sample_interval: 3,
			..Config::default()
		};
		let catalog = Catalog::from_coverage(&[(3, 10)].into_iter().collect());
		let store = build_store(&index, &catalog, 3);
		let estimator = RankEstimator::new(&config, &index, &catalog, &store).unwrap();

		let mut running = 0;
		for class in catalog.ordered(2) {
			let members = passwords(&index, class);
			let prior = running;
			running += store[&class].total();
			if let (Some(first), Some(last)) = (members.first(), members.last()) {
				assert_eq!(estimator.estimate(first).unwrap(), Guess::Exact(prior + 1));
				assert_eq!(estimator.estimate(last).unwrap(), Guess::Exact(running));
			}
		}
	}

	#[test]
	fn bracket_matches_linear_scan() {
		let index = random_index(3, "abc", 3, 9);
		let decomposer = Decomposer::new(&index);
		let class = ClassId::new(4, 5);
		let all = passwords(&index, class);

		for size in 0..=all.len().min(12) {
			let samples = &all[..size];
			for target in &all {
				let key = decomposer.decompose(target).unwrap();
				let linear = samples.iter().filter(|s| decomposer.decompose(s).unwrap() <= key).count();
				assert_eq!(bracket(&decomposer, samples, &key).unwrap(), linear);
			}
		}
	}

	#[test]
	fn missing_class_reports_lower_bound() {
		let config = scenario_config();
		let index = scenario_index();
		let catalog = Catalog::new([ClassId::new(2, 0), ClassId::new(2, 1)]);
		let store = build_store(&index, &catalog, 1);
		let estimator = RankEstimator::new(&config, &index, &catalog, &store).unwrap();
		assert_eq!(estimator.estimate("ba").unwrap(), Guess::BeyondThreshold { lower_bound: 3 });
	}

	#[test]
	fn rejects_long_passwords() {
		let config = scenario_config();
		let index = scenario_index();
		let catalog = Catalog::from_coverage(&config.coverage);
		let store = build_store(&index, &catalog, 1);
		let estimator = RankEstimator::new(&config, &index, &catalog, &store).unwrap();
		assert!(matches!(
			estimator.estimate("aaa"),
			Err(GuessError::LengthExceeded { length: 3, max: 2 })
		));
	}

	#[test]
	fn sampling_skew_is_inconsistent() {
		let config = scenario_config();
		let index = scenario_index();
		let catalog = Catalog::from_coverage(&config.coverage);
		let store = build_store(&index, &catalog, 2);
		let estimator = RankEstimator::new(&config, &index, &catalog, &store).unwrap();
		assert!(matches!(estimator.estimate("bb"), Err(GuessError::StructuralInconsistency(_))));
	}

	#[test]
	fn foreign_symbol_touches_no_checkpoint() {
		struct Counting(Cell<usize>);
		impl CheckpointSource for Counting {
			fn total(&self, _: ClassId) -> Result<u64> {
				self.0.set(self.0.get() + 1);
				Ok(0)
			}
			fn checkpoint(&self, _: ClassId) -> Result<Checkpoint> {
				self.0.set(self.0.get() + 1);
				Ok(Checkpoint::default())
			}
		}

		let config = scenario_config();
		let index = scenario_index();
		let catalog = Catalog::from_coverage(&config.coverage);
		let source = Counting(Cell::new(0));
		let estimator = RankEstimator::new(&config, &index, &catalog, &source).unwrap();
		assert!(matches!(estimator.estimate("a!b"), Err(GuessError::InvalidSymbol { symbol: '!', position: 1 })));
		assert_eq!(source.0.get(), 0);
	}

	#[test]
	fn rejects_degenerate_config() {
		let index = scenario_index();
		let catalog = Catalog::from_coverage(&scenario_config().coverage);
		let store = build_store(&index, &catalog, 1);

		let config = Config { sample_interval: 0, ..scenario_config() };
		assert!(matches!(
			RankEstimator::new(&config, &index, &catalog, &store),
			Err(GuessError::InvalidConfig(_))
		));
		let config = Config { level_factor: 0, ..scenario_config() };
		assert!(matches!(
			RankEstimator::new(&config, &index, &catalog, &store),
			Err(GuessError::InvalidConfig(_))
		));
	}

	#[test]
	fn unreachable_password_is_inconsistent() {
		// Level 3 exceeds the configured max level 2: the table and the
		// configuration disagree, so the builder never generates "b".
		let config = scenario_config();
		let start = raw(&[("0", &["a"]), ("3", &["b"])]);
		let index = LevelIndex::from_raw(&config, &start, &RawTransitions::new(), None).unwrap();
		let catalog = Catalog::new([ClassId::new(1, 0), ClassId::new(1, 3)]);
		let store = build_store(&index, &catalog, 1);
		let estimator = RankEstimator::new(&config, &index, &catalog, &store).unwrap();
		assert_eq!(estimator.estimate("a").unwrap(), Guess::Exact(1));
		assert!(matches!(estimator.estimate("b"), Err(GuessError::StructuralInconsistency(_))));
	}
}
