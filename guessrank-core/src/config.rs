use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GuessError, Result};
use crate::model::Level;

/// Symbols of the deployed model: digits, then lowercase, then uppercase letters.
pub const DEFAULT_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Scaling constants of the discretization calibrated for k=3 with additive smoothing.
pub const DEFAULT_SCALING: (f64, f64) = (1.11439835558, 4.53959983946e-05);

/// Smoothing mode of the underlying Markov model.
///
/// Only used to name files: the engine itself does not care how the
/// probabilities were smoothed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Smoothing {
	None,
	Additive,
}

impl fmt::Display for Smoothing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Smoothing::None => write!(f, "none"),
			Smoothing::Additive => write!(f, "additive"),
		}
	}
}

/// Level assigned to every next symbol of a window the model never saw.
///
/// The discretizer maps a probability `p` to `-round(ln(c1 * p + c2))`; an
/// unseen window falls back to the uniform probability `1 / alphabet_size`.
pub fn fallback_level(c1: f64, c2: f64, alphabet_size: usize) -> Level {
	let scaled = (c1 / alphabet_size as f64 + c2).ln();
	(-scaled.round()).max(0.0) as Level
}

/// Deployment parameters shared by the checkpoint builder and the rank estimator.
///
/// # Invariants
/// - Building and querying must use the same values for every field but the
///   directories, otherwise prefix sums and brackets are meaningless.
/// - `fallback_level <= max_level`, so that `max_level` bounds every position cost.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
	/// Order `k` of the Markov model (grams have `k - 1` symbols).
	pub order: usize,

	pub smoothing: Smoothing,

	/// Ordered symbols a password may contain.
	pub alphabet: String,

	/// Per-position level cap.
	pub max_level: Level,

	/// Level of any symbol following a window absent from the Mid table.
	pub fallback_level: Level,

	/// Every `sample_interval`-th enumerated password is kept in a checkpoint.
	pub sample_interval: u64,

	/// Divisor β turning a total level into complexity units.
	pub level_factor: Level,

	pub max_length: usize,

	/// Length → exclusive upper bound of the catalogued total levels.
	pub coverage: BTreeMap<usize, Level>,

	pub levels_dir: PathBuf,

	pub checkpoints_dir: PathBuf,
}

impl Default for Config {
	fn default() -> Self {
		let (c1, c2) = DEFAULT_SCALING;
		let coverage = [(4, 33), (5, 35), (6, 33), (7, 28), (8, 25), (9, 23), (10, 22), (11, 21), (12, 21)]
			.into_iter()
			.collect();

		Self {
			order: 3,
			smoothing: Smoothing::Additive,
			alphabet: DEFAULT_ALPHABET.to_owned(),
			max_level: 10,
			fallback_level: fallback_level(c1, c2, DEFAULT_ALPHABET.chars().count()),
			sample_interval: 10_000,
			level_factor: 2,
			max_length: 12,
			coverage,
			levels_dir: PathBuf::from("data/levels"),
			checkpoints_dir: PathBuf::from("data/cps"),
		}
	}
}

impl Config {
	/// Reads a JSON configuration file. Missing fields take their default value.
	///
	/// # Errors
	/// Returns an error if the file cannot be read or parsed, or if the
	/// resulting configuration does not pass [`Config::validate`].
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let contents = std::fs::read_to_string(path)?;
		let config: Config = serde_json::from_str(&contents)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks the cross-field constraints the engine relies on.
	pub fn validate(&self) -> Result<()> {
		if self.order < 2 {
			return Err(GuessError::InvalidConfig("order must be >= 2".to_owned()));
		}
		if self.alphabet.is_empty() {
			return Err(GuessError::InvalidConfig("alphabet is empty".to_owned()));
		}
		let mut seen = HashSet::new();
		if let Some(c) = self.alphabet.chars().find(|c| !seen.insert(*c)) {
			return Err(GuessError::InvalidConfig(format!("alphabet lists {c:?} twice")));
		}
		if self.sample_interval == 0 {
			return Err(GuessError::InvalidConfig("sample interval must be positive".to_owned()));
		}
		if self.level_factor == 0 {
			return Err(GuessError::InvalidConfig("level factor must be positive".to_owned()));
		}
		if self.fallback_level > self.max_level {
			return Err(GuessError::InvalidConfig(format!(
				"fallback level {} exceeds max level {}",
				self.fallback_level, self.max_level
			)));
		}
		if self.max_length < self.order - 1 {
			return Err(GuessError::InvalidConfig(format!(
				"max length {} cannot hold the initial block of {} symbols",
				self.max_length,
				self.order - 1
			)));
		}
		Ok(())
	}

	/// Directory holding the checkpoints of this model identity.
	pub fn checkpoint_root(&self) -> PathBuf {
		self.checkpoints_dir.join(format!("{}_{}", self.order, self.smoothing))
	}
}
