use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a model, building checkpoints or ranking a password.
///
/// Every variant is a deterministic data or configuration problem: retrying
/// the same call with the same inputs always fails the same way.
#[derive(Error, Debug)]
pub enum GuessError {
	/// The password holds a character outside the configured alphabet.
	#[error("symbol {symbol:?} at position {position} is not part of the alphabet")]
	InvalidSymbol { symbol: char, position: usize },

	/// The password is longer than the configured or catalogued maximum.
	#[error("password length {length} exceeds the supported maximum of {max}")]
	LengthExceeded { length: usize, max: usize },

	/// The password cannot even fill the initial (k-1)-gram block.
	#[error("password length {length} is shorter than the initial block of {min} symbols")]
	TooShort { length: usize, min: usize },

	/// Level tables, catalog and checkpoints disagree with each other.
	#[error("structural inconsistency: {0}")]
	StructuralInconsistency(String),

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// A level table file is malformed.
	#[error("invalid level index: {0}")]
	InvalidIndex(String),

	#[error("invalid checkpoint {}: {reason}", path.display())]
	InvalidCheckpoint { path: PathBuf, reason: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Postcard(#[from] postcard::Error),
}

pub type Result<T> = std::result::Result<T, GuessError>;
