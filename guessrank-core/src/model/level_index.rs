use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{GuessError, Result};
use crate::io::read_json;
use super::Level;
use super::alphabet::Alphabet;

/// Level table as written by the discretizer: level (as a string key) to
/// the ordered list of tokens at that level, `""` standing for the wildcard.
pub type RawLevels = BTreeMap<String, Vec<String>>;

/// Transition table as written by the discretizer: gram to its [`RawLevels`].
pub type RawTransitions = BTreeMap<String, RawLevels>;

/// Token of the file format standing for "anything not listed".
const RAW_WILDCARD: &str = "";

/// A concrete gram or symbol together with its alphabet code.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Token {
	symbols: Vec<char>,
	code: u64,
}

impl Token {
	fn new(symbols: Vec<char>, alphabet: &Alphabet) -> Result<Self> {
		let code = alphabet.encode(&symbols)?;
		Ok(Self { symbols, code })
	}

	pub fn symbols(&self) -> &[char] {
		&self.symbols
	}

	pub fn code(&self) -> u64 {
		self.code
	}
}

/// Entry of a level list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Entry {
	Token(Token),
	/// Every token of the table's width that the table does not list anywhere.
	Wildcard,
}

/// Where a token sits in a table: its level and its rank within that level.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
	pub level: Level,
	pub rank: usize,
}

/// Typed level → ordered entries table with the lookups derived from it.
///
/// Used both for the Start table (tokens of `k - 1` symbols) and for each
/// Mid row (single-symbol tokens).
///
/// # Invariants
/// - A token is listed at most once across all levels.
/// - At most one level holds a wildcard entry, at most once.
/// - `unlisted` is the alphabet-ordered complement of the listed tokens when
///   a wildcard exists, empty otherwise.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LevelTable {
	levels: BTreeMap<Level, Vec<Entry>>,
	positions: HashMap<Vec<char>, Slot>,
	wildcard: Option<Slot>,
	unlisted: Vec<Token>,
}

impl LevelTable {
	/// Converts a raw table, validating every token against the alphabet.
	///
	/// `width` is the number of symbols each token must have; `name` only
	/// feeds error messages.
	fn from_raw(raw: &RawLevels, width: usize, alphabet: &Alphabet, name: &str) -> Result<Self> {
		let mut table = Self {
			levels: BTreeMap::new(),
			positions: HashMap::new(),
			wildcard: None,
			unlisted: Vec::new(),
		};

		let mut seen = Vec::with_capacity(raw.len());
		for (key, tokens) in raw {
			let level: Level = key
				.trim()
				.parse()
				.map_err(|_| GuessError::InvalidIndex(format!("{name}: level {key:?} is not an integer")))?;
			if seen.contains(&level) {
				return Err(GuessError::InvalidIndex(format!("{name}: level {level} is listed twice")));
			}
			seen.push(level);
			let mut entries = Vec::with_capacity(tokens.len());

			for (rank, token) in tokens.iter().enumerate() {
				let slot = Slot { level, rank };
				if token == RAW_WILDCARD {
					if table.wildcard.replace(slot).is_some() {
						return Err(GuessError::InvalidIndex(format!("{name}: more than one wildcard")));
					}
					entries.push(Entry::Wildcard);
					continue;
				}

				let symbols: Vec<char> = token.chars().collect();
				if symbols.len() != width {
					return Err(GuessError::InvalidIndex(format!(
						"{name}: token {token:?} should have {width} symbols"
					)));
				}
				let token = Token::new(symbols, alphabet).map_err(|_| {
					GuessError::InvalidIndex(format!("{name}: token {token:?} is not made of alphabet symbols"))
				})?;
				if table.positions.insert(token.symbols.clone(), slot).is_some() {
					return Err(GuessError::InvalidIndex(format!(
						"{name}: token {:?} is listed twice",
						token.symbols.iter().collect::<String>()
					)));
				}
				entries.push(Entry::Token(token));
			}

			// Keep empty level lists out: they would only cost lookups.
			if !entries.is_empty() {
				table.levels.insert(level, entries);
			}
		}

		if table.wildcard.is_some() {
			table.unlisted = table.complement(width, alphabet)?;
		}
		Ok(table)
	}

	/// Every token of `width` symbols not listed in the table, in alphabet order.
	fn complement(&self, width: usize, alphabet: &Alphabet) -> Result<Vec<Token>> {
		let total = alphabet
			.combinations(width)
			.ok_or_else(|| GuessError::InvalidConfig(format!("{width}-symbol grams cannot be enumerated")))?;

		let mut unlisted = Vec::new();
		for code in 0..total {
			let symbols = alphabet.decode(code, width);
			if !self.positions.contains_key(&symbols) {
				unlisted.push(Token { symbols, code });
			}
		}
		Ok(unlisted)
	}

	/// Levels from 0 up to `cap` (inclusive) that hold entries, ascending.
	pub fn levels_up_to(&self, cap: Level) -> impl Iterator<Item = (Level, &[Entry])> {
		self.levels.range(..=cap).map(|(level, entries)| (*level, entries.as_slice()))
	}

	/// Slot of a token: its own slot if listed, else the wildcard's.
	pub fn locate(&self, token: &[char]) -> Option<Slot> {
		self.positions.get(token).copied().or(self.wildcard)
	}

	pub fn wildcard(&self) -> Option<Slot> {
		self.wildcard
	}

	/// Tokens covered by the wildcard entry.
	pub fn unlisted(&self) -> &[Token] {
		&self.unlisted
	}

	/// Number of explicitly listed tokens.
	pub fn listed(&self) -> usize {
		self.positions.len()
	}
}

/// Discretized Markov model: the Start, Mid and End level tables of one
/// `(k, smoothing)` model identity, plus the scoring constants the
/// enumeration depends on.
///
/// Immutable once built; share it by reference (or `Arc`) across queries.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LevelIndex {
	order: usize,
	alphabet: Alphabet,
	max_level: Level,
	fallback_level: Level,
	start: LevelTable,
	mid: HashMap<Vec<char>, LevelTable>,
	/// Kept for model symmetry; never consulted by enumeration or ranking.
	end: Option<RawLevels>,
}

impl LevelIndex {
	/// Builds an index from tables in the file format.
	///
	/// # Errors
	/// Returns an error if the configuration is invalid or a table is malformed.
	pub fn from_raw(config: &Config, start: &RawLevels, mid: &RawTransitions, end: Option<RawLevels>) -> Result<Self> {
		config.validate()?;
		let alphabet = Alphabet::new(&config.alphabet)?;
		let width = config.order - 1;

		let start = LevelTable::from_raw(start, width, &alphabet, "start")?;

		let mut rows = HashMap::with_capacity(mid.len());
		for (gram, raw) in mid {
			let window: Vec<char> = gram.chars().collect();
			if window.len() != width || alphabet.encode(&window).is_err() {
				return Err(GuessError::InvalidIndex(format!("mid: {gram:?} is not a {width}-symbol gram")));
			}
			let row = LevelTable::from_raw(raw, 1, &alphabet, &format!("mid[{gram}]"))?;
			rows.insert(window, row);
		}

		Ok(Self {
			order: config.order,
			alphabet,
			max_level: config.max_level,
			fallback_level: config.fallback_level,
			start,
			mid: rows,
			end,
		})
	}

	/// Loads the index of the configured model identity.
	///
	/// - Reuses the postcard cache `{k}_{smoothing}.bin` when it was built for
	///   the same alphabet, order and levels, and no level file is newer.
	/// - Otherwise reads the JSON tables and refreshes the cache.
	pub fn load(config: &Config) -> Result<Self> {
		config.validate()?;
		let cache_path = Self::cache_path(config);

		if cache_path.exists() {
			if Self::cache_is_fresh(config, &cache_path) {
				let bytes = std::fs::read(&cache_path)?;
				match postcard::from_bytes::<LevelIndex>(&bytes) {
					Ok(index) if index.matches(config) => {
						debug!("Loaded level index from {}", cache_path.display());
						return Ok(index);
					}
					Ok(_) => warn!("Level cache {} was built for another configuration, rebuilding", cache_path.display()),
					Err(e) => warn!("Level cache {} is unreadable ({e}), rebuilding", cache_path.display()),
				}
			} else {
				warn!("Level cache {} is older than its level tables, rebuilding", cache_path.display());
			}
		}

		let index = Self::read_level_files(config)?;
		match postcard::to_stdvec(&index) {
			Ok(bytes) => {
				if let Err(e) = std::fs::write(&cache_path, bytes) {
					warn!("Cannot write level cache {}: {e}", cache_path.display());
				}
			}
			Err(e) => warn!("Cannot serialize level cache: {e}"),
		}
		Ok(index)
	}

	fn read_level_files(config: &Config) -> Result<Self> {
		let start: RawLevels = read_json(Self::table_path(config, "start"))?;
		let mid: RawTransitions = read_json(Self::table_path(config, "mid"))?;
		let end_path = Self::table_path(config, "end");
		let end: Option<RawLevels> = if end_path.exists() { Some(read_json(end_path)?) } else { None };

		let index = Self::from_raw(config, &start, &mid, end)?;
		info!(
			"Loaded {}-gram level index ({} start grams, {} mid rows)",
			config.order,
			index.start.listed(),
			index.mid.len()
		);
		Ok(index)
	}

	fn table_path(config: &Config, part: &str) -> PathBuf {
		config.levels_dir.join(format!("{}_{}_{}.json", config.order, config.smoothing, part))
	}

	fn cache_path(config: &Config) -> PathBuf {
		config.levels_dir.join(format!("{}_{}.bin", config.order, config.smoothing))
	}

	/// `false` when a level file was modified after the cache was written.
	///
	/// Missing level files do not count: a lone cache stays usable.
	fn cache_is_fresh(config: &Config, cache_path: &Path) -> bool {
		let Ok(cached_at) = std::fs::metadata(cache_path).and_then(|m| m.modified()) else {
			return false;
		};
		["start", "mid", "end"].into_iter().all(|part| {
			std::fs::metadata(Self::table_path(config, part))
				.and_then(|m| m.modified())
				.map_or(true, |modified| modified <= cached_at)
		})
	}

	fn matches(&self, config: &Config) -> bool {
		self.order == config.order
			&& self.max_level == config.max_level
			&& self.fallback_level == config.fallback_level
			&& self.alphabet.symbols().iter().copied().eq(config.alphabet.chars())
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Symbols per gram (`k - 1`).
	pub fn gram_width(&self) -> usize {
		self.order - 1
	}

	pub fn alphabet(&self) -> &Alphabet {
		&self.alphabet
	}

	pub fn max_level(&self) -> Level {
		self.max_level
	}

	pub fn fallback_level(&self) -> Level {
		self.fallback_level
	}

	pub fn start(&self) -> &LevelTable {
		&self.start
	}

	/// Transitions of a window, `None` when the model never saw it.
	pub fn mid_row(&self, window: &[char]) -> Option<&LevelTable> {
		self.mid.get(window)
	}

	pub fn end(&self) -> Option<&RawLevels> {
		self.end.as_ref()
	}
}
