use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GuessError, Result};

/// Ordered set of symbols a password may be made of.
///
/// The order matters: wildcard expansions and the fallback for unseen
/// windows enumerate symbols in this order, and gram codes are base-`A`
/// numbers over symbol positions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Alphabet {
	symbols: Vec<char>,
	positions: HashMap<char, usize>,
}

impl Alphabet {
	/// Builds an alphabet from its symbols in order.
	///
	/// # Errors
	/// Returns an error if the alphabet is empty or lists a symbol twice.
	pub fn new(symbols: &str) -> Result<Self> {
		let symbols: Vec<char> = symbols.chars().collect();
		if symbols.is_empty() {
			return Err(GuessError::InvalidConfig("alphabet is empty".to_owned()));
		}

		let mut positions = HashMap::with_capacity(symbols.len());
		for (i, c) in symbols.iter().enumerate() {
			if positions.insert(*c, i).is_some() {
				return Err(GuessError::InvalidConfig(format!("alphabet lists {c:?} twice")));
			}
		}

		Ok(Self { symbols, positions })
	}

	pub fn len(&self) -> usize {
		self.symbols.len()
	}

	pub fn is_empty(&self) -> bool {
		self.symbols.is_empty()
	}

	pub fn symbols(&self) -> &[char] {
		&self.symbols
	}

	pub fn index_of(&self, symbol: char) -> Option<usize> {
		self.positions.get(&symbol).copied()
	}

	/// Splits a password into symbols, rejecting anything outside the alphabet.
	pub fn parse(&self, password: &str) -> Result<Vec<char>> {
		password
			.chars()
			.enumerate()
			.map(|(position, symbol)| {
				if self.positions.contains_key(&symbol) {
					Ok(symbol)
				} else {
					Err(GuessError::InvalidSymbol { symbol, position })
				}
			})
			.collect()
	}

	/// Base-`A` code of a symbol sequence, most significant symbol first.
	///
	/// Codes of equal-length sequences sort like the sequences do under
	/// alphabet order.
	pub fn encode(&self, symbols: &[char]) -> Result<u64> {
		let base = self.symbols.len() as u64;
		let mut code: u64 = 0;
		for (position, symbol) in symbols.iter().enumerate() {
			let digit = self
				.index_of(*symbol)
				.ok_or(GuessError::InvalidSymbol { symbol: *symbol, position })?;
			code = code
				.checked_mul(base)
				.and_then(|c| c.checked_add(digit as u64))
				.ok_or_else(|| GuessError::InvalidConfig(format!("gram of {} symbols overflows its code", symbols.len())))?;
		}
		Ok(code)
	}

	/// Inverse of [`Alphabet::encode`] for sequences of `width` symbols.
	pub fn decode(&self, mut code: u64, width: usize) -> Vec<char> {
		let base = self.symbols.len() as u64;
		let mut symbols = vec![self.symbols[0]; width];
		for slot in symbols.iter_mut().rev() {
			*slot = self.symbols[(code % base) as usize];
			code /= base;
		}
		symbols
	}

	/// Number of sequences of `width` symbols, if it fits in a `u64`.
	pub fn combinations(&self, width: usize) -> Option<u64> {
		(self.symbols.len() as u64).checked_pow(u32::try_from(width).ok()?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_reports_first_foreign_symbol() {
		let alphabet = Alphabet::new("ab").unwrap();
		match alphabet.parse("a!b") {
			Err(GuessError::InvalidSymbol { symbol, position }) => {
				assert_eq!(symbol, '!');
				assert_eq!(position, 1);
			}
			other => panic!("unexpected result {other:?}"),
		}
	}

	#[test]
	fn codes_follow_alphabet_order() {
		let alphabet = Alphabet::new("ba").unwrap();
		assert!(alphabet.encode(&['b', 'a']).unwrap() < alphabet.encode(&['a', 'b']).unwrap());
		assert_eq!(alphabet.decode(alphabet.encode(&['a', 'b']).unwrap(), 2), vec!['a', 'b']);
	}

	#[test]
	fn rejects_duplicates() {
		assert!(Alphabet::new("aba").is_err());
	}
}
