use crate::error::{GuessError, Result};
use super::component::{Component, DecompositionKey};
use super::level_index::LevelIndex;

/// Maps a password to its canonical component sequence by direct lookups.
///
/// Touches one table entry per position, so decomposing costs O(length)
/// regardless of how large the password's class is.
#[derive(Clone, Copy, Debug)]
pub struct Decomposer<'a> {
	index: &'a LevelIndex,
}

impl<'a> Decomposer<'a> {
	pub fn new(index: &'a LevelIndex) -> Self {
		Self { index }
	}

	/// Validates and decomposes a password.
	///
	/// # Errors
	/// - `InvalidSymbol` if a character is outside the alphabet.
	/// - `TooShort` if the password cannot fill the initial block.
	/// - `StructuralInconsistency` if some position matches no table entry.
	pub fn decompose(&self, password: &str) -> Result<DecompositionKey> {
		let symbols = self.index.alphabet().parse(password)?;
		self.decompose_symbols(&symbols)
	}

	/// Decomposes an already validated symbol sequence.
	pub fn decompose_symbols(&self, symbols: &[char]) -> Result<DecompositionKey> {
		let width = self.index.gram_width();
		if symbols.len() < width {
			return Err(GuessError::TooShort { length: symbols.len(), min: width });
		}

		let alphabet = self.index.alphabet();
		let mut components = Vec::with_capacity(symbols.len() - width + 1);

		let head = &symbols[..width];
		let slot = self.index.start().locate(head).ok_or_else(|| {
			GuessError::StructuralInconsistency(format!(
				"initial gram {:?} matches no start level",
				head.iter().collect::<String>()
			))
		})?;
		components.push(Component::new(slot.level, slot.rank, alphabet.encode(head)?));

		for pos in width..symbols.len() {
			let window = &symbols[pos - width..pos];
			let symbol = symbols[pos];
			let code = alphabet.encode(&symbols[pos..=pos])?;

			let component = match self.index.mid_row(window) {
				// Unseen window: uniform fallback, ranked by alphabet position.
				None => Component::new(self.index.fallback_level(), code as usize, code),
				Some(row) => {
					let slot = row.locate(&[symbol]).ok_or_else(|| {
						GuessError::StructuralInconsistency(format!(
							"symbol {symbol:?} after {:?} matches no mid level",
							window.iter().collect::<String>()
						))
					})?;
					Component::new(slot.level, slot.rank, code)
				}
			};
			components.push(component);
		}

		Ok(DecompositionKey::new(components, symbols.len()))
	}
}
