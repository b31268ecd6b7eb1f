use std::fmt;

use serde::{Deserialize, Serialize};

use super::Level;

/// One step of the canonical order: the choice made at a single position.
///
/// The initial `k - 1` symbols form a single component; every following
/// symbol contributes one more.
///
/// Components order by `level`, then by `rank` (position of the matching
/// entry within its level), then by `token_code`. The code only decides
/// between symbols produced by the same wildcard entry, where it reproduces
/// the alphabet order in which the wildcard is expanded.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Component {
	pub level: Level,
	pub rank: usize,
	/// Base-`A` code of the token (gram or symbol) chosen at this position.
	pub token_code: u64,
}

impl Component {
	pub fn new(level: Level, rank: usize, token_code: u64) -> Self {
		Self { level, rank, token_code }
	}
}

/// A (length, total level) class of passwords.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId {
	pub length: usize,
	pub total_level: Level,
}

impl ClassId {
	pub fn new(length: usize, total_level: Level) -> Self {
		Self { length, total_level }
	}

	/// Complexity used to order classes across the catalog: `length + level / β`.
	pub fn complexity(&self, level_factor: Level) -> usize {
		self.length + (self.total_level / level_factor) as usize
	}
}

impl fmt::Display for ClassId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}_{}", self.length, self.total_level)
	}
}

/// Canonical component sequence of a password.
///
/// Keys of the same class compare exactly like their passwords are ordered
/// by the enumerator; equal keys mean equal passwords.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecompositionKey {
	components: Vec<Component>,
	length: usize,
}

impl DecompositionKey {
	pub(crate) fn new(components: Vec<Component>, length: usize) -> Self {
		Self { components, length }
	}

	pub fn components(&self) -> &[Component] {
		&self.components
	}

	pub fn total_level(&self) -> Level {
		self.components.iter().map(|c| c.level).sum()
	}

	pub fn class(&self) -> ClassId {
		ClassId::new(self.length, self.total_level())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn level_dominates_rank() {
		assert!(Component::new(0, 5, 9) < Component::new(1, 0, 0));
		assert!(Component::new(1, 0, 9) < Component::new(1, 1, 0));
		assert!(Component::new(1, 1, 0) < Component::new(1, 1, 1));
	}

	#[test]
	fn first_differing_position_decides() {
		let a = DecompositionKey::new(vec![Component::new(0, 0, 0), Component::new(2, 0, 0)], 2);
		let b = DecompositionKey::new(vec![Component::new(1, 0, 0), Component::new(0, 0, 0)], 2);
		assert!(a < b);
		assert_eq!(a.class(), ClassId::new(2, 2));
	}

	#[test]
	fn complexity_uses_integer_division() {
		assert_eq!(ClassId::new(6, 5).complexity(2), 8);
		assert_eq!(ClassId::new(7, 1).complexity(2), 7);
	}
}
