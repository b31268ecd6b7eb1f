use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::warn;

use crate::error::Result;
use crate::io::list_stems;
use super::Level;
use super::component::ClassId;

/// Extension of checkpoint artifacts.
pub const CHECKPOINT_EXTENSION: &str = "out";

/// Set of classes that have a checkpoint.
///
/// # Ordering contract
/// Classes are visited by ascending complexity (`length + level / β`), then
/// ascending length, then ascending level. Checkpoints are built and prefix
/// sums are accumulated in this order; any other order yields wrong guess
/// numbers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
	classes: BTreeSet<ClassId>,
}

impl Catalog {
	pub fn new(classes: impl IntoIterator<Item = ClassId>) -> Self {
		Self { classes: classes.into_iter().collect() }
	}

	/// Catalog of every `(length, level)` with `level < coverage[length]`.
	pub fn from_coverage(coverage: &BTreeMap<usize, Level>) -> Self {
		Self::new(
			coverage
				.iter()
				.flat_map(|(length, bound)| (0..*bound).map(move |level| ClassId::new(*length, level))),
		)
	}

	/// Catalog of the `{length}_{level}.out` artifacts found in a directory.
	///
	/// Files whose name does not follow the pattern are skipped with a warning.
	pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
		let mut classes = BTreeSet::new();
		for stem in list_stems(dir, CHECKPOINT_EXTENSION)? {
			match parse_class(&stem) {
				Some(class) => {
					classes.insert(class);
				}
				None => warn!("Ignoring checkpoint file with unexpected name {stem}.{CHECKPOINT_EXTENSION}"),
			}
		}
		Ok(Self { classes })
	}

	pub fn contains(&self, class: ClassId) -> bool {
		self.classes.contains(&class)
	}

	pub fn len(&self) -> usize {
		self.classes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.is_empty()
	}

	/// Longest catalogued length, `None` for an empty catalog.
	pub fn max_length(&self) -> Option<usize> {
		self.classes.iter().map(|c| c.length).max()
	}

	/// Classes in the ordering contract.
	pub fn ordered(&self, level_factor: Level) -> Vec<ClassId> {
		let mut classes: Vec<ClassId> = self.classes.iter().copied().collect();
		classes.sort_by_key(|c| order_key(*c, level_factor));
		classes
	}

	/// Catalogued classes ordered strictly before `class`, which need not be catalogued.
	pub fn preceding(&self, class: ClassId, level_factor: Level) -> impl Iterator<Item = ClassId> {
		let target = order_key(class, level_factor);
		self.ordered(level_factor)
			.into_iter()
			.take_while(move |c| order_key(*c, level_factor) < target)
	}
}

fn order_key(class: ClassId, level_factor: Level) -> (usize, usize, Level) {
	(class.complexity(level_factor), class.length, class.total_level)
}

fn parse_class(stem: &str) -> Option<ClassId> {
	let (length, level) = stem.split_once('_')?;
	Some(ClassId::new(length.parse().ok()?, level.parse().ok()?))
}

/// Artifact file name of a class.
pub fn file_name(class: ClassId) -> String {
	format!("{class}.{CHECKPOINT_EXTENSION}")
}
