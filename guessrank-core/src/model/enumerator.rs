use std::cmp::Ordering;
use std::ops::ControlFlow;

use crate::error::{GuessError, Result};
use super::Level;
use super::component::{ClassId, Component, DecompositionKey};
use super::level_index::{Entry, LevelIndex, LevelTable};

/// Result of one enumeration run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
	/// Number of passwords handed to the visitor, including the one that stopped the run.
	pub visited: u64,
	/// `true` if the visitor asked to stop before the class was exhausted.
	pub stopped: bool,
}

/// Walks the canonical order of one (length, total level) class.
///
/// # Canonical order
/// - The first `k - 1` symbols are chosen as one block from the Start table,
///   levels ascending, entries in listed order, a wildcard expanding to every
///   unlisted gram in alphabet order.
/// - Every following symbol is chosen the same way from the Mid row of the
///   trailing `k - 1` symbols; a window absent from Mid offers every symbol in
///   alphabet order at the fallback level.
/// - A branch whose remaining budget exceeds `max_level` per remaining
///   position is pruned.
///
/// The same rule applies at every non-initial position, the last included.
#[derive(Clone, Copy, Debug)]
pub struct Enumerator<'a> {
	index: &'a LevelIndex,
	class: ClassId,
}

impl<'a> Enumerator<'a> {
	/// # Errors
	/// Returns `TooShort` if the class length cannot hold the initial block.
	pub fn new(index: &'a LevelIndex, class: ClassId) -> Result<Self> {
		if class.length < index.gram_width() {
			return Err(GuessError::TooShort { length: class.length, min: index.gram_width() });
		}
		Ok(Self { index, class })
	}

	pub fn class(&self) -> ClassId {
		self.class
	}

	/// Enumerates the class, handing every password to `visit` in canonical order.
	///
	/// With a `lower_bound`, every password ordered before it is skipped
	/// without being generated; the bound itself is visited if it belongs to
	/// the class. The visitor stops the run by returning `ControlFlow::Break`.
	pub fn walk<F>(&self, lower_bound: Option<&DecompositionKey>, visit: F) -> Outcome
	where
		F: FnMut(&[char]) -> ControlFlow<()>,
	{
		let mut walk = Walk {
			index: self.index,
			length: self.class.length,
			buffer: Vec::with_capacity(self.class.length),
			visited: 0,
			visit,
		};
		let bound = lower_bound.map(DecompositionKey::components).filter(|b| !b.is_empty());
		let flow = walk.descend(self.class.total_level, bound);

		Outcome { visited: walk.visited, stopped: flow.is_break() }
	}

	/// Exact number of passwords in the class.
	pub fn count(&self) -> u64 {
		self.walk(None, |_| ControlFlow::Continue(())).visited
	}

	/// Number of passwords visited up to and including `target`, starting from
	/// `lower_bound`, or `None` if the class runs out first.
	pub fn position_of(&self, target: &[char], lower_bound: Option<&DecompositionKey>) -> Option<u64> {
		let outcome = self.walk(lower_bound, |password| {
			if password == target { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
		});
		outcome.stopped.then_some(outcome.visited)
	}
}

/// Mutable state of one run, threaded through the recursion.
struct Walk<'w, F> {
	index: &'w LevelIndex,
	length: usize,
	buffer: Vec<char>,
	visited: u64,
	visit: F,
}

impl<F> Walk<'_, F>
where
	F: FnMut(&[char]) -> ControlFlow<()>,
{
	fn descend(&mut self, remaining: Level, bound: Option<&[Component]>) -> ControlFlow<()> {
		let pos = self.buffer.len();
		if pos == self.length {
			if remaining != 0 {
				return ControlFlow::Continue(());
			}
			self.visited += 1;
			return (self.visit)(&self.buffer);
		}

		let capacity = self.index.max_level() as u64 * (self.length - pos) as u64;
		if remaining as u64 > capacity {
			return ControlFlow::Continue(());
		}

		let index = self.index;
		let cap = remaining.min(index.max_level());
		if pos == 0 {
			return self.descend_table(index.start(), cap, remaining, bound);
		}

		let window = &self.buffer[pos - index.gram_width()..pos];
		match index.mid_row(window) {
			Some(row) => self.descend_table(row, cap, remaining, bound),
			None => {
				let fallback = index.fallback_level();
				for (rank, symbol) in index.alphabet().symbols().iter().enumerate() {
					let component = Component::new(fallback, rank, rank as u64);
					self.choose(std::slice::from_ref(symbol), component, remaining, bound)?;
				}
				ControlFlow::Continue(())
			}
		}
	}

	/// Tries every entry of `table` with a level up to `cap`, in canonical order.
	fn descend_table(
		&mut self,
		table: &LevelTable,
		cap: Level,
		remaining: Level,
		bound: Option<&[Component]>,
	) -> ControlFlow<()> {
		for (level, entries) in table.levels_up_to(cap) {
			for (rank, entry) in entries.iter().enumerate() {
				match entry {
					Entry::Token(token) => {
						let component = Component::new(level, rank, token.code());
						self.choose(token.symbols(), component, remaining, bound)?;
					}
					Entry::Wildcard => {
						for token in table.unlisted() {
							let component = Component::new(level, rank, token.code());
							self.choose(token.symbols(), component, remaining, bound)?;
						}
					}
				}
			}
		}
		ControlFlow::Continue(())
	}

	fn choose(
		&mut self,
		symbols: &[char],
		component: Component,
		remaining: Level,
		bound: Option<&[Component]>,
	) -> ControlFlow<()> {
		let Some(rest) = remaining.checked_sub(component.level) else {
			return ControlFlow::Continue(());
		};
		let Some(bound) = narrow(bound, &component) else {
			return ControlFlow::Continue(());
		};

		let mark = self.buffer.len();
		self.buffer.extend_from_slice(symbols);
		let flow = self.descend(rest, bound);
		self.buffer.truncate(mark);
		flow
	}
}

/// Applies a lower bound to the component just chosen.
///
/// Returns `None` when the choice sorts before the bound (prune), otherwise
/// the bound left for deeper positions: nothing once the choice is strictly
/// greater, the remaining suffix while it is equal.
fn narrow<'b>(bound: Option<&'b [Component]>, chosen: &Component) -> Option<Option<&'b [Component]>> {
	let Some((head, tail)) = bound.and_then(<[Component]>::split_first) else {
		return Some(None);
	};
	match chosen.cmp(head) {
		Ordering::Less => None,
		Ordering::Greater => Some(None),
		Ordering::Equal => Some((!tail.is_empty()).then_some(tail)),
	}
}
