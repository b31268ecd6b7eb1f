use std::ops::ControlFlow;
use std::path::Path;

use log::debug;

use crate::error::{GuessError, Result};
use crate::io::{read_lines, read_tail, write_atomically};
use super::component::ClassId;
use super::enumerator::Enumerator;
use super::level_index::LevelIndex;

/// Bytes read from the end of an artifact to reach its trailing count.
const TAIL_BYTES: u64 = 100;

/// Sparse, deterministic sample of one class's canonical order.
///
/// Sample `i` (0-based) is the `(i + 1) * N`-th password of the class, where
/// `N` is the sampling interval; `total` is the exact class cardinality.
///
/// # Artifact format
/// One sampled password per line, an empty separator line, then the count.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Checkpoint {
	samples: Vec<String>,
	total: u64,
}

impl Checkpoint {
	pub fn new(samples: Vec<String>, total: u64) -> Self {
		Self { samples, total }
	}

	pub fn samples(&self) -> &[String] {
		&self.samples
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	/// Text artifact of the checkpoint.
	pub fn render(&self) -> String {
		let mut out = String::new();
		for sample in &self.samples {
			out.push_str(sample);
			out.push('\n');
		}
		out.push('\n');
		out.push_str(&self.total.to_string());
		out.push('\n');
		out
	}

	/// Parses a text artifact; `path` only feeds error messages.
	pub fn parse(lines: &[String], path: &Path) -> Result<Self> {
		let invalid = |reason: &str| GuessError::InvalidCheckpoint { path: path.to_owned(), reason: reason.to_owned() };

		let mut end = lines.len();
		while end > 0 && lines[end - 1].trim().is_empty() {
			end -= 1;
		}
		let Some(last) = end.checked_sub(1) else {
			return Err(invalid("no trailing count"));
		};
		let total = parse_total(&lines[last]).ok_or_else(|| invalid("trailing count is not a number"))?;

		let mut samples = &lines[..last];
		if let Some((separator, rest)) = samples.split_last() {
			if separator.is_empty() {
				samples = rest;
			}
		}
		if samples.iter().any(String::is_empty) {
			return Err(invalid("empty sample line"));
		}

		Ok(Self { samples: samples.to_vec(), total })
	}

	pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		Self::parse(&read_lines(path)?, path)
	}

	/// Reads only the trailing count of an artifact.
	pub fn read_total<P: AsRef<Path>>(path: P) -> Result<u64> {
		let path = path.as_ref();
		let tail = read_tail(path, TAIL_BYTES)?;
		tail.lines()
			.rev()
			.find(|line| !line.trim().is_empty())
			.and_then(parse_total)
			.ok_or_else(|| GuessError::InvalidCheckpoint {
				path: path.to_owned(),
				reason: "no trailing count".to_owned(),
			})
	}

	pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		Ok(write_atomically(path, &self.render())?)
	}
}

fn parse_total(line: &str) -> Option<u64> {
	line.trim().parse().ok()
}

/// Runs the enumerator over a class and samples every `interval`-th password.
///
/// The output depends only on the level index, the class and the interval:
/// rebuilding a class reproduces its checkpoint exactly.
#[derive(Clone, Copy, Debug)]
pub struct CheckpointBuilder<'a> {
	index: &'a LevelIndex,
	interval: u64,
}

impl<'a> CheckpointBuilder<'a> {
	/// # Errors
	/// Returns an error if `interval` is zero.
	pub fn new(index: &'a LevelIndex, interval: u64) -> Result<Self> {
		if interval == 0 {
			return Err(GuessError::InvalidConfig("sample interval must be positive".to_owned()));
		}
		Ok(Self { index, interval })
	}

	pub fn build(&self, class: ClassId) -> Result<Checkpoint> {
		let enumerator = Enumerator::new(self.index, class)?;
		let mut samples = Vec::new();
		let mut counter: u64 = 0;

		let outcome = enumerator.walk(None, |password| {
			counter += 1;
			if counter % self.interval == 0 {
				samples.push(password.iter().collect());
			}
			ControlFlow::Continue(())
		});

		debug!("Class {class}: {} passwords, {} samples", outcome.visited, samples.len());
		Ok(Checkpoint { samples, total: outcome.visited })
	}
}
