use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;

use log::{info, warn};

use crate::error::{GuessError, Result};
use super::Level;
use super::catalog::{Catalog, file_name};
use super::checkpoint::{Checkpoint, CheckpointBuilder};
use super::component::ClassId;
use super::level_index::LevelIndex;

/// Where the rank estimator reads checkpoints from.
pub trait CheckpointSource {
	/// Exact cardinality of a class.
	fn total(&self, class: ClassId) -> Result<u64>;

	/// Full checkpoint of a class.
	fn checkpoint(&self, class: ClassId) -> Result<Checkpoint>;
}

/// Checkpoints persisted as `{length}_{level}.out` files in one directory.
#[derive(Clone, Debug)]
pub struct CheckpointDir {
	root: PathBuf,
}

impl CheckpointDir {
	pub fn new<P: AsRef<Path>>(root: P) -> Self {
		Self { root: root.as_ref().to_owned() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn path(&self, class: ClassId) -> PathBuf {
		self.root.join(file_name(class))
	}

	pub fn save(&self, class: ClassId, checkpoint: &Checkpoint) -> Result<()> {
		checkpoint.write(self.path(class))
	}
}

impl CheckpointSource for CheckpointDir {
	fn total(&self, class: ClassId) -> Result<u64> {
		Checkpoint::read_total(self.path(class))
	}

	fn checkpoint(&self, class: ClassId) -> Result<Checkpoint> {
		Checkpoint::read(self.path(class))
	}
}

/// In-memory checkpoints, handy for tests and for freshly built catalogs.
pub type MemoryStore = HashMap<ClassId, Checkpoint>;

impl CheckpointSource for MemoryStore {
	fn total(&self, class: ClassId) -> Result<u64> {
		Ok(self.checkpoint(class)?.total())
	}

	fn checkpoint(&self, class: ClassId) -> Result<Checkpoint> {
		self.get(&class)
			.cloned()
			.ok_or_else(|| GuessError::StructuralInconsistency(format!("no checkpoint for class {class}")))
	}
}

/// Builds and saves the checkpoint of every catalogued class.
///
/// # Behavior
/// - Spreads the classes over one worker per CPU.
/// - Each worker is the only writer of the files of its classes.
/// - Results are collected over an MPSC channel and returned in catalog order.
///
/// # Errors
/// Returns the first error reported by a worker, or an error if a worker
/// died before reporting all of its classes.
pub fn build_catalog(
	index: Arc<LevelIndex>,
	catalog: &Catalog,
	interval: u64,
	dir: &CheckpointDir,
	level_factor: Level,
) -> Result<Vec<(ClassId, u64)>> {
	// Fails fast on a zero interval before any thread is spawned.
	CheckpointBuilder::new(&index, interval)?;

	let classes = catalog.ordered(level_factor);
	if classes.is_empty() {
		return Ok(Vec::new());
	}
	let workers = num_cpus::get().max(1);
	let chunk_size = classes.len().div_ceil(workers);

	let (tx, rx) = mpsc::channel();
	for chunk in classes.chunks(chunk_size) {
		let tx = tx.clone();
		let chunk: Vec<ClassId> = chunk.to_vec();
		let index = Arc::clone(&index);
		let dir = dir.clone();

		thread::spawn(move || {
			for class in chunk {
				let built = CheckpointBuilder::new(&index, interval)
					.and_then(|builder| builder.build(class))
					.and_then(|checkpoint| {
						dir.save(class, &checkpoint)?;
						Ok(checkpoint.total())
					});
				if tx.send((class, built)).is_err() {
					warn!("Checkpoint collector went away, stopping worker");
					return;
				}
			}
		});
	}
	drop(tx);

	let mut totals = HashMap::with_capacity(classes.len());
	for (class, built) in rx.iter() {
		let total = built?;
		info!("Checkpointed class {class}: {total} passwords");
		totals.insert(class, total);
	}

	classes
		.into_iter()
		.map(|class| {
			totals.get(&class).map(|total| (class, *total)).ok_or_else(|| {
				GuessError::StructuralInconsistency(format!("worker died before building class {class}"))
			})
		})
		.collect()
}
