//! Probability-ranked enumeration of passwords under a discretized Markov model.
//!
//! This module provides:
//! - The level tables of a model (`LevelIndex`) and its alphabet
//! - The canonical order of a (length, level) class (`Enumerator`)
//! - Direct password → position-in-order keys (`Decomposer`)
//! - Sparse checkpoints of each class and the catalog of indexed classes
//! - Guess number estimation (`RankEstimator`)

/// Integer cost bucket: lower level means higher modeled probability.
pub type Level = u32;

/// Ordered symbol set, validation and gram codes.
pub mod alphabet;

/// Sampled checkpoints of a class and their text artifact.
pub mod checkpoint;

/// Which classes are indexed, and the order prefix sums follow.
pub mod catalog;

/// Components, decomposition keys and class identifiers.
pub mod component;

/// Password → canonical component sequence.
pub mod decomposer;

/// Canonical order walk with bounded/resumable runs.
pub mod enumerator;

/// Guess number estimation.
pub mod estimator;

/// Start / Mid / End level tables.
pub mod level_index;

/// Checkpoint sources and batch building.
pub mod store;

pub use alphabet::Alphabet;
pub use catalog::Catalog;
pub use checkpoint::Checkpoint;
pub use component::{ClassId, Component, DecompositionKey};
pub use decomposer::Decomposer;
pub use enumerator::{Enumerator, Outcome};
pub use estimator::{Guess, RankEstimator};
pub use level_index::LevelIndex;
pub use store::{CheckpointDir, CheckpointSource, MemoryStore};
