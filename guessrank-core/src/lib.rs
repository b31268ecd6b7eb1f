//! Guess-number estimation for passwords under a higher-order Markov model.
//!
//! This crate provides:
//! - A deterministic, probability-ranked order over every password of a
//!   given length and total level, walked without materializing it
//! - Sparse checkpoints of that order, built once per class
//! - Rank queries combining checkpoints, binary search and a bounded,
//!   resumed enumeration
//!
//! Training the model and discretizing its probabilities happen upstream;
//! this crate consumes the resulting level tables.

/// Deployment parameters and their file format.
pub mod config;

/// Crate-wide error type.
pub mod error;

/// Level tables, enumeration, checkpoints and rank estimation.
pub mod model;

/// File helpers (text artifacts, JSON tables, directory listing).
///
/// Not exposed
pub(crate) mod io;

pub use config::{Config, Smoothing};
pub use error::{GuessError, Result};
