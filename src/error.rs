/*
  Copyright© 2023 Raúl Wolters(1)

  This file is part of rustronomy-labels.

  rustronomy is free software: you can redistribute it and/or modify it under
  the terms of the European Union Public License version 1.2 or later, as
  published by the European Commission.

  rustronomy is distributed in the hope that it will be useful, but WITHOUT ANY
  WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
  A PARTICULAR PURPOSE. See the European Union Public License for more details.

  You should have received a copy of the EUPL in an/all official language(s) of
  the European Union along with rustronomy.  If not, see
  <https://ec.europa.eu/info/european-union-public-licence_en/>.

  (1) Resident of the Kingdom of the Netherlands; agreement between licensor and
  licensee subject to Dutch law as per article 15 of the EUPL.
*/

//! Errors returned by the queue, the label analysis functions and the flood
//! driver. All of them signal a contract violation by the caller; none of them
//! are transient.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
  /// A `HierarchicalQueue` was constructed with `max < min`
  #[error("invalid priority range: max ({max}) is smaller than min ({min})")]
  InvalidRange { min: i64, max: i64 },

  /// The priority range `[min, max]` needs more than `limit` buckets
  #[error("priority range [{min}, {max}] needs more than {limit} levels")]
  TooManyLevels { min: i64, max: i64, limit: usize },

  /// A value outside of the queue's `[min, max]` range was added
  #[error("priority {value} lies outside of the queue range [{min}, {max}]")]
  OutOfRange { value: i64, min: i64, max: i64 },

  /// `next()` was called while the current bucket was empty
  #[error("tried to take an element from an empty queue level")]
  EmptyQueue,

  /// `add_checked()` was called with a level the queue has already passed
  #[error("level {level} was already passed (queue is at level {current})")]
  LevelPassed { level: usize, current: usize },

  /// Label map and signal image do not have the same shape
  #[error("shape mismatch: expected {expected:?}, found {found:?}")]
  ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },

  /// Fewer voxel sizes were given than the image has axes
  #[error("voxel size has {found} entries, but the image has {ndim} axes")]
  VoxelSizeMismatch { ndim: usize, found: usize },

  /// Flood seed outside of the image or below the flooding threshold
  #[error("invalid seed at {seed:?}")]
  InvalidSeed { seed: Vec<usize> },
}

pub type Result<T> = std::result::Result<T, LabelError>;

/// Returns `ShapeMismatch` unless both shapes are identical
pub(crate) fn check_shape(expected: &[usize], found: &[usize]) -> Result<()> {
  if expected == found {
    Ok(())
  } else {
    Err(LabelError::ShapeMismatch { expected: expected.to_vec(), found: found.to_vec() })
  }
}
