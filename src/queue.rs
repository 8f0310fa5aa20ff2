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

use std::collections::VecDeque;

use crate::error::{LabelError, Result};

/// Largest number of levels a `HierarchicalQueue` will allocate buckets for.
/// Covers every 16-bit image exactly.
pub const MAX_LEVEL_COUNT: usize = 1 << 16;

/// Hierarchical FIFO queue over a bounded integer priority range.
///
/// The queue holds one FIFO bucket per priority level. Levels are drained from
/// the highest level downwards: elements come out in level-major order, and in
/// insertion order within a level. This gives O(1) amortized `add` and `next`,
/// at the cost of one bucket per level.
///
/// # The monotone cursor
/// The queue keeps track of the level it is currently draining. This cursor
/// starts at the highest level and *only ever moves down*: `has_next()` skips
/// over empty buckets and never looks back. Elements added (with `add`) at a
/// level above the cursor are never returned. It is the caller's job to only
/// add elements at or below `current_level()` once draining has started. If you
/// want this checked at runtime, use `add_checked` instead.
///
/// # Protocol
/// Always call `has_next()` before calling `next()`. `next()` does not skip
/// empty buckets by itself and fails with `LabelError::EmptyQueue` when the
/// current bucket is empty. The `Iterator` implementation follows this protocol
/// for you.
#[derive(Debug, Clone)]
pub struct HierarchicalQueue {
  min: i64,
  max: i64,
  buckets: Vec<VecDeque<usize>>,
  current_level: usize,
  count: usize,
}

impl HierarchicalQueue {
  /// Creates an empty queue for priority values in `[min, max]` (inclusive).
  /// Returns `LabelError::InvalidRange` if `max < min` and
  /// `LabelError::TooManyLevels` if the range spans more than
  /// `MAX_LEVEL_COUNT` levels.
  pub fn new(min: i64, max: i64) -> Result<Self> {
    if max < min {
      return Err(LabelError::InvalidRange { min, max });
    }
    //i128 holds the span of any pair of i64s
    let span = max as i128 - min as i128;
    if span >= MAX_LEVEL_COUNT as i128 {
      return Err(LabelError::TooManyLevels { min, max, limit: MAX_LEVEL_COUNT });
    }
    let level_count = span as usize + 1;
    Ok(HierarchicalQueue {
      min,
      max,
      buckets: (0..level_count).map(|_| VecDeque::new()).collect(),
      current_level: level_count - 1,
      count: 0,
    })
  }

  /// Lowest priority value the queue accepts
  pub fn min_value(&self) -> i64 {
    self.min
  }

  /// Highest priority value the queue accepts
  pub fn max_value(&self) -> i64 {
    self.max
  }

  /// Priority value of the level the cursor is at
  pub fn current_value(&self) -> i64 {
    self.min + self.current_level as i64
  }

  /// Number of buckets (`max - min + 1`)
  pub fn level_count(&self) -> usize {
    self.buckets.len()
  }

  /// Level the queue is currently draining. Never increases.
  pub fn current_level(&self) -> usize {
    self.current_level
  }

  /// Total number of stored elements, including unreachable ones
  pub fn len(&self) -> usize {
    self.count
  }

  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  #[inline]
  fn level_of(&self, value: i64) -> Result<usize> {
    if value < self.min || value > self.max {
      return Err(LabelError::OutOfRange { value, min: self.min, max: self.max });
    }
    Ok((value - self.min) as usize)
  }

  /// Appends `index` to the bucket belonging to `value`. Does not move the
  /// cursor. Fails with `LabelError::OutOfRange` if `value` is not in
  /// `[min, max]`.
  #[inline]
  pub fn add(&mut self, index: usize, value: i64) -> Result<()> {
    let level = self.level_of(value)?;
    self.buckets[level].push_back(index);
    self.count += 1;
    Ok(())
  }

  /// Same as `add`, but also rejects values whose level lies above the
  /// current level (`LabelError::LevelPassed`), since those would never be
  /// returned.
  #[inline]
  pub fn add_checked(&mut self, index: usize, value: i64) -> Result<()> {
    let level = self.level_of(value)?;
    if level > self.current_level {
      return Err(LabelError::LevelPassed { level, current: self.current_level });
    }
    self.buckets[level].push_back(index);
    self.count += 1;
    Ok(())
  }

  /// Moves the cursor down past empty buckets and returns true if the bucket
  /// at the cursor holds an element.
  #[inline]
  pub fn has_next(&mut self) -> bool {
    while self.buckets[self.current_level].is_empty() && self.current_level > 0 {
      self.current_level -= 1;
    }
    !self.buckets[self.current_level].is_empty()
  }

  /// Removes and returns the oldest element of the current bucket. Call
  /// `has_next()` first!
  #[inline]
  pub fn next(&mut self) -> Result<usize> {
    let index = self.buckets[self.current_level].pop_front().ok_or(LabelError::EmptyQueue)?;
    self.count -= 1;
    Ok(index)
  }
}

impl Iterator for HierarchicalQueue {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    if self.has_next() {
      HierarchicalQueue::next(self).ok()
    } else {
      None
    }
  }
}
