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

use ndarray as nd;
use nd::{Dimension, IntoDimension};
use num_traits::ToPrimitive;
use rayon::prelude::*;

use crate::error::{LabelError, Result};
use crate::queue::{HierarchicalQueue, MAX_LEVEL_COUNT};
use crate::BACKGROUND;

/// Which pixels count as neighbours of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
  /// Pixels sharing a face: 4 in 2D, 6 in 3D
  #[default]
  Face,
  /// Pixels sharing a face, edge or corner: 8 in 2D, 26 in 3D
  Full,
}

#[derive(Debug, Clone, Default)]
/// Builder for configuring a flood transform.
///
/// Use `FloodBuilder::new()` to start, set the options you need and call
/// `build()` to get a `FloodFill` object. `FloodFill` is `Send` and `Sync`.
pub struct FloodBuilder {
  threshold: Option<i64>,
  connectivity: Connectivity,
  minimum_area: usize,
}

impl FloodBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Pixels with a level below `threshold` are never flooded and cannot be
  /// used as seeds. Without a threshold, every pixel with a finite level can
  /// be flooded.
  pub fn set_threshold(mut self, threshold: i64) -> Self {
    self.threshold = Some(threshold);
    self
  }

  pub fn set_connectivity(mut self, connectivity: Connectivity) -> Self {
    self.connectivity = connectivity;
    self
  }

  /// Regions with fewer than `minimum_area` pixels (voxels) are cleared to
  /// background after flooding, and the surviving labels are renumbered to
  /// `1..=n` in seed order. The default of 0 keeps every region.
  pub fn set_minimum_area(mut self, minimum_area: usize) -> Self {
    self.minimum_area = minimum_area;
    self
  }

  pub fn build(self) -> FloodFill {
    FloodFill {
      threshold: self.threshold,
      connectivity: self.connectivity,
      minimum_area: self.minimum_area,
    }
  }
}

/// Seeded priority flood.
///
/// Grows one label per seed over an image of (integer) levels. Pixels are
/// visited from the highest level to the lowest via a `HierarchicalQueue`:
/// whenever a labelled pixel is taken from the queue, each of its unlabelled
/// neighbours inherits its label and is put in the queue. A neighbour that is
/// higher than the level currently being processed is queued *at* the current
/// level, so regions may climb over ridges but always in level order, and the
/// queue never receives an element above its cursor.
///
/// Image values are converted to levels by truncation towards zero. Values that
/// cannot be converted (NaN, infinities) are never flooded. If the floodable
/// levels span more than `MAX_LEVEL_COUNT` levels, they are scaled down
/// linearly onto that many queue levels. Order between levels is kept, but
/// levels that are close together may end up sharing a queue level.
#[derive(Debug, Clone)]
pub struct FloodFill {
  threshold: Option<i64>,
  connectivity: Connectivity,
  minimum_area: usize,
}

/// Row-major geometry of a flattened image
struct Grid {
  shape: Vec<usize>,
  strides: Vec<usize>,
  offsets: Vec<Vec<isize>>,
}

impl Grid {
  fn new(shape: &[usize], connectivity: Connectivity) -> Self {
    let ndim = shape.len();
    let mut strides = vec![1usize; ndim];
    for d in (0..ndim.saturating_sub(1)).rev() {
      strides[d] = strides[d + 1] * shape[d + 1];
    }

    let offsets = match connectivity {
      Connectivity::Face => (0..ndim)
        .flat_map(|d| {
          [-1isize, 1].into_iter().map(move |step| {
            let mut offset = vec![0isize; ndim];
            offset[d] = step;
            offset
          })
        })
        .collect(),
      Connectivity::Full => {
        //All of {-1, 0, 1}^ndim except the origin
        let mut offsets = vec![Vec::new()];
        for _ in 0..ndim {
          offsets = offsets
            .into_iter()
            .flat_map(|prefix: Vec<isize>| {
              [-1isize, 0, 1].into_iter().map(move |step| {
                let mut next = prefix.clone();
                next.push(step);
                next
              })
            })
            .collect();
        }
        offsets.into_iter().filter(|offset| offset.iter().any(|&step| step != 0)).collect()
      }
    };

    Grid { shape: shape.to_vec(), strides, offsets }
  }

  fn linear(&self, position: &[usize]) -> Option<usize> {
    if position.len() != self.shape.len() {
      return None;
    }
    position.iter().zip(self.shape.iter()).zip(self.strides.iter()).try_fold(
      0usize,
      |acc, ((&x, &len), &stride)| if x < len { Some(acc + x * stride) } else { None },
    )
  }

  fn position(&self, mut index: usize) -> Vec<usize> {
    self
      .strides
      .iter()
      .map(|&stride| {
        let x = index / stride;
        index %= stride;
        x
      })
      .collect()
  }

  /// Writes the linear indices of all in-bounds neighbours of `index` into `buf`
  fn neighbours(&self, index: usize, buf: &mut Vec<usize>) {
    buf.clear();
    let position = self.position(index);
    'offsets: for offset in self.offsets.iter() {
      let mut neighbour = 0usize;
      for d in 0..position.len() {
        let x = position[d] as isize + offset[d];
        if x < 0 || x >= self.shape[d] as isize {
          continue 'offsets;
        }
        neighbour += x as usize * self.strides[d];
      }
      buf.push(neighbour);
    }
  }
}

#[inline(always)]
fn level_of<T: ToPrimitive>(value: &T) -> Option<i64> {
  value.to_i64()
}

/// Maps levels in `[lowest, highest]` onto at most `MAX_LEVEL_COUNT` queue
/// levels without changing their order
#[derive(Debug, Clone, Copy)]
struct Quantiser {
  lowest: i64,
  span: i128,
  top: i128,
}

impl Quantiser {
  fn new(lowest: i64, highest: i64) -> Self {
    let span = highest as i128 - lowest as i128;
    Quantiser { lowest, span, top: span.min(MAX_LEVEL_COUNT as i128 - 1) }
  }

  /// Highest queue level
  fn highest(&self) -> i64 {
    (self.lowest as i128 + self.top) as i64
  }

  #[inline]
  fn apply(&self, level: i64) -> i64 {
    let offset = level as i128 - self.lowest as i128;
    if self.span == self.top {
      level
    } else {
      (self.lowest as i128 + offset * self.top / self.span) as i64
    }
  }
}

impl FloodFill {
  pub fn threshold(&self) -> Option<i64> {
    self.threshold
  }

  pub fn connectivity(&self) -> Connectivity {
    self.connectivity
  }

  pub fn minimum_area(&self) -> usize {
    self.minimum_area
  }

  #[inline]
  fn floodable(&self, level: Option<i64>) -> bool {
    match (level, self.threshold) {
      (Some(level), Some(threshold)) => level >= threshold,
      (Some(_), None) => true,
      (None, _) => false,
    }
  }

  /// Returns the positions of all pixels that are strictly higher than all
  /// their neighbours and not below the threshold. Useful for generating seeds
  /// for the flood transform. Neighbours outside of the image are ignored,
  /// neighbours without a level count as lower.
  pub fn find_local_maxima<T, D>(&self, image: nd::ArrayView<T, D>) -> Vec<D::Pattern>
  where
    T: ToPrimitive + Sync,
    D: Dimension,
  {
    let levels: Vec<Option<i64>> = image.iter().map(level_of).collect();
    let grid = Grid::new(image.shape(), self.connectivity);

    (0..levels.len())
      .into_par_iter()
      .filter(|&idx| self.floodable(levels[idx]))
      .filter(|&idx| {
        let mut buf = Vec::with_capacity(grid.offsets.len());
        grid.neighbours(idx, &mut buf);
        buf.iter().all(|&n| levels[n].map_or(true, |level| Some(level) < levels[idx]))
      })
      .map(|idx| grid.position(idx))
      .collect::<Vec<_>>()
      .into_iter()
      .map(|position| {
        let mut dim = D::zeros(position.len());
        dim.slice_mut().copy_from_slice(&position);
        dim.into_pattern()
      })
      .collect()
  }

  /// Floods `image` from `seeds` and returns the resulting label map. Seed `i`
  /// gets label `i + 1`; pixels that were not reached are `0`. With a minimum
  /// area set, small regions are removed and the remaining labels are
  /// renumbered. Fails with `LabelError::InvalidSeed` if a seed lies outside
  /// the image or cannot be flooded itself.
  pub fn flood<T, D>(
    &self,
    image: nd::ArrayView<T, D>,
    seeds: &[D::Pattern],
  ) -> Result<nd::Array<usize, D>>
  where
    T: ToPrimitive,
    D: Dimension,
  {
    //(1) flatten the image into levels and set up the queue over their range
    let levels: Vec<Option<i64>> = image.iter().map(level_of).collect();
    let grid = Grid::new(image.shape(), self.connectivity);
    let mut labels = vec![BACKGROUND; levels.len()];

    let floodable = levels.iter().filter_map(|&level| level.filter(|_| self.floodable(level)));
    let (lowest, highest) = floodable.fold((i64::MAX, i64::MIN), |(lo, hi), level| {
      (lo.min(level), hi.max(level))
    });

    //(2) colour the seeds
    let quantiser = Quantiser::new(lowest, highest);
    let mut queue = if lowest <= highest {
      Some(HierarchicalQueue::new(lowest, quantiser.highest())?)
    } else {
      None
    };
    for (idx, seed) in seeds.iter().enumerate() {
      let position = seed.clone().into_dimension();
      let invalid = || LabelError::InvalidSeed { seed: position.slice().to_vec() };
      let index = grid.linear(position.slice()).ok_or_else(invalid)?;
      let level = levels[index].filter(|_| self.floodable(levels[index])).ok_or_else(invalid)?;
      //Duplicate seeds keep the first label
      if labels[index] != BACKGROUND {
        continue;
      }
      labels[index] = idx + 1;
      if let Some(queue) = queue.as_mut() {
        queue.add(index, quantiser.apply(level))?;
      }
    }
    log::debug!("flooding {}D image with {} seeds", grid.shape.len(), seeds.len());

    //(3) drain the queue
    if let Some(mut queue) = queue {
      #[cfg(feature = "debug")]
      let mut perf = crate::performance_monitoring::PerfReport::new("flood");
      #[cfg(feature = "debug")]
      let start = std::time::Instant::now();
      #[cfg(feature = "progress")]
      let bar = crate::set_up_bar(queue.level_count(), "level");

      let mut buf = Vec::with_capacity(grid.offsets.len());
      while queue.has_next() {
        let index = queue.next()?;
        let current = queue.current_value();
        let label = labels[index];

        #[cfg(feature = "progress")]
        bar.set_position((queue.level_count() - 1 - queue.current_level()) as u64);
        #[cfg(feature = "debug")]
        {
          perf.items += 1;
        }

        grid.neighbours(index, &mut buf);
        for &neighbour in buf.iter() {
          if labels[neighbour] != BACKGROUND || !self.floodable(levels[neighbour]) {
            continue;
          }
          if let Some(level) = levels[neighbour] {
            labels[neighbour] = label;
            queue.add_checked(neighbour, quantiser.apply(level).min(current))?;
          }
        }
      }

      #[cfg(feature = "progress")]
      bar.finish_and_clear();
      #[cfg(feature = "debug")]
      {
        perf.pass_ms = start.elapsed().as_millis() as usize;
        perf.total_ms = perf.pass_ms;
        log::debug!("{perf}");
      }
    }

    //(4) drop small regions
    if self.minimum_area > 0 {
      remove_small_regions(&mut labels, seeds.len(), self.minimum_area);
    }

    //(5) reshape into a label map
    nd::Array::from_shape_vec(image.raw_dim(), labels).map_err(|_| LabelError::ShapeMismatch {
      expected: image.shape().to_vec(),
      found: grid.shape.clone(),
    })
  }
}

/// Clears every label with fewer than `minimum_area` pixels and renumbers the
/// rest densely, keeping their relative order
fn remove_small_regions(labels: &mut [usize], num_labels: usize, minimum_area: usize) {
  let mut areas = vec![0usize; num_labels + 1];
  labels.iter().for_each(|&label| areas[label] += 1);

  let mut renumbered = vec![BACKGROUND; num_labels + 1];
  let mut next = 0;
  for label in 1..=num_labels {
    if areas[label] >= minimum_area {
      next += 1;
      renumbered[label] = next;
    }
  }
  log::debug!("removed {} regions below {minimum_area} pixels", num_labels - next);

  labels.iter_mut().for_each(|label| *label = renumbered[*label]);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn neighbour_counts() {
    let face = Grid::new(&[3, 3, 3], Connectivity::Face);
    let full = Grid::new(&[3, 3, 3], Connectivity::Full);
    assert_eq!(face.offsets.len(), 6);
    assert_eq!(full.offsets.len(), 26);

    let mut buf = Vec::new();
    face.neighbours(13, &mut buf); //centre
    assert_eq!(buf.len(), 6);
    full.neighbours(0, &mut buf); //corner
    assert_eq!(buf.len(), 7);
  }

  #[test]
  fn linear_and_back() {
    let grid = Grid::new(&[2, 3, 4], Connectivity::Face);
    assert_eq!(grid.strides, vec![12, 4, 1]);
    assert_eq!(grid.linear(&[1, 2, 3]), Some(23));
    assert_eq!(grid.position(23), vec![1, 2, 3]);
    assert_eq!(grid.linear(&[2, 0, 0]), None);
    assert_eq!(grid.linear(&[0, 0]), None);
  }

  #[test]
  fn quantiser_keeps_order() {
    let narrow = Quantiser::new(-3, 10);
    assert_eq!(narrow.highest(), 10);
    assert_eq!(narrow.apply(-3), -3);
    assert_eq!(narrow.apply(7), 7);

    let wide = Quantiser::new(i64::MIN, i64::MAX);
    let top = i64::MIN + MAX_LEVEL_COUNT as i64 - 1;
    assert_eq!(wide.highest(), top);
    assert_eq!(wide.apply(i64::MIN), i64::MIN);
    assert_eq!(wide.apply(i64::MAX), top);
    let samples = [i64::MIN, -1 << 40, -1, 0, 1, 1 << 40, i64::MAX];
    for pair in samples.windows(2) {
      assert!(wide.apply(pair[0]) <= wide.apply(pair[1]));
    }
  }

  #[test]
  fn small_regions_are_removed() {
    let mut labels = vec![1, 1, 0, 2, 3, 3, 3, 0, 4, 4];
    remove_small_regions(&mut labels, 4, 2);
    assert_eq!(labels, vec![1, 1, 0, 0, 2, 2, 2, 0, 3, 3]);
  }
}
