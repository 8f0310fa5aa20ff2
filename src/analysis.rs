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

//! Stateless scans over label maps.
//!
//! Every function in this module that returns per-label data returns a dense
//! `Vec` indexed by `label - 1`, running up to the highest label present in the
//! label map. Labels below that maximum that do not occur in the map still get
//! an entry (`None` or a zero count).

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use ndarray as nd;
use nd::IntoDimension;
use num_traits::ToPrimitive;
use rayon::prelude::*;

use crate::error::{check_shape, Result};

/// Converts a label map value to a label id. Values are truncated towards zero;
/// zero, negative and non-finite values are background (`None`).
#[inline(always)]
pub fn label_of<T: ToPrimitive>(value: &T) -> Option<usize> {
  match value.to_i64() {
    Some(v) if v > 0 => Some(v as usize),
    _ => None,
  }
}

/// Returns the highest label id in the label map, or 0 if the map only
/// contains background.
pub fn max_label<T, D>(label_map: nd::ArrayView<T, D>) -> usize
where
  T: ToPrimitive + Sync,
  D: nd::Dimension,
{
  label_map.into_par_iter().filter_map(label_of).max().unwrap_or(0)
}

////////////////////////////////////////////////////////////////////////////////
//                              BOUNDING BOXES                                //
////////////////////////////////////////////////////////////////////////////////

/// Smallest axis-aligned box containing all pixels of a label. Both corners are
/// inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundingBox {
  pub min: Vec<usize>,
  pub max: Vec<usize>,
}

impl BoundingBox {
  /// A degenerate box containing only `position`
  pub fn new(position: &[usize]) -> Self {
    BoundingBox { min: position.to_vec(), max: position.to_vec() }
  }

  /// Grows the box such that it contains `position`
  #[inline]
  pub fn include(&mut self, position: &[usize]) {
    for (d, &x) in position.iter().enumerate() {
      if x < self.min[d] {
        self.min[d] = x;
      }
      if x > self.max[d] {
        self.max[d] = x;
      }
    }
  }

  pub fn ndim(&self) -> usize {
    self.min.len()
  }

  /// Extent of the box along each axis
  pub fn shape(&self) -> Vec<usize> {
    self.min.iter().zip(self.max.iter()).map(|(lo, hi)| hi - lo + 1).collect()
  }

  /// Number of pixels inside the box
  pub fn size(&self) -> usize {
    self.shape().iter().product()
  }

  pub fn contains(&self, position: &[usize]) -> bool {
    position.len() == self.ndim()
      && position
        .iter()
        .enumerate()
        .all(|(d, &x)| self.min[d] <= x && x <= self.max[d])
  }

  /// Closed coordinate interval per axis
  pub fn to_interval(&self) -> Vec<RangeInclusive<usize>> {
    self.min.iter().zip(self.max.iter()).map(|(&lo, &hi)| lo..=hi).collect()
  }

  /// Restricts `view` to the box. The box must fit inside the view.
  pub fn view_of<'a, A, D>(&self, view: &nd::ArrayView<'a, A, D>) -> nd::ArrayView<'a, A, D>
  where
    D: nd::Dimension,
  {
    let mut window = view.clone();
    window.slice_each_axis_inplace(|ax| {
      let d = ax.axis.index();
      nd::Slice::from(self.min[d]..self.max[d] + 1)
    });
    window
  }
}

/// Computes the bounding box of every label in a single pass over the label
/// map. Entry `i` belongs to label `i + 1`; labels that do not occur are `None`.
pub fn bounding_boxes<T, D>(label_map: nd::ArrayView<T, D>) -> Vec<Option<BoundingBox>>
where
  T: ToPrimitive,
  D: nd::Dimension,
{
  let mut boxes: Vec<Option<BoundingBox>> = Vec::new();

  for (idx, value) in label_map.indexed_iter() {
    let label = match label_of(value) {
      Some(label) => label,
      None => continue,
    };
    if label > boxes.len() {
      boxes.resize(label, None);
    }
    let position = idx.into_dimension();
    match &mut boxes[label - 1] {
      Some(bbox) => bbox.include(position.slice()),
      empty => *empty = Some(BoundingBox::new(position.slice())),
    }
  }

  boxes
}

/// Bounding boxes of all labels as closed coordinate intervals per axis
pub fn bounding_intervals<T, D>(
  label_map: nd::ArrayView<T, D>,
) -> Vec<Option<Vec<RangeInclusive<usize>>>>
where
  T: ToPrimitive,
  D: nd::Dimension,
{
  bounding_boxes(label_map).into_iter().map(|bbox| bbox.map(|bbox| bbox.to_interval())).collect()
}

////////////////////////////////////////////////////////////////////////////////
//                               PIXEL COUNTS                                 //
////////////////////////////////////////////////////////////////////////////////

/// Counts the number of pixels carrying each label. Entry `i` holds the count
/// of label `i + 1`.
pub fn pixel_counts<T, D>(label_map: nd::ArrayView<T, D>) -> Vec<usize>
where
  T: ToPrimitive + Sync,
  D: nd::Dimension,
{
  //(1) find the highest label, which fixes the length of the output
  let mut counts = vec![0usize; max_label(label_map.view())];

  //(2) tally
  label_map.iter().filter_map(label_of).for_each(|label| counts[label - 1] += 1);
  counts
}

////////////////////////////////////////////////////////////////////////////////
//                              SPARSE LABELING                               //
////////////////////////////////////////////////////////////////////////////////

/// Label map with an index from each label to the positions it occupies.
///
/// Made with the `labeling()` function. Useful when one has to visit the pixels
/// of a few labels many times, for instance to sample a signal image per label.
#[derive(Debug, Clone)]
pub struct Labeling<D: nd::Dimension> {
  ids: nd::Array<usize, D>,
  regions: BTreeMap<usize, Vec<D>>,
}

/// Builds a `Labeling` from a dense label map. Every non-background position is
/// annotated with its label id.
pub fn labeling<T, D>(label_map: nd::ArrayView<T, D>) -> Labeling<D>
where
  T: ToPrimitive,
  D: nd::Dimension,
{
  let ids = label_map.map(|value| label_of(value).unwrap_or(crate::BACKGROUND));
  let mut regions: BTreeMap<usize, Vec<D>> = BTreeMap::new();
  for (idx, &label) in ids.indexed_iter() {
    if label != crate::BACKGROUND {
      regions.entry(label).or_default().push(idx.into_dimension());
    }
  }
  Labeling { ids, regions }
}

impl<D: nd::Dimension> Labeling<D> {
  /// Dense label id image
  pub fn ids(&self) -> nd::ArrayView<usize, D> {
    self.ids.view()
  }

  /// All labels that occur at least once, in ascending order
  pub fn labels(&self) -> impl Iterator<Item = usize> + '_ {
    self.regions.keys().copied()
  }

  /// Number of distinct labels
  pub fn num_labels(&self) -> usize {
    self.regions.len()
  }

  /// Positions of `label`, in logical (row-major) order
  pub fn region(&self, label: usize) -> Option<&[D]> {
    self.regions.get(&label).map(|positions| positions.as_slice())
  }

  pub fn region_size(&self, label: usize) -> usize {
    self.regions.get(&label).map_or(0, |positions| positions.len())
  }

  /// Values of `signal` at the positions of `label`. Empty if the label does
  /// not occur.
  pub fn sample<S: Clone>(&self, label: usize, signal: nd::ArrayView<S, D>) -> Result<Vec<S>> {
    check_shape(self.ids.shape(), signal.shape())?;
    Ok(match self.regions.get(&label) {
      Some(positions) => positions.iter().map(|pos| signal[pos.clone()].clone()).collect(),
      None => Vec::new(),
    })
  }

  /// Smallest and largest value of `signal` within `label`, or `None` if the
  /// label does not occur. Incomparable values (NaN) are skipped.
  pub fn min_max<S>(&self, label: usize, signal: nd::ArrayView<S, D>) -> Result<Option<(S, S)>>
  where
    S: PartialOrd + Copy,
  {
    let samples = self.sample(label, signal)?;
    Ok(samples.into_iter().fold(None, |acc, x| match acc {
      None if x.partial_cmp(&x).is_some() => Some((x, x)),
      None => None,
      Some((lo, hi)) => Some((if x < lo { x } else { lo }, if x > hi { x } else { hi })),
    }))
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                COMPARISON                                  //
////////////////////////////////////////////////////////////////////////////////

/// Element-wise comparison of two feature arrays. Arrays of different length
/// are never close. Two NaN entries are considered equal, one NaN is not.
pub fn all_close(a: &[f64], b: &[f64], tolerance: f64) -> bool {
  a.len() == b.len()
    && a.iter().zip(b.iter()).all(|(&x, &y)| {
      if x.is_nan() || y.is_nan() {
        x.is_nan() && y.is_nan()
      } else {
        (x - y).abs() <= tolerance
      }
    })
}
