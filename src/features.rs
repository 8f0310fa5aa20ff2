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
use num_traits::ToPrimitive;
use rayon::prelude::*;

use crate::analysis::{self, label_of, BoundingBox};
use crate::error::{check_shape, LabelError, Result};

/// Region features that a `LabelAnalyser` can measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
  /// Number of pixels of a label, multiplied by the physical size of a pixel
  AreaVolume,
  /// Mean value of the signal image within a label
  Mean,
}

impl Feature {
  pub const ALL: [Feature; 2] = [Feature::AreaVolume, Feature::Mean];
}

impl std::fmt::Display for Feature {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Feature::AreaVolume => write!(f, "Area / volume"),
      Feature::Mean => write!(f, "Mean average signal"),
    }
  }
}

////////////////////////////////////////////////////////////////////////////////
//                               FEATURE CACHE                                //
////////////////////////////////////////////////////////////////////////////////

/// Per-label feature arrays together with a validity flag.
///
/// The arrays are only ever replaced as a whole: `publish` sets all of them at
/// once and marks the cache valid, `invalidate` drops all of them. A stale cache
/// never hands out values.
#[derive(Debug, Clone, Default)]
pub struct FeatureCache {
  valid: bool,
  volumes: Option<Vec<f64>>,
  means: Option<Vec<f64>>,
}

impl FeatureCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_valid(&self) -> bool {
    self.valid
  }

  pub fn invalidate(&mut self) {
    self.valid = false;
    self.volumes = None;
    self.means = None;
  }

  pub fn publish(&mut self, volumes: Option<Vec<f64>>, means: Option<Vec<f64>>) {
    self.volumes = volumes;
    self.means = means;
    self.valid = true;
  }

  /// Returns the array for `feature`, or `None` if the cache is stale or the
  /// feature was not computed
  pub fn get(&self, feature: Feature) -> Option<&[f64]> {
    if !self.valid {
      return None;
    }
    match feature {
      Feature::AreaVolume => self.volumes.as_deref(),
      Feature::Mean => self.means.as_deref(),
    }
  }
}

////////////////////////////////////////////////////////////////////////////////
//                               LABEL ANALYSER                               //
////////////////////////////////////////////////////////////////////////////////

/// Builder for a `LabelAnalyser`.
///
/// By default all features are measured and every pixel has unit size. The
/// signal image type defaults to `f64` until a signal image is set.
#[derive(Debug, Clone)]
pub struct AnalyserBuilder<'a, L, S, D: nd::Dimension> {
  label_map: nd::ArrayView<'a, L, D>,
  signal: Option<nd::ArrayView<'a, S, D>>,
  voxel_size: Option<Vec<f64>>,
  features: Vec<Feature>,
}

impl<'a, L, D: nd::Dimension> AnalyserBuilder<'a, L, f64, D> {
  pub fn new(label_map: nd::ArrayView<'a, L, D>) -> Self {
    AnalyserBuilder { label_map, signal: None, voxel_size: None, features: Feature::ALL.to_vec() }
  }
}

impl<'a, L, S, D: nd::Dimension> AnalyserBuilder<'a, L, S, D> {
  /// Physical size of a pixel along each axis. Entries beyond the number of
  /// axes of the label map are ignored.
  pub fn set_voxel_size(mut self, voxel_size: &[f64]) -> Self {
    self.voxel_size = Some(voxel_size.to_vec());
    self
  }

  /// Features to measure. Features that are not in this list will be reported
  /// as absent by `LabelAnalyser::get_features`.
  pub fn set_features(mut self, features: &[Feature]) -> Self {
    self.features = features.to_vec();
    self
  }

  /// Signal image used for the `Mean` feature. Must have the same shape as
  /// the label map.
  pub fn set_signal_image<S2>(self, signal: nd::ArrayView<'a, S2, D>) -> AnalyserBuilder<'a, L, S2, D> {
    AnalyserBuilder {
      label_map: self.label_map,
      signal: Some(signal),
      voxel_size: self.voxel_size,
      features: self.features,
    }
  }

  pub fn build(self) -> Result<LabelAnalyser<'a, L, S, D>>
  where
    L: ToPrimitive + Sync,
    S: ToPrimitive + Sync,
  {
    let voxel_size = self.voxel_size.unwrap_or_else(|| vec![1.0; self.label_map.ndim()]);
    let mut analyser = LabelAnalyser::new(self.label_map, &voxel_size, &self.features)?;
    if let Some(signal) = self.signal {
      analyser.set_signal_image(signal)?;
    }
    Ok(analyser)
  }
}

/// Measures the features of all labels in a label map.
///
/// Features are computed lazily: nothing happens until the first call to
/// `get_features`. The results are cached until a new signal image is set,
/// after which the next call to `get_features` recomputes everything.
///
/// # Algorithm
/// The analyser first determines the bounding box of every label in a single
/// scan of the label map. It then computes the zero-order moments of each label
/// (pixel count and signal sum) by scanning *only* the bounding box of that
/// label. Labels are processed in parallel on the rayon thread pool; the
/// resulting arrays are published once every label has been processed.
///
/// # Output
/// `get_features` returns one value per label, indexed by `label - 1`, up to
/// the highest label in the label map. Labels that do not occur have a volume
/// of zero and a mean of `NaN`.
#[derive(Debug, Clone)]
pub struct LabelAnalyser<'a, L, S, D: nd::Dimension> {
  label_map: nd::ArrayView<'a, L, D>,
  signal: Option<nd::ArrayView<'a, S, D>>,
  voxel_size: Vec<f64>,
  features: Vec<Feature>,
  num_labels: usize,
  cache: FeatureCache,
}

impl<'a, L, S, D> LabelAnalyser<'a, L, S, D>
where
  L: ToPrimitive + Sync,
  S: ToPrimitive + Sync,
  D: nd::Dimension,
{
  /// Creates a new analyser without a signal image. Fails if `voxel_size` has
  /// fewer entries than the label map has axes.
  pub fn new(
    label_map: nd::ArrayView<'a, L, D>,
    voxel_size: &[f64],
    features: &[Feature],
  ) -> Result<Self> {
    let ndim = label_map.ndim();
    if voxel_size.len() < ndim {
      return Err(LabelError::VoxelSizeMismatch { ndim, found: voxel_size.len() });
    }
    let mut features = features.to_vec();
    features.sort();
    features.dedup();

    Ok(LabelAnalyser {
      label_map,
      signal: None,
      voxel_size: voxel_size[..ndim].to_vec(),
      features,
      num_labels: 0,
      cache: FeatureCache::new(),
    })
  }

  /// Attaches a (new) signal image and invalidates all cached features
  pub fn set_signal_image(&mut self, signal: nd::ArrayView<'a, S, D>) -> Result<()> {
    check_shape(self.label_map.shape(), signal.shape())?;
    self.signal = Some(signal);
    self.cache.invalidate();
    Ok(())
  }

  pub fn features(&self) -> &[Feature] {
    &self.features
  }

  pub fn voxel_size(&self) -> &[f64] {
    &self.voxel_size
  }

  /// True if the next call to `get_features` will recompute all features
  pub fn is_stale(&self) -> bool {
    !self.cache.is_valid()
  }

  /// Highest label in the label map (this triggers feature extraction)
  pub fn num_labels(&mut self) -> usize {
    self.extract_features();
    self.num_labels
  }

  /// Returns the values of `feature` for all labels. Returns `None` if the
  /// feature was not requested, or if `Mean` was requested without a signal
  /// image.
  pub fn get_features(&mut self, feature: Feature) -> Option<&[f64]> {
    self.extract_features();
    self.cache.get(feature)
  }

  fn extract_features(&mut self) {
    if self.cache.is_valid() {
      return;
    }
    self.cache.invalidate();

    #[cfg(feature = "debug")]
    let mut perf = crate::performance_monitoring::PerfReport::new("feature extraction");
    #[cfg(feature = "debug")]
    let start = std::time::Instant::now();

    //(1) Bounding boxes, in one scan of the full label map
    let boxes = analysis::bounding_boxes(self.label_map.view());
    self.num_labels = boxes.len();
    log::debug!("extracting {:?} for {} labels in {}D", self.features, self.num_labels, self.label_map.ndim());

    #[cfg(feature = "debug")]
    {
      perf.scan_ms = start.elapsed().as_millis() as usize;
      perf.items = self.num_labels;
    }

    let want_volume = self.features.contains(&Feature::AreaVolume);
    let want_mean = self.features.contains(&Feature::Mean);
    if want_mean && self.signal.is_none() {
      log::warn!("mean signal requested, but no signal image was set");
    }
    let signal = if want_mean { self.signal.clone() } else { None };

    //(2) Zero-order moments per label, restricted to each bounding box
    #[cfg(feature = "progress")]
    let bar = crate::set_up_bar(self.num_labels, "label");
    #[cfg(feature = "debug")]
    let pass_start = std::time::Instant::now();

    let label_map = self.label_map.view();
    let moments: Vec<(f64, f64)> = boxes
      .par_iter()
      .enumerate()
      .map(|(idx, bbox)| {
        let moment = match bbox {
          Some(bbox) => label_moments(&label_map, signal.as_ref(), idx + 1, bbox),
          None => (0.0, 0.0),
        };
        #[cfg(feature = "progress")]
        bar.inc(1);
        moment
      })
      .collect();

    #[cfg(feature = "progress")]
    bar.finish_and_clear();

    let empty = boxes.iter().filter(|bbox| bbox.is_none()).count();
    if empty > 0 {
      log::warn!("{empty} label(s) below the highest label do not occur in the label map");
    }

    //(3) Turn moments into features, then publish all of them at once
    let pixel_volume: f64 = self.voxel_size.iter().product();
    let volumes =
      want_volume.then(|| moments.iter().map(|&(count, _)| count * pixel_volume).collect());
    let means = signal.map(|_| moments.iter().map(|&(count, sum)| sum / count).collect());
    self.cache.publish(volumes, means);

    #[cfg(feature = "debug")]
    {
      perf.pass_ms = pass_start.elapsed().as_millis() as usize;
      perf.total_ms = start.elapsed().as_millis() as usize;
      log::debug!("{perf}");
    }
  }
}

/// Pixel count and signal sum of `label`, computed within its bounding box
fn label_moments<L, S, D>(
  label_map: &nd::ArrayView<L, D>,
  signal: Option<&nd::ArrayView<S, D>>,
  label: usize,
  bbox: &BoundingBox,
) -> (f64, f64)
where
  L: ToPrimitive,
  S: ToPrimitive,
  D: nd::Dimension,
{
  let labels = bbox.view_of(label_map);
  let mut count = 0.0;
  let mut sum = 0.0;

  match signal {
    Some(signal) => {
      nd::Zip::from(&labels).and(&bbox.view_of(signal)).for_each(|l, s| {
        if label_of(l) == Some(label) {
          count += 1.0;
          sum += s.to_f64().unwrap_or(f64::NAN);
        }
      });
    }
    None => labels.iter().filter(|&l| label_of(l) == Some(label)).for_each(|_| count += 1.0),
  }

  (count, sum)
}
