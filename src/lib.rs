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

#![doc(
  html_logo_url = "https://raw.githubusercontent.com/smups/rustronomy/main/logos/Rustronomy_ferris.png?raw=true"
)]
//! Rustronomy-labels turns grey-level images into label maps by priority-ordered
//! region growing, and measures the regions in those label maps.
//!
//! # Features
//! The crate consists of two parts that are normally used one after the other:
//! 1. A *hierarchical queue* (`HierarchicalQueue`), which hands out pixel indices
//! in strict level order without sorting. It drives the region-growing
//! (`FloodFill`) transform, which floods an image downwards from a set of seeds
//! and produces a label map.
//! 2. A *label analyser* (`LabelAnalyser`), which computes the bounding box,
//! volume and mean signal of every label in a label map. The `analysis` module
//! contains the stateless scans it is built from.
//!
//! All images are `ndarray` arrays of arbitrary dimensionality. Label maps may
//! have any numeric element type: values are truncated to integers, zero,
//! negative and non-finite values are treated as background.
//!
//! # Quickstart
//! To use the latest release of rustronomy-labels in a cargo project, add
//! the rustronomy-labels crate as a dependency to your `Cargo.toml` file:
//! ```toml
//! [dependencies]
//! rustronomy-labels = "0.1.0"
//! ```
//!
//! ## Short example: labelling and measuring the peaks of an image
//! Both the flood transform and the analyser are configured with the "builder
//! pattern". Configure them, call `build()`, and use the resulting object.
//! ```rust
//! use rustronomy_labels::prelude::*;
//! use ndarray as nd;
//!
//! //Two peaks separated by a valley
//! let img = nd::array![[1u8, 5, 1, 1, 7, 1], [1, 4, 1, 1, 6, 1]];
//! let flood = FloodBuilder::new().set_threshold(2).build();
//! let seeds = flood.find_local_maxima(img.view());
//! let labels = flood.flood(img.view(), &seeds).unwrap();
//!
//! let mut analyser = AnalyserBuilder::new(labels.view())
//!   .set_signal_image(img.view())
//!   .build()
//!   .unwrap();
//! assert_eq!(analyser.get_features(Feature::AreaVolume).unwrap(), &[2.0, 2.0]);
//! assert_eq!(analyser.get_features(Feature::Mean).unwrap(), &[4.5, 6.5]);
//! ```
//!
//! # Cargo feature gates
//! *By default, all features behind cargo feature gates are **disabled***
//! - `jemalloc`: this feature enables the [jemalloc allocator](https://jemalloc.net).
//! Jemalloc is enabled though usage of the `jemalloc` crate, which increases
//! compile times considerably. To compile `rustronomy-labels` with the
//! `jemalloc` feature, jemalloc must be installed on the host system.
//! - `progress`: this feature enables progress bars for the flood transform and
//! the feature extraction of the label analyser. Enabling this feature adds the
//! `indicatif` crate as a dependency.
//! - `debug`: this feature enables performance monitoring output, which is
//! emitted through the `log` crate at the `debug` level. Enabling this feature
//! does not add additional dependencies.

//Unconditional imports
pub mod analysis;
pub mod error;
pub mod features;
pub mod flood;
pub mod queue;

pub use analysis::{BoundingBox, Labeling};
pub use error::{LabelError, Result};
pub use features::{AnalyserBuilder, Feature, FeatureCache, LabelAnalyser};
pub use flood::{Connectivity, FloodBuilder, FloodFill};
pub use queue::{HierarchicalQueue, MAX_LEVEL_COUNT};

//Set Jemalloc as the global allocator for this crate
#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

//Constant for pixels that do not belong to any label
pub const BACKGROUND: usize = 0;

//Utility prelude for batch import
pub mod prelude {
  pub use crate::{
    analysis, AnalyserBuilder, Connectivity, Feature, FloodBuilder, FloodFill, HierarchicalQueue,
    LabelAnalyser, LabelError,
  };
}

////////////////////////////////////////////////////////////////////////////////
//                              HELPER FUNCTIONS                              //
////////////////////////////////////////////////////////////////////////////////

#[cfg(feature = "progress")]
pub(crate) fn set_up_bar(len: usize, what: &str) -> indicatif::ProgressBar {
  let template = format!("{{spinner}}[{{elapsed}}/{{duration}}] {what} {{pos}}/{{len}}{{bar:60}}");
  let bar = indicatif::ProgressBar::new(len as u64);
  match indicatif::ProgressStyle::with_template(&template) {
    Ok(style) => bar.set_style(style),
    Err(err) => log::warn!("could not set progress bar style: {err}"),
  }
  bar
}

////////////////////////////////////////////////////////////////////////////////
//                             OPTIONAL MODULES                               //
////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "debug")]
pub(crate) mod performance_monitoring {

  #[derive(Clone, Debug, Default)]
  pub struct PerfReport {
    pub task: &'static str,
    pub scan_ms: usize,
    pub pass_ms: usize,
    pub items: usize,
    pub total_ms: usize,
  }

  impl PerfReport {
    pub fn new(task: &'static str) -> Self {
      PerfReport { task, ..Default::default() }
    }

    pub fn per_item_us(&self) -> f64 {
      if self.items == 0 {
        0.0
      } else {
        1000.0 * self.pass_ms as f64 / self.items as f64
      }
    }
  }

  impl std::fmt::Display for PerfReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      writeln!(f, ">---------[Performance Summary: {}]---------", self.task)?;
      writeln!(f, ">  Scan: {}ms", self.scan_ms)?;
      writeln!(f, ">  Pass: {}ms over {} items ({:.1}µs each)", self.pass_ms, self.items, self.per_item_us())?;
      writeln!(f, ">--------------------------------+ total")?;
      writeln!(
        f,
        ">  {}ms with {}ms overhead (Δt)",
        self.total_ms,
        self.total_ms.saturating_sub(self.scan_ms + self.pass_ms)
      )
    }
  }
}
