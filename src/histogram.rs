// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Binning of a distance histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Binning {
    /// Bin width in Å
    #[validate(range(exclusive_min = 0.0))]
    pub bin_width: f64,
    /// Upper bound of the last bin in Å
    #[validate(range(exclusive_min = 0.0))]
    pub max_distance: f64,
}

impl Default for Binning {
    fn default() -> Self {
        Self {
            bin_width: 1.0,
            max_distance: 100.0,
        }
    }
}

/// Distance histogram with uniform bin widths starting at zero.
///
/// Bins span `[0, num_bins * bin_width)` where `num_bins = floor(max_distance / bin_width)`.
/// Partial trailing bins are excluded to keep all bins the same width. Distances beyond
/// the last bin are counted as overflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceHistogram {
    bin_width: f64,
    counts: Vec<usize>,
    overflow: usize,
}

impl DistanceHistogram {
    pub fn new(binning: &Binning) -> anyhow::Result<Self> {
        binning.validate()?;
        let num_bins = (binning.max_distance / binning.bin_width) as usize;
        if num_bins == 0 {
            anyhow::bail!(
                "Maximum distance {} is below the bin width {}",
                binning.max_distance,
                binning.bin_width
            );
        }
        Ok(Self {
            bin_width: binning.bin_width,
            counts: vec![0; num_bins],
            overflow: 0,
        })
    }

    /// Histogram of a list of distances
    pub fn from_distances(
        binning: &Binning,
        distances: impl IntoIterator<Item = f64>,
    ) -> anyhow::Result<Self> {
        let mut histogram = Self::new(binning)?;
        distances.into_iter().for_each(|d| histogram.add(d));
        Ok(histogram)
    }

    /// Count a distance. Negative and non-finite values are ignored.
    pub fn add(&mut self, distance: f64) {
        if !distance.is_finite() || distance < 0.0 {
            return;
        }
        match self.counts.get_mut((distance / self.bin_width) as usize) {
            Some(count) => *count += 1,
            None => self.overflow += 1,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Center of the i-th bin
    pub fn bin_center(&self, i: usize) -> f64 {
        (i as f64 + 0.5) * self.bin_width
    }

    pub fn count(&self, i: usize) -> usize {
        self.counts[i]
    }

    /// Distances beyond the last bin
    pub fn overflow(&self) -> usize {
        self.overflow
    }

    /// All counted distances, including overflow
    pub fn total(&self) -> usize {
        self.counts.iter().sum::<usize>() + self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn binning(bin_width: f64, max_distance: f64) -> Binning {
        Binning {
            bin_width,
            max_distance,
        }
    }

    #[test]
    fn basic_binning() {
        let mut h = DistanceHistogram::new(&binning(1.0, 10.0)).unwrap();
        assert_eq!(h.num_bins(), 10);
        assert_relative_eq!(h.bin_center(0), 0.5);
        assert_relative_eq!(h.bin_center(9), 9.5);

        h.add(0.0);
        h.add(0.9);
        h.add(5.5);
        assert_eq!(h.count(0), 2);
        assert_eq!(h.count(5), 1);
    }

    #[test]
    fn overflow_and_invalid() {
        let h = DistanceHistogram::from_distances(
            &binning(1.0, 10.0),
            [-0.1, 10.0, 100.0, f64::NAN, 2.5],
        )
        .unwrap();
        assert_eq!(h.overflow(), 2);
        assert_eq!(h.total(), 3);
        assert_eq!(h.count(2), 1);
    }

    #[test]
    fn partial_last_bin_excluded() {
        // 10.5 / 2.0 = 5.25 → 5 full bins, effective max = 10.0
        let mut h = DistanceHistogram::new(&binning(2.0, 10.5)).unwrap();
        assert_eq!(h.num_bins(), 5);
        h.add(10.0);
        assert_eq!(h.overflow(), 1);
    }

    #[test]
    fn invalid_binning() {
        assert!(DistanceHistogram::new(&binning(0.0, 10.0)).is_err());
        assert!(DistanceHistogram::new(&binning(2.0, 1.0)).is_err());
        assert!(DistanceHistogram::new(&binning(1.0, -3.0)).is_err());
    }

    #[test]
    fn default_binning_is_empty() {
        let h = DistanceHistogram::new(&Binning::default()).unwrap();
        assert_eq!(h.num_bins(), 100);
        assert_eq!(h.total(), 0);
    }
}
