//! Region statistics: extremes, mean, sum, nearest-rank percentiles and histograms.
//!
//! # Percentiles
//!
//! Percentiles use zero-based nearest rank over the sorted values, without
//! interpolation: `median = sorted[n/2]`, `p10 = sorted[floor(n*0.1)]`,
//! `p90 = sorted[floor(n*0.9)]`. Displayed statistics depend on this exact rule.
//!
//! # Histograms
//!
//! Values are binned against an explicit display domain `[lo, hi]`, which is
//! independent of the data's own range:
//!
//! ```text
//! bin = clamp(floor((v - lo) / (hi - lo) * (nbins - 1)), 0, nbins - 1)
//! ```
//!
//! Out-of-domain values land in the edge bins, so every value is counted exactly
//! once. A degenerate domain (`hi <= lo`) is widened to `hi = lo + 1`.
//!
//! # NaN pixels
//!
//! Floating-point frames may carry NaN. Such pixels are not values: they are left
//! out of every statistic, the count and the histogram, so `sum(bins) == count`
//! and the percentile ordering hold for the remaining pixels.

use serde::{Deserialize, Serialize};

use crate::pixel_view::PixelView;
use crate::region::Region;

/// Display histogram size used when none is configured.
pub const DEFAULT_HIST_BINS: usize = 256;

/// Fixed-bin histogram over an explicit value domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Value mapped to bin 0.
    pub domain_lo: f64,
    /// Value mapped to the last bin.
    pub domain_hi: f64,
    /// Counts per bin.
    pub bins: Vec<u32>,
}

impl Histogram {
    /// Empty histogram with `nbins` bins over `[lo, hi]` (normalized).
    pub fn new(lo: f64, hi: f64, nbins: usize) -> Self {
        debug_assert!(nbins > 0, "histogram needs at least one bin");
        let (domain_lo, domain_hi) = normalize_domain(lo, hi);
        Self {
            domain_lo,
            domain_hi,
            bins: vec![0; nbins],
        }
    }

    /// Clear all counts and move to a new domain, keeping the allocation.
    pub fn reset(&mut self, lo: f64, hi: f64) {
        let (domain_lo, domain_hi) = normalize_domain(lo, hi);
        self.domain_lo = domain_lo;
        self.domain_hi = domain_hi;
        self.bins.fill(0);
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Whether there are no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin that `value` falls into. NaN goes to bin 0.
    #[must_use]
    pub fn bin_index(&self, value: f64) -> usize {
        let n = self.bins.len();
        if n <= 1 {
            return 0;
        }
        let last = (n - 1) as f64;
        let pos = (value - self.domain_lo) / (self.domain_hi - self.domain_lo) * last;
        if pos.is_nan() || pos <= 0.0 {
            0
        } else if pos >= last {
            n - 1
        } else {
            pos.floor() as usize
        }
    }

    /// Count one value.
    #[inline]
    pub fn add(&mut self, value: f64) {
        let idx = self.bin_index(value);
        if let Some(bin) = self.bins.get_mut(idx) {
            *bin = bin.saturating_add(1);
        }
    }

    /// Sum of all bin counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.bins.iter().map(|&c| u64::from(c)).sum()
    }

    /// Largest bin count.
    #[must_use]
    pub fn max_count(&self) -> u32 {
        self.bins.iter().copied().max().unwrap_or(0)
    }

    /// Value represented by bin `index`.
    ///
    /// This is the inverse of [`Histogram::bin_index`] at bin boundaries: bin 0 maps
    /// to `domain_lo` and the last bin to `domain_hi`.
    #[must_use]
    pub fn bin_value(&self, index: usize) -> f64 {
        let n = self.bins.len();
        if n <= 1 {
            return self.domain_lo;
        }
        self.domain_lo + index as f64 / (n - 1) as f64 * (self.domain_hi - self.domain_lo)
    }

    /// Value at which the cumulative count first reaches `fraction` of the total.
    ///
    /// Returns `None` for an empty histogram.
    #[must_use]
    pub fn value_at_fraction(&self, fraction: f64) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let target = total as f64 * fraction.clamp(0.0, 1.0);
        let mut cumulative = 0u64;
        for (i, &count) in self.bins.iter().enumerate() {
            cumulative += u64::from(count);
            if cumulative > 0 && cumulative as f64 >= target {
                return Some(self.bin_value(i));
            }
        }
        Some(self.domain_hi)
    }
}

/// Widen a degenerate or non-finite domain to something binnable.
#[must_use]
pub fn normalize_domain(lo: f64, hi: f64) -> (f64, f64) {
    let lo = if lo.is_finite() { lo } else { 0.0 };
    if hi.is_finite() && hi > lo {
        (lo, hi)
    } else {
        (lo, lo + 1.0)
    }
}

/// Statistics of one region of one frame.
///
/// An empty snapshot (`count == 0`) has every scalar set to NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Nearest-rank median.
    pub median: f64,
    /// Nearest-rank 10th percentile.
    pub p10: f64,
    /// Nearest-rank 90th percentile.
    pub p90: f64,
    /// Sum of values.
    pub sum: f64,
    /// Number of values.
    pub count: u64,
    /// Values binned over the display domain.
    pub histogram: Histogram,
}

impl StatsSnapshot {
    /// The "no statistics available" snapshot.
    pub fn empty(nbins: usize) -> Self {
        Self {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            median: f64::NAN,
            p10: f64::NAN,
            p90: f64::NAN,
            sum: f64::NAN,
            count: 0,
            histogram: Histogram::new(0.0, 1.0, nbins.max(1)),
        }
    }

    /// Whether the region held no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Minimum and maximum over `region`, or `None` when it holds no comparable value.
///
/// Single pass, no allocation.
#[must_use]
pub fn scan_extremes(view: &PixelView<'_>, region: &Region) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    view.for_each_in(region, |v| {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    });
    (min <= max).then_some((min, max))
}

/// Histogram of `region` over `[lo, hi]` with `nbins` bins.
#[must_use]
pub fn region_histogram(
    view: &PixelView<'_>,
    region: &Region,
    lo: f64,
    hi: f64,
    nbins: usize,
) -> Histogram {
    let mut hist = Histogram::new(lo, hi, nbins);
    view.for_each_in(region, |v| {
        if !v.is_nan() {
            hist.add(v);
        }
    });
    hist
}

/// Full statistics engine with a reusable sort buffer.
///
/// The scratch buffer grows to the largest region seen and is never shrunk, so
/// steady-state updates on a fixed ROI do not allocate for the sort.
#[derive(Debug)]
pub struct StatsEngine {
    scratch: Vec<f64>,
    hist_bins: usize,
}

impl Default for StatsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_HIST_BINS)
    }
}

impl StatsEngine {
    /// Engine producing histograms of `hist_bins` bins.
    pub fn new(hist_bins: usize) -> Self {
        debug_assert!(hist_bins > 0, "histogram needs at least one bin");
        Self {
            scratch: Vec::new(),
            hist_bins: hist_bins.max(1),
        }
    }

    /// Bins per histogram.
    #[must_use]
    pub fn hist_bins(&self) -> usize {
        self.hist_bins
    }

    /// Current capacity of the sort buffer, in values.
    #[must_use]
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Compute every statistic of `region`, binning against `domain`.
    pub fn full_stats(
        &mut self,
        view: &PixelView<'_>,
        region: &Region,
        domain: (f64, f64),
    ) -> StatsSnapshot {
        let region = region.clamped(view.width(), view.height());
        if region.is_empty() {
            return StatsSnapshot::empty(self.hist_bins);
        }

        let scratch = &mut self.scratch;
        scratch.clear();
        scratch.reserve(region.area() as usize);

        let mut histogram = Histogram::new(domain.0, domain.1, self.hist_bins);
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        view.for_each_in(&region, |v| {
            if v.is_nan() {
                return;
            }
            scratch.push(v);
            sum += v;
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
            histogram.add(v);
        });

        let n = scratch.len();
        if n == 0 {
            // Only NaNs
            return StatsSnapshot::empty(self.hist_bins);
        }

        scratch.sort_unstable_by(f64::total_cmp);
        let rank = |fraction: f64| ((n as f64 * fraction) as usize).min(n - 1);

        tracing::trace!(count = n, min, max, "region statistics computed");

        StatsSnapshot {
            min,
            max,
            mean: sum / n as f64,
            median: scratch[n / 2],
            p10: scratch[rank(0.1)],
            p90: scratch[rank(0.9)],
            sum,
            count: n as u64,
            histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameDescriptor, PixelKind};

    fn u16_bytes(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn f64_bytes(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn test_percentiles_are_nearest_rank() {
        // Deliberately unsorted 0..9
        let bytes = u16_bytes(&[7, 2, 9, 0, 5, 3, 8, 1, 6, 4]);
        let desc = FrameDescriptor::new(10, 1, PixelKind::U16, &bytes);
        let view = PixelView::new(&desc).unwrap();

        let mut engine = StatsEngine::new(16);
        let s = engine.full_stats(&view, &view.full_region(), (0.0, 9.0));

        assert_eq!(s.count, 10);
        assert_eq!(s.median, 5.0);
        assert_eq!(s.p10, 1.0);
        assert_eq!(s.p90, 9.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 9.0);
        assert_eq!(s.sum, 45.0);
        assert_eq!(s.mean, 4.5);
    }

    #[test]
    fn test_single_pixel_region() {
        let bytes = f64_bytes(&[1.0, -3.5, 2.0, 4.0]);
        let desc = FrameDescriptor::new(2, 2, PixelKind::F64, &bytes);
        let view = PixelView::new(&desc).unwrap();

        let mut engine = StatsEngine::default();
        let s = engine.full_stats(&view, &Region::new(1, 0, 1, 0), (0.0, 1.0));
        assert_eq!(s.count, 1);
        assert_eq!((s.min, s.max, s.median, s.p10, s.p90), (-3.5, -3.5, -3.5, -3.5, -3.5));
        assert_eq!(s.histogram.total(), 1);
        assert_eq!(s.histogram.bins[0], 1);
    }

    #[test]
    fn test_empty_region_short_circuits() {
        let bytes = u16_bytes(&[1, 2, 3, 4]);
        let desc = FrameDescriptor::new(2, 2, PixelKind::U16, &bytes);
        let view = PixelView::new(&desc).unwrap();

        let mut engine = StatsEngine::new(8);
        let s = engine.full_stats(&view, &Region::new(5, 5, 9, 9), (0.0, 4.0));
        assert!(s.is_empty());
        assert!(s.min.is_nan() && s.mean.is_nan() && s.median.is_nan());
        assert_eq!(s.histogram.bins.len(), 8);
        assert_eq!(s.histogram.total(), 0);
        assert_eq!(engine.scratch_capacity(), 0);
    }

    #[test]
    fn test_degenerate_domain_normalized() {
        let bytes = u16_bytes(&[5, 5, 5, 6]);
        let desc = FrameDescriptor::new(4, 1, PixelKind::U16, &bytes);
        let view = PixelView::new(&desc).unwrap();

        let mut engine = StatsEngine::new(4);
        let s = engine.full_stats(&view, &view.full_region(), (5.0, 5.0));
        assert_eq!(s.histogram.domain_lo, 5.0);
        assert_eq!(s.histogram.domain_hi, 6.0);
        assert_eq!(s.histogram.total(), 4);
        assert_eq!(s.histogram.bins, vec![3, 0, 0, 1]);

        let s = engine.full_stats(&view, &view.full_region(), (10.0, 2.0));
        assert_eq!(s.histogram.domain_hi, 11.0);
        assert_eq!(s.histogram.total(), 4);
    }

    #[test]
    fn test_nan_pixels_are_skipped() {
        let values = [f32::NAN, f32::NAN, 1.0, 2.0, 3.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let desc = FrameDescriptor::new(5, 1, PixelKind::F32, &bytes);
        let view = PixelView::new(&desc).unwrap();

        let mut engine = StatsEngine::new(4);
        let s = engine.full_stats(&view, &view.full_region(), (0.0, 3.0));
        assert_eq!(s.count, 3);
        assert_eq!((s.min, s.max), (1.0, 3.0));
        assert_eq!((s.p10, s.median, s.p90), (1.0, 2.0, 3.0));
        assert_eq!(s.sum, 6.0);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.histogram.total(), 3);
        assert_eq!(s.histogram.bins[0], 0);

        let hist = region_histogram(&view, &view.full_region(), 0.0, 3.0, 4);
        assert_eq!(hist.total(), 3);

        // A region holding only NaN has no statistics
        let s = engine.full_stats(&view, &Region::new(0, 0, 1, 0), (0.0, 3.0));
        assert!(s.is_empty());
        assert!(s.median.is_nan());
    }

    #[test]
    fn test_out_of_domain_values_clamped_to_edges() {
        let hist = Histogram::new(0.0, 10.0, 11);
        assert_eq!(hist.bin_index(-100.0), 0);
        assert_eq!(hist.bin_index(100.0), 10);
        assert_eq!(hist.bin_index(f64::NAN), 0);
        assert_eq!(hist.bin_index(4.0), 4);
    }

    #[test]
    fn test_scratch_buffer_grow_only() {
        let bytes = u16_bytes(&(0..64).collect::<Vec<_>>());
        let desc = FrameDescriptor::new(8, 8, PixelKind::U16, &bytes);
        let view = PixelView::new(&desc).unwrap();

        let mut engine = StatsEngine::new(8);
        engine.full_stats(&view, &view.full_region(), (0.0, 63.0));
        let grown = engine.scratch_capacity();
        assert!(grown >= 64);

        engine.full_stats(&view, &Region::new(0, 0, 1, 1), (0.0, 63.0));
        assert_eq!(engine.scratch_capacity(), grown);
    }

    #[test]
    fn test_scan_extremes() {
        let bytes = f64_bytes(&[3.0, f64::NAN, -1.0, 8.0]);
        let desc = FrameDescriptor::new(4, 1, PixelKind::F64, &bytes);
        let view = PixelView::new(&desc).unwrap();

        assert_eq!(scan_extremes(&view, &view.full_region()), Some((-1.0, 8.0)));
        assert_eq!(scan_extremes(&view, &Region::new(1, 0, 1, 0)), None);
        assert_eq!(scan_extremes(&view, &Region::new(9, 9, 9, 9)), None);
    }

    #[test]
    fn test_value_at_fraction() {
        // One value per bin: bin i holds exactly i
        let mut hist = Histogram::new(0.0, 64.0, 65);
        for v in 0..64 {
            hist.add(f64::from(v));
        }
        assert_eq!(hist.value_at_fraction(0.01), Some(0.0));
        assert_eq!(hist.value_at_fraction(0.25), Some(15.0));
        assert_eq!(hist.value_at_fraction(0.99), Some(63.0));
        assert_eq!(Histogram::new(0.0, 1.0, 4).value_at_fraction(0.5), None);
    }

    #[test]
    fn test_reset_keeps_bins() {
        let mut hist = Histogram::new(0.0, 1.0, 4);
        hist.add(0.5);
        hist.reset(3.0, 3.0);
        assert_eq!(hist.total(), 0);
        assert_eq!(hist.len(), 4);
        assert_eq!((hist.domain_lo, hist.domain_hi), (3.0, 4.0));
    }
}
