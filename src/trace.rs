//! Rolling time-series history of region statistics.
//!
//! [`TraceRecorder`] is a fixed-capacity ring: all storage is allocated up front
//! and, once full, each push overwrites the oldest sample. Scalars and histogram
//! counts live in two flat arrays indexed by slot so a push never allocates.
//!
//! Queries are over trailing time windows: `window(d)` returns every sample with
//! `t >= latest.t - d`, oldest first. Timestamps are expected to be non-decreasing.
//!
//! For a sampler/UI thread split use [`SharedTraceRecorder`], whose queries copy
//! samples out under the read lock so no borrow outlives a concurrent push.

use std::mem::size_of;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::limits::{
    trace_storage_bytes, MAX_HIST_BINS, MAX_TRACE_BYTES, MAX_TRACE_CAPACITY,
    TRACE_SLOT_SCALAR_BYTES,
};
use crate::stats::{normalize_domain, Histogram, StatsSnapshot};

/// Reference capacity: 100 minutes at 60 samples per second.
pub const DEFAULT_TRACE_CAPACITY: usize = 360_000;

/// Bins kept per histogram snapshot.
pub const DEFAULT_TRACE_HIST_BINS: usize = 256;

/// Trailing window shown by default, in seconds.
pub const DEFAULT_TRACE_WINDOW_SECS: f64 = 60.0;

/// One recorded cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    /// Seconds since the recorder started.
    pub t: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// 10th percentile.
    pub p10: f64,
    /// 90th percentile.
    pub p90: f64,
    /// Histogram of the region.
    pub hist: Histogram,
}

impl TraceSample {
    /// Sample the scalars of `snapshot` at time `t` with an explicit histogram.
    pub fn from_snapshot(t: f64, snapshot: &StatsSnapshot, hist: Histogram) -> Self {
        Self {
            t,
            min: snapshot.min,
            max: snapshot.max,
            mean: snapshot.mean,
            median: snapshot.median,
            p10: snapshot.p10,
            p90: snapshot.p90,
            hist,
        }
    }

    /// The scalar selected by `field`.
    #[must_use]
    pub fn value(&self, field: TraceField) -> f64 {
        match field {
            TraceField::Min => self.min,
            TraceField::Max => self.max,
            TraceField::Mean => self.mean,
            TraceField::Median => self.median,
            TraceField::P10 => self.p10,
            TraceField::P90 => self.p90,
        }
    }
}

/// Scalar series available for line traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceField {
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Mean value.
    Mean,
    /// Median value.
    Median,
    /// 10th percentile.
    P10,
    /// 90th percentile.
    P90,
}

impl TraceField {
    /// Every series, in legend order.
    pub const ALL: [TraceField; 6] = [
        Self::Min,
        Self::Max,
        Self::Mean,
        Self::Median,
        Self::P10,
        Self::P90,
    ];

    /// Legend label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::P10 => "p10",
            Self::P90 => "p90",
        }
    }
}

/// `[t, value]` points of one scalar series, ready for a line plot.
#[must_use]
pub fn series(samples: &[TraceSample], field: TraceField) -> Vec<[f64; 2]> {
    samples.iter().map(|s| [s.t, s.value(field)]).collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotScalars {
    t: f64,
    min: f64,
    max: f64,
    mean: f64,
    median: f64,
    p10: f64,
    p90: f64,
    domain_lo: f64,
    domain_hi: f64,
}

/// Largest capacity whose storage fits the limits for `hist_bins` (1..=MAX_HIST_BINS).
fn max_capacity_for(hist_bins: usize) -> usize {
    let per_slot = hist_bins * size_of::<u32>() + TRACE_SLOT_SCALAR_BYTES;
    (MAX_TRACE_BYTES / per_slot).min(MAX_TRACE_CAPACITY)
}

/// Borrowed view of a stored sample, valid until the next push.
#[derive(Debug, Clone, Copy)]
pub struct TraceSampleRef<'a> {
    /// Seconds since the recorder started.
    pub t: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// 10th percentile.
    pub p10: f64,
    /// 90th percentile.
    pub p90: f64,
    /// Lower histogram domain.
    pub domain_lo: f64,
    /// Upper histogram domain.
    pub domain_hi: f64,
    /// Histogram counts.
    pub bins: &'a [u32],
}

impl TraceSampleRef<'_> {
    /// Owned copy.
    #[must_use]
    pub fn to_sample(&self) -> TraceSample {
        TraceSample {
            t: self.t,
            min: self.min,
            max: self.max,
            mean: self.mean,
            median: self.median,
            p10: self.p10,
            p90: self.p90,
            hist: Histogram {
                domain_lo: self.domain_lo,
                domain_hi: self.domain_hi,
                bins: self.bins.to_vec(),
            },
        }
    }
}

/// Fixed-capacity ring of trace samples.
#[derive(Debug)]
pub struct TraceRecorder {
    capacity: usize,
    hist_bins: usize,
    head: usize,
    count: usize,
    scalars: Vec<SlotScalars>,
    hist: Vec<u32>,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY, DEFAULT_TRACE_HIST_BINS)
    }
}

impl TraceRecorder {
    /// Allocate storage for `capacity` samples of `hist_bins` bins each.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ViewerError::TraceTooLarge`] when the storage would exceed the
    /// limits in [`crate::limits`].
    pub fn try_new(capacity: usize, hist_bins: usize) -> AppResult<Self> {
        let bytes = trace_storage_bytes(capacity, hist_bins)?;
        tracing::debug!(capacity, hist_bins, bytes, "allocating trace storage");
        Ok(Self::allocate(capacity, hist_bins))
    }

    /// Like [`TraceRecorder::try_new`], but shrinks the request to fit the limits.
    ///
    /// Zero sizes become 1; a capacity too large for `hist_bins` is reduced to the
    /// largest one that fits.
    pub fn new(capacity: usize, hist_bins: usize) -> Self {
        let hist_bins = hist_bins.clamp(1, MAX_HIST_BINS);
        let clamped = capacity.clamp(1, max_capacity_for(hist_bins));
        if clamped != capacity {
            tracing::warn!(requested = capacity, capacity = clamped, "trace capacity clamped");
        }
        Self::allocate(clamped, hist_bins)
    }

    fn allocate(capacity: usize, hist_bins: usize) -> Self {
        Self {
            capacity,
            hist_bins,
            head: 0,
            count: 0,
            scalars: vec![SlotScalars::default(); capacity],
            hist: vec![0; capacity * hist_bins],
        }
    }

    /// Samples kept before overwriting.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bins per stored histogram.
    #[must_use]
    pub fn hist_bins(&self) -> usize {
        self.hist_bins
    }

    /// Samples stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forget all samples, keeping the allocation.
    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    /// Append a sample, overwriting the oldest once full.
    ///
    /// A histogram with a different bin count is truncated or zero-padded to
    /// [`TraceRecorder::hist_bins`].
    pub fn push(&mut self, sample: &TraceSample) {
        let slot = self.head;
        self.scalars[slot] = SlotScalars {
            t: sample.t,
            min: sample.min,
            max: sample.max,
            mean: sample.mean,
            median: sample.median,
            p10: sample.p10,
            p90: sample.p90,
            domain_lo: sample.hist.domain_lo,
            domain_hi: sample.hist.domain_hi,
        };

        let dst = &mut self.hist[slot * self.hist_bins..(slot + 1) * self.hist_bins];
        let n = sample.hist.bins.len().min(self.hist_bins);
        dst[..n].copy_from_slice(&sample.hist.bins[..n]);
        dst[n..].fill(0);

        self.head = (self.head + 1) % self.capacity;
        self.count = (self.count + 1).min(self.capacity);
    }

    fn slot_of(&self, logical: usize) -> usize {
        (self.head + self.capacity - self.count + logical) % self.capacity
    }

    fn sample_ref(&self, slot: usize) -> TraceSampleRef<'_> {
        let s = &self.scalars[slot];
        TraceSampleRef {
            t: s.t,
            min: s.min,
            max: s.max,
            mean: s.mean,
            median: s.median,
            p10: s.p10,
            p90: s.p90,
            domain_lo: s.domain_lo,
            domain_hi: s.domain_hi,
            bins: &self.hist[slot * self.hist_bins..(slot + 1) * self.hist_bins],
        }
    }

    /// Sample `index` counted from the oldest stored one.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<TraceSampleRef<'_>> {
        (index < self.count).then(|| self.sample_ref(self.slot_of(index)))
    }

    /// Newest sample.
    #[must_use]
    pub fn latest(&self) -> Option<TraceSampleRef<'_>> {
        self.count.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Number of trailing samples with `t >= latest.t - duration`.
    fn window_len(&self, duration: f64) -> usize {
        let Some(latest) = self.latest() else {
            return 0;
        };
        // NaN counts as a zero-length window
        let cutoff = latest.t - duration.max(0.0);

        let mut n = 0;
        while n < self.count {
            let slot = self.slot_of(self.count - 1 - n);
            if self.scalars[slot].t < cutoff {
                break;
            }
            n += 1;
        }
        n
    }

    /// Borrowing iterator over the trailing `duration` seconds, oldest first.
    pub fn iter_window(&self, duration: f64) -> impl Iterator<Item = TraceSampleRef<'_>> + '_ {
        let n = self.window_len(duration);
        (self.count - n..self.count).map(move |i| self.sample_ref(self.slot_of(i)))
    }

    /// Owned copies of the trailing `duration` seconds, oldest first.
    ///
    /// A duration longer than the recorded span returns every stored sample.
    #[must_use]
    pub fn window(&self, duration: f64) -> Vec<TraceSample> {
        self.iter_window(duration).map(|s| s.to_sample()).collect()
    }
}

/// Cloneable handle to a recorder shared between threads.
#[derive(Debug, Clone)]
pub struct SharedTraceRecorder {
    inner: Arc<RwLock<TraceRecorder>>,
}

impl SharedTraceRecorder {
    /// Recorder sized as by [`TraceRecorder::new`].
    pub fn new(capacity: usize, hist_bins: usize) -> Self {
        Self::from_recorder(TraceRecorder::new(capacity, hist_bins))
    }

    /// Share an existing recorder.
    pub fn from_recorder(recorder: TraceRecorder) -> Self {
        Self {
            inner: Arc::new(RwLock::new(recorder)),
        }
    }

    /// Append a sample.
    pub fn push(&self, sample: &TraceSample) {
        self.inner.write().push(sample);
    }

    /// Owned copies of the trailing `duration` seconds.
    #[must_use]
    pub fn window(&self, duration: f64) -> Vec<TraceSample> {
        self.inner.read().window(duration)
    }

    /// Copy of the newest sample.
    #[must_use]
    pub fn latest(&self) -> Option<TraceSample> {
        self.inner.read().latest().map(|s| s.to_sample())
    }

    /// Samples stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Forget all samples.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

/// Histogram-over-time image, one column per sample.
///
/// `data` is column-major: `data[column * bins + bin]`, each column normalised to
/// its own peak so values lie in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waterfall {
    /// Lower edge of the common domain.
    pub domain_lo: f64,
    /// Upper edge of the common domain.
    pub domain_hi: f64,
    /// Bins per column.
    pub bins: usize,
    /// Number of samples.
    pub columns: usize,
    /// Time of the first column.
    pub t_start: f64,
    /// Time of the last column.
    pub t_end: f64,
    /// Column-major intensities.
    pub data: Vec<f32>,
}

impl Waterfall {
    /// Re-bin every sample into a common domain spanning all of theirs.
    ///
    /// Returns `None` when there are no samples.
    #[must_use]
    pub fn from_samples(samples: &[TraceSample], bins: usize) -> Option<Self> {
        let (first, last) = (samples.first()?, samples.last()?);
        let bins = bins.max(1);

        let lo = samples
            .iter()
            .map(|s| s.hist.domain_lo)
            .fold(f64::INFINITY, f64::min);
        let hi = samples
            .iter()
            .map(|s| s.hist.domain_hi)
            .fold(f64::NEG_INFINITY, f64::max);
        let (domain_lo, domain_hi) = normalize_domain(lo, hi);
        let common = Histogram::new(domain_lo, domain_hi, bins);

        let mut data = vec![0f32; samples.len() * bins];
        for (column, sample) in data.chunks_exact_mut(bins).zip(samples) {
            for (i, &count) in sample.hist.bins.iter().enumerate() {
                if count > 0 {
                    column[common.bin_index(sample.hist.bin_value(i))] += count as f32;
                }
            }
            let peak = column.iter().copied().fold(0f32, f32::max);
            if peak > 0.0 {
                column.iter_mut().for_each(|v| *v /= peak);
            }
        }

        Some(Self {
            domain_lo,
            domain_hi,
            bins,
            columns: samples.len(),
            t_start: first.t,
            t_end: last.t,
            data,
        })
    }

    /// Normalised intensity at `(column, bin)`.
    #[must_use]
    pub fn at(&self, column: usize, bin: usize) -> Option<f32> {
        if column >= self.columns || bin >= self.bins {
            return None;
        }
        self.data.get(column * self.bins + bin).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, bins: usize) -> TraceSample {
        let mut hist = Histogram::new(0.0, 10.0, bins);
        hist.add(t);
        TraceSample {
            t,
            min: t,
            max: t + 1.0,
            mean: t + 0.5,
            median: t + 0.5,
            p10: t + 0.1,
            p90: t + 0.9,
            hist,
        }
    }

    #[test]
    fn test_push_below_capacity() {
        let mut rec = TraceRecorder::new(8, 4);
        for i in 0..3 {
            rec.push(&sample(f64::from(i), 4));
        }
        assert_eq!(rec.len(), 3);
        let ts: Vec<f64> = rec.window(f64::INFINITY).iter().map(|s| s.t).collect();
        assert_eq!(ts, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_oversized_storage_refused() {
        let err = TraceRecorder::try_new(usize::MAX / 4, 256).unwrap_err();
        assert!(matches!(err, crate::ViewerError::TraceTooLarge { .. }));
        assert!(TraceRecorder::try_new(0, 4).is_err());

        let rec = TraceRecorder::try_new(32, 8).unwrap();
        assert_eq!((rec.capacity(), rec.hist_bins()), (32, 8));
    }

    #[test]
    fn test_new_clamps_to_limits() {
        for bins in [1, 256, MAX_HIST_BINS] {
            let max = max_capacity_for(bins);
            assert!(trace_storage_bytes(max, bins).is_ok(), "{bins} bins");
            assert!(trace_storage_bytes(max + 1, bins).is_err(), "{bins} bins");
        }

        let rec = TraceRecorder::new(0, 0);
        assert_eq!((rec.capacity(), rec.hist_bins()), (1, 1));
    }

    #[test]
    fn test_wraparound_keeps_newest() {
        let n = 10;
        let mut rec = TraceRecorder::new(n, 4);
        for i in 0..n + 5 {
            rec.push(&sample(i as f64, 4));
        }
        assert_eq!(rec.len(), n);

        let all = rec.window(1e9);
        assert_eq!(all.len(), n);
        let ts: Vec<f64> = all.iter().map(|s| s.t).collect();
        let expected: Vec<f64> = (5..n + 5).map(|i| i as f64).collect();
        assert_eq!(ts, expected);
        assert_eq!(rec.latest().map(|s| s.t), Some((n + 4) as f64));
        assert_eq!(rec.get(0).map(|s| s.t), Some(5.0));
    }

    #[test]
    fn test_window_cutoff_inclusive() {
        let mut rec = TraceRecorder::new(100, 4);
        for i in 0..20 {
            rec.push(&sample(f64::from(i) * 0.5, 4));
        }
        // latest t = 9.5, cutoff = 7.5
        let w = rec.window(2.0);
        let ts: Vec<f64> = w.iter().map(|s| s.t).collect();
        assert_eq!(ts, vec![7.5, 8.0, 8.5, 9.0, 9.5]);

        assert_eq!(rec.window(0.0).len(), 1);
        assert_eq!(rec.window(f64::NAN).len(), 1);
    }

    #[test]
    fn test_window_across_wrap_boundary() {
        let mut rec = TraceRecorder::new(4, 4);
        for i in 0..6 {
            rec.push(&sample(f64::from(i), 4));
        }
        // Slots hold [4, 5, 2, 3]; the window must straddle the physical end
        let ts: Vec<f64> = rec.iter_window(2.0).map(|s| s.t).collect();
        assert_eq!(ts, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_histogram_stored_by_value() {
        let mut rec = TraceRecorder::new(2, 4);
        let mut s = sample(3.0, 4);
        rec.push(&s);
        s.hist.bins.fill(9);

        let stored = rec.window(f64::INFINITY);
        assert_eq!(stored[0].hist.bins.iter().sum::<u32>(), 1);
        assert_eq!(stored[0].hist.domain_hi, 10.0);
    }

    #[test]
    fn test_empty_recorder() {
        let rec = TraceRecorder::new(4, 4);
        assert!(rec.is_empty());
        assert!(rec.latest().is_none());
        assert!(rec.window(10.0).is_empty());
    }

    #[test]
    fn test_clear_resets() {
        let mut rec = TraceRecorder::new(4, 4);
        rec.push(&sample(1.0, 4));
        rec.clear();
        assert!(rec.is_empty());
        rec.push(&sample(2.0, 4));
        assert_eq!(rec.window(100.0).len(), 1);
    }

    #[test]
    fn test_series_extracts_field() {
        let samples = vec![sample(0.0, 4), sample(1.0, 4)];
        assert_eq!(series(&samples, TraceField::Max), vec![[0.0, 1.0], [1.0, 2.0]]);
        assert_eq!(series(&samples, TraceField::P10)[1], [1.0, 1.1]);
    }

    #[test]
    fn test_waterfall_common_domain() {
        let mut a = Histogram::new(0.0, 4.0, 5);
        a.bins = vec![0, 2, 0, 4, 0];
        let mut b = Histogram::new(4.0, 8.0, 5);
        b.bins = vec![1, 0, 0, 0, 0];
        let samples = vec![
            TraceSample { hist: a, ..sample(0.0, 4) },
            TraceSample { hist: b, ..sample(1.0, 4) },
        ];

        let wf = Waterfall::from_samples(&samples, 9).unwrap();
        assert_eq!((wf.domain_lo, wf.domain_hi), (0.0, 8.0));
        assert_eq!(wf.columns, 2);
        assert_eq!((wf.t_start, wf.t_end), (0.0, 1.0));
        // Bin values 1.0 and 3.0 land in common bins 1 and 3
        assert_eq!(wf.at(0, 1), Some(0.5));
        assert_eq!(wf.at(0, 3), Some(1.0));
        assert_eq!(wf.at(1, 4), Some(1.0));
        assert_eq!(wf.at(1, 0), Some(0.0));
        assert_eq!(wf.at(2, 0), None);
        assert!(Waterfall::from_samples(&[], 8).is_none());
    }

    #[test]
    fn test_shared_recorder_copies_out() {
        let shared = SharedTraceRecorder::new(4, 4);
        let writer = shared.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..10 {
                writer.push(&sample(f64::from(i), 4));
            }
        });
        handle.join().unwrap();

        let w = shared.window(f64::INFINITY);
        assert_eq!(w.len(), 4);
        shared.push(&sample(10.0, 4));
        // Copies are unaffected by later pushes
        assert_eq!(w[0].t, 6.0);
        assert_eq!(shared.latest().map(|s| s.t), Some(10.0));
    }
}
