//! Display limit selection with independent low/high policies and smoothing.
//!
//! Each cycle the controller evaluates both axes:
//!
//! | Mode | Bound |
//! |---|---|
//! | `Manual` | caller-held value, passed through untouched |
//! | `DataMin` / `DataMax` | raw extreme of the source region (no histogram) |
//! | `P1`..`P10` / `P90`..`P99` | value where the cumulative count of a fine histogram over `[rawMin, rawMax]` first reaches `k%` |
//!
//! Automatic bounds are blended with the previous output,
//! `new = gain * computed + (1 - gain) * previous`. When both axes are manual the
//! frame is not scanned at all.
//!
//! The "Auto" toggle shown by a UI is not stored anywhere: it is derived from the
//! config with [`derive_toggle_label`], and flipping it goes through
//! [`toggle_autoscale`], so there is a single source of truth.

use serde::{Deserialize, Serialize};

use crate::pixel_view::PixelView;
use crate::region::Region;
use crate::stats::{region_histogram, scan_extremes, Histogram};

/// Histogram resolution for percentile cuts, independent of the display histogram.
pub const DEFAULT_PERCENTILE_BINS: usize = 4096;

/// Policy for the lower display limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowMode {
    /// Caller-held value.
    Manual,
    /// Smallest pixel value.
    #[default]
    DataMin,
    /// 1st percentile.
    P1,
    /// 2nd percentile.
    P2,
    /// 5th percentile.
    P5,
    /// 10th percentile.
    P10,
}

impl LowMode {
    /// Every mode, in menu order.
    pub const ALL: [LowMode; 6] = [
        Self::Manual,
        Self::DataMin,
        Self::P1,
        Self::P2,
        Self::P5,
        Self::P10,
    ];

    /// Cumulative fraction for percentile modes.
    #[must_use]
    pub fn percentile(self) -> Option<f64> {
        match self {
            Self::Manual | Self::DataMin => None,
            Self::P1 => Some(0.01),
            Self::P2 => Some(0.02),
            Self::P5 => Some(0.05),
            Self::P10 => Some(0.10),
        }
    }

    /// Menu label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::DataMin => "Min",
            Self::P1 => "1%",
            Self::P2 => "2%",
            Self::P5 => "5%",
            Self::P10 => "10%",
        }
    }
}

/// Policy for the upper display limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighMode {
    /// Caller-held value.
    Manual,
    /// Largest pixel value.
    #[default]
    DataMax,
    /// 90th percentile.
    P90,
    /// 95th percentile.
    P95,
    /// 98th percentile.
    P98,
    /// 99th percentile.
    P99,
}

impl HighMode {
    /// Every mode, in menu order.
    pub const ALL: [HighMode; 6] = [
        Self::Manual,
        Self::DataMax,
        Self::P90,
        Self::P95,
        Self::P98,
        Self::P99,
    ];

    /// Cumulative fraction for percentile modes.
    #[must_use]
    pub fn percentile(self) -> Option<f64> {
        match self {
            Self::Manual | Self::DataMax => None,
            Self::P90 => Some(0.90),
            Self::P95 => Some(0.95),
            Self::P98 => Some(0.98),
            Self::P99 => Some(0.99),
        }
    }

    /// Menu label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::DataMax => "Max",
            Self::P90 => "90%",
            Self::P95 => "95%",
            Self::P98 => "98%",
            Self::P99 => "99%",
        }
    }
}

/// Which pixels feed the automatic limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoscaleSource {
    /// Every pixel of the frame.
    #[default]
    FullFrame,
    /// The active ROI; falls back to the full frame while no ROI is set.
    Roi,
}

/// Caller-held autoscale settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoscaleConfig {
    /// Lower limit policy.
    pub low_mode: LowMode,
    /// Upper limit policy.
    pub high_mode: HighMode,
    /// Pixels the automatic limits are computed from.
    pub source: AutoscaleSource,
    /// Blend factor in `[0, 1]`; 1.0 replaces the previous output instantly.
    pub gain: f64,
    /// Lower limit used while `low_mode` is manual.
    pub manual_low: f64,
    /// Upper limit used while `high_mode` is manual.
    pub manual_high: f64,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            low_mode: LowMode::DataMin,
            high_mode: HighMode::DataMax,
            source: AutoscaleSource::FullFrame,
            gain: 1.0,
            manual_low: 0.0,
            manual_high: 1.0,
        }
    }
}

impl AutoscaleConfig {
    /// Change the lower limit policy.
    pub fn set_low_mode(&mut self, mode: LowMode) {
        self.low_mode = mode;
    }

    /// Change the upper limit policy.
    pub fn set_high_mode(&mut self, mode: HighMode) {
        self.high_mode = mode;
    }

    /// Change which pixels feed the automatic limits.
    pub fn set_source(&mut self, source: AutoscaleSource) {
        self.source = source;
    }

    /// Set the smoothing gain, clamped to `[0, 1]`. NaN means no smoothing.
    pub fn set_gain(&mut self, gain: f64) {
        self.gain = if gain.is_nan() { 1.0 } else { gain.clamp(0.0, 1.0) };
    }

    /// Set both manual limits.
    pub fn set_manual(&mut self, low: f64, high: f64) {
        self.manual_low = low;
        self.manual_high = high;
    }

    /// Whether neither axis needs pixel data.
    #[must_use]
    pub fn is_fully_manual(&self) -> bool {
        self.low_mode == LowMode::Manual && self.high_mode == HighMode::Manual
    }

    #[must_use]
    fn needs_histogram(&self) -> bool {
        self.low_mode.percentile().is_some() || self.high_mode.percentile().is_some()
    }
}

/// Whether the "Auto" toggle should read as on: both axes automatic.
#[must_use]
pub fn derive_toggle_label(config: &AutoscaleConfig) -> bool {
    config.low_mode != LowMode::Manual && config.high_mode != HighMode::Manual
}

/// Flip the "Auto" toggle.
///
/// Fully automatic turns both axes manual, freezing the limits currently shown.
/// Anything else turns both axes to the data extremes.
pub fn toggle_autoscale(config: &mut AutoscaleConfig, current: &AutoscaleState) {
    if derive_toggle_label(config) {
        config.low_mode = LowMode::Manual;
        config.high_mode = HighMode::Manual;
        config.set_manual(current.low, current.high);
    } else {
        reset_autoscale(config);
    }
    tracing::debug!(
        low_mode = ?config.low_mode,
        high_mode = ?config.high_mode,
        "autoscale toggled"
    );
}

/// Force both axes back to the data extremes.
pub fn reset_autoscale(config: &mut AutoscaleConfig) {
    config.low_mode = LowMode::DataMin;
    config.high_mode = HighMode::DataMax;
}

/// Previous smoothed limits, fed back into the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoscaleState {
    /// Lower display limit.
    pub low: f64,
    /// Upper display limit.
    pub high: f64,
}

impl Default for AutoscaleState {
    fn default() -> Self {
        Self { low: 0.0, high: 1.0 }
    }
}

impl AutoscaleState {
    /// Limits as given, unordered.
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Enforce `high > low`.
    #[must_use]
    fn ordered(mut self) -> Self {
        if !(self.high > self.low) {
            self.high = self.low + 1.0;
        }
        self
    }
}

/// Pixel data the controller can scan.
///
/// Implemented by [`PixelView`]; tests substitute counting stubs.
pub trait ScaleData {
    /// Frame dimensions `(width, height)`.
    fn frame_size(&self) -> (u32, u32);

    /// Raw `(min, max)` of `region`, `None` if it holds no values.
    fn extremes(&mut self, region: &Region) -> Option<(f64, f64)>;

    /// Histogram of `region` over `[lo, hi]`.
    fn histogram(&mut self, region: &Region, lo: f64, hi: f64, nbins: usize) -> Histogram;
}

impl ScaleData for PixelView<'_> {
    fn frame_size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn extremes(&mut self, region: &Region) -> Option<(f64, f64)> {
        scan_extremes(self, region)
    }

    fn histogram(&mut self, region: &Region, lo: f64, hi: f64, nbins: usize) -> Histogram {
        region_histogram(self, region, lo, hi, nbins)
    }
}

/// Stateful limit computation.
#[derive(Debug, Clone)]
pub struct AutoscaleController {
    state: AutoscaleState,
    percentile_bins: usize,
}

impl Default for AutoscaleController {
    fn default() -> Self {
        Self::new(DEFAULT_PERCENTILE_BINS)
    }
}

impl AutoscaleController {
    /// Controller using `percentile_bins` bins for percentile cuts, seeded `(0, 1)`.
    pub fn new(percentile_bins: usize) -> Self {
        debug_assert!(percentile_bins >= 2, "percentile histogram needs at least two bins");
        Self {
            state: AutoscaleState::default(),
            percentile_bins: percentile_bins.max(2),
        }
    }

    /// Start from `seed` instead of `(0, 1)`.
    #[must_use]
    pub fn with_seed(mut self, seed: AutoscaleState) -> Self {
        self.state = seed;
        self
    }

    /// Output of the last update.
    #[must_use]
    pub fn state(&self) -> AutoscaleState {
        self.state
    }

    /// Replace the remembered output.
    pub fn reset(&mut self, seed: AutoscaleState) {
        self.state = seed;
    }

    /// Compute this cycle's limits and remember them.
    ///
    /// `roi` is the active selection, if any. When the region holds no values the
    /// previous output is kept.
    pub fn update<D: ScaleData + ?Sized>(
        &mut self,
        config: &AutoscaleConfig,
        data: &mut D,
        roi: Option<&Region>,
    ) -> AutoscaleState {
        if config.is_fully_manual() {
            self.state = AutoscaleState::new(config.manual_low, config.manual_high).ordered();
            return self.state;
        }

        let (width, height) = data.frame_size();
        let region = match (config.source, roi) {
            (AutoscaleSource::Roi, Some(roi)) if !roi.clamped(width, height).is_empty() => *roi,
            _ => Region::full(width, height),
        };

        let Some((raw_min, raw_max)) = data.extremes(&region) else {
            tracing::trace!("autoscale region holds no values, keeping previous limits");
            return self.state;
        };

        let histogram = config
            .needs_histogram()
            .then(|| data.histogram(&region, raw_min, raw_max, self.percentile_bins));
        let cut = |fraction: Option<f64>, fallback: f64| {
            fraction
                .and_then(|f| histogram.as_ref().and_then(|h| h.value_at_fraction(f)))
                .unwrap_or(fallback)
        };

        let gain = config.gain.clamp(0.0, 1.0);
        let blend = |computed: f64, previous: f64| gain * computed + (1.0 - gain) * previous;
        let previous = self.state;

        let low = match config.low_mode {
            LowMode::Manual => config.manual_low,
            LowMode::DataMin => blend(raw_min, previous.low),
            mode => blend(cut(mode.percentile(), raw_min), previous.low),
        };
        let high = match config.high_mode {
            HighMode::Manual => config.manual_high,
            HighMode::DataMax => blend(raw_max, previous.high),
            mode => blend(cut(mode.percentile(), raw_max), previous.high),
        };

        self.state = AutoscaleState::new(low, high).ordered();
        tracing::trace!(
            raw_min,
            raw_max,
            low = self.state.low,
            high = self.state.high,
            "autoscale limits updated"
        );
        self.state
    }
}

/// Right-drag window/level adjustment.
///
/// Starting a drag switches both axes to manual at the current limits. Horizontal
/// motion shifts the window centre by `dx / viewport_w` of its width; vertical
/// motion scales the width by `exp(dy / viewport_h * 4)`, so dragging up narrows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastDrag {
    start_low: f64,
    start_high: f64,
}

impl ContrastDrag {
    /// Start a drag: both axes turn manual at the `current` limits.
    pub fn begin(config: &mut AutoscaleConfig, current: &AutoscaleState) -> Self {
        config.low_mode = LowMode::Manual;
        config.high_mode = HighMode::Manual;
        config.set_manual(current.low, current.high);
        Self {
            start_low: current.low,
            start_high: current.high,
        }
    }

    /// Apply the total drag offset `(dx, dy)` since [`ContrastDrag::begin`].
    pub fn update(
        &self,
        config: &mut AutoscaleConfig,
        dx: f64,
        dy: f64,
        viewport_w: f64,
        viewport_h: f64,
    ) -> (f64, f64) {
        let viewport_w = if viewport_w > 0.0 { viewport_w } else { 1.0 };
        let viewport_h = if viewport_h > 0.0 { viewport_h } else { 1.0 };

        let start_center = (self.start_high + self.start_low) / 2.0;
        let mut start_width = self.start_high - self.start_low;
        if start_width == 0.0 {
            start_width = 1.0;
        }

        let center = start_center + dx / viewport_w * start_width;
        let width = start_width * (dy / viewport_h * 4.0).exp();

        let (low, high) = (center - width / 2.0, center + width / 2.0);
        config.set_manual(low, high);
        (low, high)
    }
}
