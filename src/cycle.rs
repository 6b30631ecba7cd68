//! One viewer update cycle: frame → statistics → limits → trace.
//!
//! [`FrameViewer`] owns every long-lived buffer (stats scratch, trace ring,
//! autoscale state) and runs the steps in order for each polled descriptor:
//!
//! 1. skip unless the generation changed or a redraw was requested,
//! 2. open the active slice; a busy producer or a malformed descriptor skips,
//! 3. clamp the ROI (an empty ROI counts as none),
//! 4. compute display limits,
//! 5. full-frame and ROI statistics binned over `[low, high]`,
//! 6. append a trace sample when recording and the frame is new,
//! 7. remember the generation and clear the redraw request.
//!
//! A skipped cycle changes nothing, so the next tick simply tries again.

use std::time::Instant;

use serde::Serialize;

use crate::autoscale::{
    reset_autoscale, toggle_autoscale, AutoscaleConfig, AutoscaleController, AutoscaleState,
};
use crate::config::ViewerConfig;
use crate::error::{AppResult, ViewerError};
use crate::frame::{FrameDescriptor, PixelKind};
use crate::geometry::{GeometryTransform, DEFAULT_ZOOM_STEP};
use crate::pixel_view::PixelView;
use crate::region::Region;
use crate::stats::{region_histogram, StatsEngine, StatsSnapshot};
use crate::trace::{TraceRecorder, TraceSample, DEFAULT_TRACE_WINDOW_SECS};

/// Why a cycle did not produce a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Same generation as last time and no redraw requested.
    NoNewData,
    /// The producer is mid-write.
    WriteInProgress,
    /// The descriptor does not describe a readable frame.
    InvalidFrame,
}

/// Everything a display needs from one completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Frame-ready counter of the frame.
    pub generation: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Element type of the frame.
    pub pixel_kind: PixelKind,
    /// Whether this cycle saw a new generation, as opposed to a redraw.
    pub new_data: bool,
    /// Display limits for this cycle.
    pub limits: AutoscaleState,
    /// Statistics of the whole frame.
    pub full: StatsSnapshot,
    /// Statistics of the clamped ROI, `None` without an active ROI.
    pub roi: Option<StatsSnapshot>,
    /// The clamped ROI the statistics cover.
    pub roi_region: Option<Region>,
    /// The sample appended to the trace this cycle, if any.
    pub trace_sample: Option<TraceSample>,
}

/// Result of one [`FrameViewer::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Statistics were recomputed.
    Updated(Box<CycleReport>),
    /// Nothing was read this cycle.
    Skipped(SkipReason),
}

impl CycleOutcome {
    /// Whether the cycle produced a report.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    /// The report, if the cycle produced one.
    #[must_use]
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Updated(report) => Some(&**report),
            Self::Skipped(_) => None,
        }
    }

    /// Take the report, if the cycle produced one.
    #[must_use]
    pub fn into_report(self) -> Option<CycleReport> {
        match self {
            Self::Updated(report) => Some(*report),
            Self::Skipped(_) => None,
        }
    }
}

/// Long-lived viewer state driven once per poll tick.
#[derive(Debug)]
pub struct FrameViewer {
    stats: StatsEngine,
    autoscale: AutoscaleController,
    autoscale_config: AutoscaleConfig,
    trace: TraceRecorder,
    roi: Option<Region>,
    recording: bool,
    last_generation: Option<u64>,
    redraw: bool,
    started: Instant,
    zoom_step: f64,
    trace_window_secs: f64,
}

impl FrameViewer {
    /// Assemble a viewer from its components; recording starts off.
    pub fn new(
        stats: StatsEngine,
        autoscale: AutoscaleController,
        autoscale_config: AutoscaleConfig,
        trace: TraceRecorder,
    ) -> Self {
        Self {
            stats,
            autoscale,
            autoscale_config,
            trace,
            roi: None,
            recording: false,
            last_generation: None,
            redraw: true,
            started: Instant::now(),
            zoom_step: DEFAULT_ZOOM_STEP,
            trace_window_secs: DEFAULT_TRACE_WINDOW_SECS,
        }
    }

    /// Build every component from `config`, validating it first.
    ///
    /// The trace ring is allocated here in full: `trace.capacity` times
    /// `trace.hist_bins` counts, whether or not recording is enabled.
    ///
    /// # Errors
    ///
    /// Returns `ViewerError::Configuration` for an invalid configuration and
    /// `ViewerError::TraceTooLarge` if the trace storage cannot be allocated.
    pub fn from_config(config: &ViewerConfig) -> AppResult<Self> {
        config.validate()?;
        let mut viewer = Self::new(
            StatsEngine::new(config.display.hist_bins),
            AutoscaleController::new(config.autoscale.percentile_bins),
            config.autoscale.to_autoscale_config(),
            TraceRecorder::try_new(config.trace.capacity, config.trace.hist_bins)?,
        );
        viewer.recording = config.trace.enabled;
        viewer.zoom_step = config.display.zoom_step;
        viewer.trace_window_secs = config.trace.default_window_secs;
        Ok(viewer)
    }

    /// Current autoscale settings.
    #[must_use]
    pub fn autoscale_config(&self) -> &AutoscaleConfig {
        &self.autoscale_config
    }

    /// Change autoscale settings between cycles; forces a redraw.
    pub fn configure_autoscale<F: FnOnce(&mut AutoscaleConfig)>(&mut self, f: F) {
        f(&mut self.autoscale_config);
        self.redraw = true;
    }

    /// Flip the "Auto" toggle against the limits currently shown.
    pub fn toggle_autoscale(&mut self) {
        let current = self.autoscale.state();
        toggle_autoscale(&mut self.autoscale_config, &current);
        self.redraw = true;
    }

    /// Force both axes back to automatic.
    pub fn reset_autoscale(&mut self) {
        reset_autoscale(&mut self.autoscale_config);
        self.redraw = true;
    }

    /// Limits produced by the last completed cycle.
    #[must_use]
    pub fn limits(&self) -> AutoscaleState {
        self.autoscale.state()
    }

    /// Replace the smoothed limits, e.g. after loading a saved view.
    pub fn reset_limits(&mut self, seed: AutoscaleState) {
        self.autoscale.reset(seed);
        self.redraw = true;
    }

    /// Active ROI, as set (not clamped).
    #[must_use]
    pub fn roi(&self) -> Option<Region> {
        self.roi
    }

    /// Set or clear the ROI; forces a redraw.
    pub fn set_roi(&mut self, roi: Option<Region>) {
        tracing::debug!(?roi, "roi changed");
        self.roi = roi;
        self.redraw = true;
    }

    /// Whether new frames are appended to the trace.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Start or stop appending new frames to the trace.
    pub fn set_recording(&mut self, recording: bool) {
        if recording != self.recording {
            tracing::debug!(recording, "trace recording toggled");
        }
        self.recording = recording;
    }

    /// The trace ring.
    #[must_use]
    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    /// Owned copies of the last `duration` seconds of trace.
    #[must_use]
    pub fn trace_window(&self, duration: f64) -> Vec<TraceSample> {
        self.trace.window(duration)
    }

    /// Trace window shown when the user has not picked one, in seconds.
    #[must_use]
    pub fn default_trace_window(&self) -> f64 {
        self.trace_window_secs
    }

    /// Owned copies of the default trace window.
    #[must_use]
    pub fn recent_trace(&self) -> Vec<TraceSample> {
        self.trace.window(self.trace_window_secs)
    }

    /// Zoom factor applied per scroll notch.
    #[must_use]
    pub fn zoom_step(&self) -> f64 {
        self.zoom_step
    }

    /// Apply one scroll event to `geometry` with the configured zoom step.
    #[must_use]
    pub fn scroll_zoom(&self, geometry: GeometryTransform, dy: f64) -> GeometryTransform {
        geometry.scrolled(dy, self.zoom_step)
    }

    /// Drop the trace history and restart its clock.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
        self.started = Instant::now();
    }

    /// Recompute on the next cycle even if the generation did not change.
    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    /// Generation of the last completed cycle.
    #[must_use]
    pub fn last_generation(&self) -> Option<u64> {
        self.last_generation
    }

    /// The statistics engine and its scratch buffer.
    #[must_use]
    pub fn stats_engine(&self) -> &StatsEngine {
        &self.stats
    }

    /// Run one cycle, timestamping any trace sample with the recorder clock.
    pub fn update(&mut self, desc: &FrameDescriptor<'_>) -> CycleOutcome {
        let t = self.started.elapsed().as_secs_f64();
        self.update_at(desc, t)
    }

    /// Run one cycle with an explicit trace timestamp `t` in seconds.
    pub fn update_at(&mut self, desc: &FrameDescriptor<'_>, t: f64) -> CycleOutcome {
        let new_data = self.last_generation != Some(desc.generation);
        if !new_data && !self.redraw {
            return CycleOutcome::Skipped(SkipReason::NoNewData);
        }

        let mut view = match PixelView::new(desc) {
            Ok(view) => view,
            Err(ViewerError::WriteInProgress) => {
                tracing::trace!(generation = desc.generation, "producer busy, skipping cycle");
                return CycleOutcome::Skipped(SkipReason::WriteInProgress);
            }
            Err(err) => {
                tracing::warn!(
                    generation = desc.generation,
                    width = desc.width,
                    height = desc.height,
                    kind = %desc.pixel_kind,
                    error = %err,
                    "skipping unreadable frame"
                );
                return CycleOutcome::Skipped(SkipReason::InvalidFrame);
            }
        };

        let (width, height) = (view.width(), view.height());
        let roi = self
            .roi
            .map(|r| r.clamped(width, height))
            .filter(|r| !r.is_empty());

        let limits = self
            .autoscale
            .update(&self.autoscale_config, &mut view, roi.as_ref());
        let domain = (limits.low, limits.high);

        let full_region = view.full_region();
        let full = self.stats.full_stats(&view, &full_region, domain);
        let roi_stats = roi.map(|r| self.stats.full_stats(&view, &r, domain));

        let trace_sample = (self.recording && new_data).then(|| {
            let (snapshot, region) = match (&roi_stats, roi) {
                (Some(stats), Some(region)) => (stats, region),
                _ => (&full, full_region),
            };
            let hist = if snapshot.histogram.len() == self.trace.hist_bins() {
                snapshot.histogram.clone()
            } else {
                region_histogram(&view, &region, domain.0, domain.1, self.trace.hist_bins())
            };
            let sample = TraceSample::from_snapshot(t, snapshot, hist);
            self.trace.push(&sample);
            sample
        });

        self.last_generation = Some(desc.generation);
        self.redraw = false;

        tracing::trace!(
            generation = desc.generation,
            low = limits.low,
            high = limits.high,
            count = full.count,
            "cycle complete"
        );

        CycleOutcome::Updated(Box::new(CycleReport {
            generation: desc.generation,
            width,
            height,
            pixel_kind: desc.pixel_kind,
            new_data,
            limits,
            full,
            roi: roi_stats,
            roi_region: roi,
            trace_sample,
        }))
    }
}
