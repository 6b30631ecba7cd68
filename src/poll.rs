//! Poll-driven update loop.
//!
//! The producer never notifies the viewer; instead a [`PollDriver`] ticks at a
//! [`PollRate`], borrows the current frame from a [`FrameSource`], and runs one
//! [`FrameViewer`] cycle. Completed reports are offered to a bounded channel; when
//! the consumer lags, reports are dropped rather than queued, since a newer one
//! follows on the next tick.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::ViewerConfig;
use crate::cycle::{CycleOutcome, CycleReport, FrameViewer};
use crate::error::AppResult;
use crate::frame::FrameDescriptor;

/// Refresh presets offered by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PollRate {
    /// 10 polls per second.
    #[serde(rename = "10hz")]
    Hz10,
    /// 25 polls per second.
    #[serde(rename = "25hz")]
    Hz25,
    /// 30 polls per second.
    #[default]
    #[serde(rename = "30hz")]
    Hz30,
    /// 50 polls per second.
    #[serde(rename = "50hz")]
    Hz50,
    /// 100 polls per second.
    #[serde(rename = "100hz")]
    Hz100,
}

impl PollRate {
    /// Every preset, slowest first.
    pub const ALL: [PollRate; 5] = [Self::Hz10, Self::Hz25, Self::Hz30, Self::Hz50, Self::Hz100];

    /// Delay between polls.
    #[must_use]
    pub fn interval(self) -> Duration {
        Duration::from_millis(match self {
            Self::Hz10 => 100,
            Self::Hz25 => 40,
            Self::Hz30 => 33,
            Self::Hz50 => 20,
            Self::Hz100 => 10,
        })
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hz10 => "10 Hz",
            Self::Hz25 => "25 Hz",
            Self::Hz30 => "30 Hz",
            Self::Hz50 => "50 Hz",
            Self::Hz100 => "100 Hz",
        }
    }
}

impl fmt::Display for PollRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Anything that can lend the viewer its current frame.
///
/// Typically a wrapper around an attached shared-memory segment. The descriptor
/// only lives for the duration of `f`.
pub trait FrameSource {
    /// Run `f` against the current frame, or return `None` if none is attached.
    fn with_frame<R, F>(&mut self, f: F) -> Option<R>
    where
        F: FnOnce(&FrameDescriptor<'_>) -> R;
}

/// Ticks a [`FrameViewer`] against a [`FrameSource`].
#[derive(Debug)]
pub struct PollDriver<S> {
    viewer: FrameViewer,
    source: S,
    rate: PollRate,
}

impl<S: FrameSource> PollDriver<S> {
    /// Drive `viewer` against `source` at `rate`.
    pub fn new(viewer: FrameViewer, source: S, rate: PollRate) -> Self {
        Self {
            viewer,
            source,
            rate,
        }
    }

    /// Build the viewer from `config` and poll at `display.poll_rate`.
    ///
    /// # Errors
    ///
    /// Fails as [`FrameViewer::from_config`] does.
    pub fn from_config(source: S, config: &ViewerConfig) -> AppResult<Self> {
        let viewer = FrameViewer::from_config(config)?;
        Ok(Self::new(viewer, source, config.display.poll_rate))
    }

    /// Configured polling rate.
    #[must_use]
    pub fn rate(&self) -> PollRate {
        self.rate
    }

    /// The driven viewer.
    #[must_use]
    pub fn viewer(&self) -> &FrameViewer {
        &self.viewer
    }

    /// Mutable access for control changes between ticks.
    pub fn viewer_mut(&mut self) -> &mut FrameViewer {
        &mut self.viewer
    }

    /// Run a single poll: borrow the frame and update the viewer.
    pub fn poll_once(&mut self) -> Option<CycleOutcome> {
        let viewer = &mut self.viewer;
        self.source.with_frame(|desc| viewer.update(desc))
    }

    /// Poll until `shutdown` turns true (or its sender is dropped) or the report
    /// receiver is closed. Returns the viewer and source for reuse.
    pub async fn run(
        mut self,
        reports: mpsc::Sender<CycleReport>,
        mut shutdown: watch::Receiver<bool>,
    ) -> (FrameViewer, S) {
        let mut ticker = tokio::time::interval(self.rate.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(rate = %self.rate, "poll driver started");
        let mut delivered: u64 = 0;
        let mut dropped: u64 = 0;

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.poll_once() {
                        Some(CycleOutcome::Updated(report)) => match reports.try_send(*report) {
                            Ok(()) => delivered += 1,
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                dropped += 1;
                                tracing::trace!("report channel full, dropping report");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                tracing::debug!("report receiver closed");
                                break;
                            }
                        },
                        Some(CycleOutcome::Skipped(reason)) => {
                            tracing::trace!(?reason, "cycle skipped");
                        }
                        None => tracing::trace!("no frame attached"),
                    }
                }
            }
        }

        tracing::info!(delivered, dropped, "poll driver stopped");
        (self.viewer, self.source)
    }
}
