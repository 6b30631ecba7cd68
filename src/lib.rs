//! Core library for live shared-memory frame viewers.
//!
//! Given the producer's current frame as a [`frame::FrameDescriptor`], the crate
//! computes display statistics, auto-scaling limits and a rolling trace history,
//! and maps between image pixels and a rotated/flipped/zoomed viewport. Painting,
//! colour maps and the shared-memory attach itself live elsewhere.
//!
//! The usual entry point is [`cycle::FrameViewer`], driven once per poll tick
//! either directly or through [`poll::PollDriver`].

pub mod autoscale;
pub mod config;
pub mod cycle;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod limits;
pub mod logging;
pub mod pixel_view;
pub mod poll;
pub mod region;
pub mod stats;
pub mod trace;

pub use autoscale::{AutoscaleConfig, AutoscaleController, AutoscaleState, HighMode, LowMode};
pub use cycle::{CycleOutcome, CycleReport, FrameViewer, SkipReason};
pub use error::{AppResult, ViewerError};
pub use frame::{FrameDescriptor, OwnedFrame, PixelKind};
pub use geometry::{GeometryTransform, Point, Rotation, Zoom};
pub use pixel_view::PixelView;
pub use region::Region;
pub use stats::{Histogram, StatsEngine, StatsSnapshot};
pub use trace::{TraceRecorder, TraceSample};
