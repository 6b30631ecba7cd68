//! Custom error types for the viewer core.
//!
//! This module defines the primary error type, `ViewerError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the few things that can actually fail: loading configuration, installing the
//! logging subscriber, and opening a frame whose descriptor does not describe its
//! buffer.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or type
//!   mismatches in the configuration sources.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine but
//!   holds unusable values (zero histogram bins, gain out of range, ...).
//! - **Frame sizing** (`FrameDimensionsTooLarge`, `SizeOverflow`, `FrameTooLarge`,
//!   `BufferTooSmall`, `InvalidFrame`): the descriptor handed over by the producer
//!   cannot be read safely. The update cycle skips such frames.
//! - **`TraceTooLarge`**: a trace recorder sized beyond the storage limit.
//! - **`WriteInProgress`**: the producer is mid-write. This is the only *transient*
//!   error; callers skip the cycle and try again on the next poll tick.
//! - **`Logging`**: the tracing subscriber could not be installed.
//!
//! Degenerate but well-formed input (empty regions, zero-width histogram domains)
//! is never an error: it is normalized where it is consumed.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, ViewerError>;

/// Every failure the viewer core reports.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// A configuration source could not be parsed or had the wrong shape.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// A configuration parsed but holds an unusable value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Width or height above the supported maximum.
    #[error("Frame dimensions {width}x{height} exceed maximum {max_dimension}")]
    FrameDimensionsTooLarge {
        /// Claimed width.
        width: u32,
        /// Claimed height.
        height: u32,
        /// Largest accepted width or height.
        max_dimension: u32,
    },

    /// A size computation overflowed `usize`.
    #[error("Size overflow while computing {context}")]
    SizeOverflow {
        /// Which size was being computed.
        context: &'static str,
    },

    /// One slice is larger than the supported maximum.
    #[error("Frame of {bytes} bytes exceeds maximum {max_bytes} bytes")]
    FrameTooLarge {
        /// Bytes in one slice.
        bytes: usize,
        /// Largest accepted slice.
        max_bytes: usize,
    },

    /// The buffer does not cover the frame it claims to hold.
    #[error("Frame buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall {
        /// Bytes the layout needs.
        required: usize,
        /// Bytes the buffer has.
        actual: usize,
    },

    /// Any other malformed descriptor.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The producer is writing the frame right now.
    #[error("Producer is writing the frame")]
    WriteInProgress,

    /// Trace storage of this size cannot be allocated.
    #[error("Trace of {capacity} samples x {hist_bins} bins exceeds the {max_bytes} byte limit")]
    TraceTooLarge {
        /// Requested sample capacity.
        capacity: usize,
        /// Requested bins per histogram.
        hist_bins: usize,
        /// Largest accepted storage.
        max_bytes: usize,
    },

    /// The tracing subscriber could not be installed.
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl ViewerError {
    /// Whether the condition clears by itself on a later poll.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WriteInProgress)
    }
}
