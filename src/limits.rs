//! Hard limits on producer-supplied frame layouts and on trace storage.
//!
//! Everything the viewer allocates or indexes from an external size goes through
//! a guard here first, so a corrupt descriptor or an oversized configuration
//! turns into a [`ViewerError`] instead of an abort.

use std::mem::size_of;

use crate::error::{AppResult, ViewerError};
use crate::frame::FrameDescriptor;

/// Maximum size of one frame slice in bytes (1 GiB).
pub const MAX_FRAME_BYTES: usize = 1024 * 1024 * 1024;
/// Maximum supported width/height for frames.
pub const MAX_FRAME_DIMENSION: u32 = 65_536;
/// Maximum number of slices in a circular acquisition buffer.
pub const MAX_SLICE_COUNT: u32 = 1 << 20;

/// Largest accepted display, trace or percentile histogram.
pub const MAX_HIST_BINS: usize = 65_536;

/// Maximum number of samples a trace recorder may hold.
pub const MAX_TRACE_CAPACITY: usize = 3_600_000;
/// Maximum pre-allocated trace storage in bytes (2 GiB).
pub const MAX_TRACE_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Bytes of scalar storage per trace slot (timestamp, six statistics, domain).
pub const TRACE_SLOT_SCALAR_BYTES: usize = 9 * size_of::<f64>();

/// Checked geometry of a descriptor's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Pixels in one slice.
    pub pixels: usize,
    /// Bytes in one slice.
    pub slice_bytes: usize,
    /// Slices the buffer must hold (1 unless circular).
    pub slices: usize,
}

impl FrameLayout {
    /// Bytes the whole buffer must hold.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        // Checked in `check_frame_layout`
        self.slice_bytes * self.slices
    }
}

/// Validate the layout a descriptor claims against its buffer.
///
/// Checks dimensions, slice count, per-slice size, and that the buffer covers
/// every slice, using checked arithmetic throughout.
///
/// # Errors
///
/// Returns the sizing variant of [`ViewerError`] that describes the first
/// violated limit.
pub fn check_frame_layout(desc: &FrameDescriptor<'_>) -> AppResult<FrameLayout> {
    let (width, height) = (desc.width, desc.height);
    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return Err(ViewerError::FrameDimensionsTooLarge {
            width,
            height,
            max_dimension: MAX_FRAME_DIMENSION,
        });
    }

    let slices = if desc.is_circular {
        if desc.slice_count == 0 || desc.slice_count > MAX_SLICE_COUNT {
            return Err(ViewerError::InvalidFrame(format!(
                "circular buffer with {} slices",
                desc.slice_count
            )));
        }
        desc.slice_count as usize
    } else {
        1
    };

    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or(ViewerError::SizeOverflow {
            context: "frame pixel count",
        })?;
    let slice_bytes = pixels
        .checked_mul(desc.pixel_kind.element_size())
        .ok_or(ViewerError::SizeOverflow {
            context: "frame slice size",
        })?;
    if slice_bytes > MAX_FRAME_BYTES {
        return Err(ViewerError::FrameTooLarge {
            bytes: slice_bytes,
            max_bytes: MAX_FRAME_BYTES,
        });
    }

    let required = slice_bytes
        .checked_mul(slices)
        .ok_or(ViewerError::SizeOverflow {
            context: "circular buffer size",
        })?;
    if required > desc.buffer.len() {
        return Err(ViewerError::BufferTooSmall {
            required,
            actual: desc.buffer.len(),
        });
    }

    Ok(FrameLayout {
        pixels,
        slice_bytes,
        slices,
    })
}

/// Bytes a trace recorder of this size pre-allocates.
///
/// # Errors
///
/// Returns [`ViewerError::TraceTooLarge`] when `capacity` is zero or above
/// [`MAX_TRACE_CAPACITY`], when `hist_bins` is zero, or when the storage would
/// exceed [`MAX_TRACE_BYTES`].
pub fn trace_storage_bytes(capacity: usize, hist_bins: usize) -> AppResult<usize> {
    let too_large = || ViewerError::TraceTooLarge {
        capacity,
        hist_bins,
        max_bytes: MAX_TRACE_BYTES,
    };
    if capacity == 0 || capacity > MAX_TRACE_CAPACITY || hist_bins == 0 {
        return Err(too_large());
    }

    let per_slot = hist_bins
        .checked_mul(size_of::<u32>())
        .and_then(|b| b.checked_add(TRACE_SLOT_SCALAR_BYTES))
        .ok_or_else(too_large)?;
    let bytes = capacity.checked_mul(per_slot).ok_or_else(too_large)?;
    if bytes > MAX_TRACE_BYTES {
        return Err(too_large());
    }
    Ok(bytes)
}
