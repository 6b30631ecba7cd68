//! Frame descriptor types shared between the producer poller and the viewer core.
//!
//! A [`FrameDescriptor`] is the only view the core has of the external shared-memory
//! producer: dimensions, element type, the raw bytes, and the counters/flags needed
//! to pick the valid slice and detect torn or stale frames. It borrows the producer's
//! buffer for exactly one update cycle.
//!
//! # Pausing
//!
//! The core never keeps the borrowed buffer. A viewer that wants to freeze the
//! display copies the active slice with [`OwnedFrame::capture`] and keeps feeding
//! [`OwnedFrame::descriptor`] into the update cycle.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppResult;
use crate::pixel_view::PixelView;

/// Element encoding of the pixels in a frame buffer.
///
/// Complex kinds store `(re, im)` pairs; only the real component is visible to
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelKind {
    /// Unsigned 8-bit.
    U8,
    /// Signed 8-bit.
    I8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    I16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit.
    I32,
    /// Unsigned 64-bit.
    U64,
    /// Signed 64-bit.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Pair of 32-bit floats.
    ComplexF32,
    /// Pair of 64-bit floats.
    ComplexF64,
}

impl PixelKind {
    /// Every supported kind, in type-tag order.
    pub const ALL: [PixelKind; 12] = [
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
        Self::F32,
        Self::F64,
        Self::ComplexF32,
        Self::ComplexF64,
    ];

    /// Size of one element in bytes.
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 | Self::ComplexF32 => 8,
            Self::ComplexF64 => 16,
        }
    }

    /// Short type name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::ComplexF32 => "complex-f32",
            Self::ComplexF64 => "complex-f64",
        }
    }

    /// Whether elements are `(re, im)` pairs.
    #[must_use]
    pub fn is_complex(self) -> bool {
        matches!(self, Self::ComplexF32 | Self::ComplexF64)
    }
}

impl fmt::Display for PixelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-cycle description of the producer's current frame.
///
/// Fields mirror the producer metadata: `latest_slice_counter` is the write counter
/// (`cnt1`), `generation` the frame-ready counter (`cnt0`).
#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Element type.
    pub pixel_kind: PixelKind,
    /// Raw bytes of the whole acquisition buffer (all slices when circular).
    pub buffer: &'a [u8],
    /// Whether `buffer` is a stack of slices.
    pub is_circular: bool,
    /// Number of slices (3rd axis) when circular.
    pub slice_count: u32,
    /// Write counter selecting the active slice.
    pub latest_slice_counter: u64,
    /// Set while the producer is writing.
    pub write_in_progress: bool,
    /// Frame-ready counter.
    pub generation: u64,
}

impl<'a> FrameDescriptor<'a> {
    /// Describe a single, non-circular frame.
    pub fn new(width: u32, height: u32, pixel_kind: PixelKind, buffer: &'a [u8]) -> Self {
        Self {
            width,
            height,
            pixel_kind,
            buffer,
            is_circular: false,
            slice_count: 1,
            latest_slice_counter: 0,
            write_in_progress: false,
            generation: 0,
        }
    }

    /// Mark the buffer as a circular stack of `slice_count` frames.
    #[must_use]
    pub fn circular(mut self, slice_count: u32, latest_slice_counter: u64) -> Self {
        self.is_circular = true;
        self.slice_count = slice_count;
        self.latest_slice_counter = latest_slice_counter;
        self
    }

    /// Set the frame-ready counter.
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Set the writer-busy flag.
    #[must_use]
    pub fn with_write_in_progress(mut self, busy: bool) -> Self {
        self.write_in_progress = busy;
        self
    }

    /// Bytes of a single slice (`width * height * element_size`), or `None` on
    /// overflow. Limits are enforced by [`crate::limits::check_frame_layout`].
    #[must_use]
    pub fn slice_bytes(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.pixel_kind.element_size())
    }
}

/// A private copy of one frame slice, detached from the producer buffer.
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    width: u32,
    height: u32,
    pixel_kind: PixelKind,
    generation: u64,
    data: Bytes,
}

impl OwnedFrame {
    /// Copy the active slice of `desc`.
    ///
    /// Fails exactly when the frame could not be read this cycle, including
    /// `WriteInProgress`.
    pub fn capture(desc: &FrameDescriptor<'_>) -> AppResult<Self> {
        let view = PixelView::new(desc)?;
        Ok(Self {
            width: desc.width,
            height: desc.height,
            pixel_kind: desc.pixel_kind,
            generation: desc.generation,
            data: Bytes::copy_from_slice(view.as_bytes()),
        })
    }

    /// Non-circular descriptor over the copied bytes.
    #[must_use]
    pub fn descriptor(&self) -> FrameDescriptor<'_> {
        FrameDescriptor::new(self.width, self.height, self.pixel_kind, &self.data)
            .with_generation(self.generation)
    }

    /// Frame-ready counter at capture time.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the copy holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
