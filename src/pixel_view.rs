//! Type-erased, runtime-dispatched read access over a raw frame buffer.
//!
//! The producer tags its buffer with a [`PixelKind`]. [`PixelView`] resolves which
//! slice of the buffer is valid this cycle, checks that the slice actually fits in
//! the buffer, and widens elements to `f64` on demand.
//!
//! # Dispatch
//!
//! Decoding is written once, generically, over the [`Pixel`] trait. Region scans
//! match on the pixel kind a single time and then run a loop monomorphized for that
//! element type, so the per-pixel path has no branching on the kind.
//!
//! # Endianness
//!
//! Frames come from a producer on the same host through shared memory, so elements
//! are decoded in native byte order.

use num_complex::Complex;

use crate::error::{AppResult, ViewerError};
use crate::frame::{FrameDescriptor, PixelKind};
use crate::limits::check_frame_layout;
use crate::region::Region;

/// A numeric element type that can be widened to `f64`.
pub trait Pixel: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode one element from exactly `SIZE` bytes.
    fn decode(bytes: &[u8]) -> f64;
}

macro_rules! impl_scalar_pixel {
    ($($t:ty),* $(,)?) => {
        $(
            impl Pixel for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn decode(bytes: &[u8]) -> f64 {
                    debug_assert_eq!(bytes.len(), Self::SIZE);
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_ne_bytes(raw) as f64
                }
            }
        )*
    };
}

impl_scalar_pixel!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Pixel for Complex<f32> {
    const SIZE: usize = 8;

    #[inline]
    fn decode(bytes: &[u8]) -> f64 {
        f32::decode(&bytes[..4])
    }
}

impl Pixel for Complex<f64> {
    const SIZE: usize = 16;

    #[inline]
    fn decode(bytes: &[u8]) -> f64 {
        f64::decode(&bytes[..8])
    }
}

/// Bind `$p` to the Rust type for `$kind` and evaluate `$body` with it.
macro_rules! with_pixel_type {
    ($kind:expr, $p:ident => $body:expr) => {
        match $kind {
            PixelKind::U8 => {
                type $p = u8;
                $body
            }
            PixelKind::I8 => {
                type $p = i8;
                $body
            }
            PixelKind::U16 => {
                type $p = u16;
                $body
            }
            PixelKind::I16 => {
                type $p = i16;
                $body
            }
            PixelKind::U32 => {
                type $p = u32;
                $body
            }
            PixelKind::I32 => {
                type $p = i32;
                $body
            }
            PixelKind::U64 => {
                type $p = u64;
                $body
            }
            PixelKind::I64 => {
                type $p = i64;
                $body
            }
            PixelKind::F32 => {
                type $p = f32;
                $body
            }
            PixelKind::F64 => {
                type $p = f64;
                $body
            }
            PixelKind::ComplexF32 => {
                type $p = Complex<f32>;
                $body
            }
            PixelKind::ComplexF64 => {
                type $p = Complex<f64>;
                $body
            }
        }
    };
}

/// Index of the slice the producer wrote last (`counter % slice_count`).
///
/// Non-circular buffers always use slice 0. A circular descriptor with no slices
/// has no active slice.
#[must_use]
pub fn active_slice_index(desc: &FrameDescriptor<'_>) -> Option<u64> {
    if !desc.is_circular {
        return Some(0);
    }
    desc.latest_slice_counter
        .checked_rem(u64::from(desc.slice_count))
}

/// Byte offset of the active slice.
///
/// `None` while the producer is writing, when there is no active slice, or when
/// the offset does not fit in `usize`. The buffer length is not checked here.
#[must_use]
pub fn resolve_slice(desc: &FrameDescriptor<'_>) -> Option<usize> {
    if desc.write_in_progress {
        return None;
    }
    let index = usize::try_from(active_slice_index(desc)?).ok()?;
    index.checked_mul(desc.slice_bytes()?)
}

/// Read-only view of the active slice of a frame.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    kind: PixelKind,
}

impl<'a> PixelView<'a> {
    /// Open the active slice of `desc`.
    ///
    /// Returns [`ViewerError::WriteInProgress`] without touching the buffer when the
    /// producer is mid-write, and a sizing error when the descriptor does not fit its
    /// buffer.
    pub fn new(desc: &FrameDescriptor<'a>) -> AppResult<Self> {
        if desc.write_in_progress {
            return Err(ViewerError::WriteInProgress);
        }

        let layout = check_frame_layout(desc)?;
        let index = active_slice_index(desc)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| ViewerError::InvalidFrame("no active slice".to_string()))?;
        // index < slices, so the slice lies inside the checked total
        let offset = index * layout.slice_bytes;
        let end = offset + layout.slice_bytes;
        let data = desc
            .buffer
            .get(offset..end)
            .ok_or(ViewerError::BufferTooSmall {
                required: end,
                actual: desc.buffer.len(),
            })?;

        Ok(Self {
            data,
            width: desc.width,
            height: desc.height,
            kind: desc.pixel_kind,
        })
    }

    /// Frame width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Element type.
    #[must_use]
    pub fn kind(&self) -> PixelKind {
        self.kind
    }

    /// Bytes of the active slice only.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Region covering the whole frame.
    #[must_use]
    pub fn full_region(&self) -> Region {
        Region::full(self.width, self.height)
    }

    /// Value of pixel `(x, y)` widened to `f64`.
    ///
    /// Coordinates must be inside the frame; callers clamp first.
    #[must_use]
    pub fn value_at(&self, x: u32, y: u32) -> f64 {
        debug_assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} frame",
            self.width,
            self.height
        );
        let es = self.kind.element_size();
        let start = (y as usize * self.width as usize + x as usize) * es;
        let bytes = &self.data[start..start + es];
        with_pixel_type!(self.kind, P => P::decode(bytes))
    }

    /// Call `f` with every value in `region` (clamped to the frame), row-major.
    ///
    /// The element type is resolved once per call.
    pub fn for_each_in<F: FnMut(f64)>(&self, region: &Region, mut f: F) {
        let region = region.clamped(self.width, self.height);
        if region.is_empty() {
            return;
        }
        with_pixel_type!(self.kind, P => self.scan_typed::<P, F>(&region, &mut f))
    }

    fn scan_typed<P: Pixel, F: FnMut(f64)>(&self, region: &Region, f: &mut F) {
        let row_bytes = self.width as usize * P::SIZE;
        let x_start = region.x1 as usize * P::SIZE;
        let x_end = (region.x2 as usize + 1) * P::SIZE;

        for y in region.y1..=region.y2 {
            let row = y as usize * row_bytes;
            for chunk in self.data[row + x_start..row + x_end].chunks_exact(P::SIZE) {
                f(P::decode(chunk));
            }
        }
    }
}
