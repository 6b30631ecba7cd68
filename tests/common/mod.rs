//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use shm_viewer::autoscale::{AutoscaleConfig, AutoscaleController};
use shm_viewer::frame::{FrameDescriptor, PixelKind};
use shm_viewer::poll::FrameSource;
use shm_viewer::stats::StatsEngine;
use shm_viewer::trace::TraceRecorder;
use shm_viewer::FrameViewer;

/// Native-endian bytes of a `u16` image.
pub fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// `width x height` u16 frame holding `0, 1, 2, ...` in row-major order.
pub fn u16_ramp(width: u32, height: u32) -> Vec<u8> {
    let values: Vec<u16> = (0..width * height).map(|v| v as u16).collect();
    u16_bytes(&values)
}

/// Viewer with small buffers so tests stay cheap.
pub fn small_viewer(hist_bins: usize, trace_capacity: usize) -> FrameViewer {
    FrameViewer::new(
        StatsEngine::new(hist_bins),
        AutoscaleController::default(),
        AutoscaleConfig::default(),
        TraceRecorder::new(trace_capacity, hist_bins),
    )
}

/// In-process stand-in for the shared-memory producer.
///
/// Holds a circular stack of u16 slices. Publishing bumps the write counter,
/// fills the slice it selects, then bumps the generation.
#[derive(Debug)]
pub struct SyntheticProducer {
    pub width: u32,
    pub height: u32,
    pub slices: u32,
    pub buffer: Vec<u8>,
    pub write_counter: u64,
    pub generation: u64,
    pub busy: bool,
}

impl SyntheticProducer {
    pub fn new(width: u32, height: u32, slices: u32) -> Self {
        let slice_len = (width * height) as usize * PixelKind::U16.element_size();
        Self {
            width,
            height,
            slices,
            buffer: vec![0; slice_len * slices as usize],
            write_counter: 0,
            generation: 0,
            busy: false,
        }
    }

    fn slice_len(&self) -> usize {
        (self.width * self.height) as usize * PixelKind::U16.element_size()
    }

    /// Write a frame filled with `value` into the next slice.
    pub fn publish(&mut self, value: u16) {
        self.write_counter += 1;
        let slice = (self.write_counter % u64::from(self.slices)) as usize;
        let len = self.slice_len();
        for px in self.buffer[slice * len..(slice + 1) * len].chunks_exact_mut(2) {
            px.copy_from_slice(&value.to_ne_bytes());
        }
        self.generation += 1;
    }

    pub fn descriptor(&self) -> FrameDescriptor<'_> {
        FrameDescriptor::new(self.width, self.height, PixelKind::U16, &self.buffer)
            .circular(self.slices, self.write_counter)
            .with_generation(self.generation)
            .with_write_in_progress(self.busy)
    }
}

impl FrameSource for SyntheticProducer {
    fn with_frame<R, F>(&mut self, f: F) -> Option<R>
    where
        F: FnOnce(&FrameDescriptor<'_>) -> R,
    {
        Some(f(&self.descriptor()))
    }
}

/// Producer shared between a test body and a running driver.
#[derive(Debug, Clone)]
pub struct SharedProducer(pub Arc<Mutex<SyntheticProducer>>);

impl SharedProducer {
    pub fn new(width: u32, height: u32, slices: u32) -> Self {
        Self(Arc::new(Mutex::new(SyntheticProducer::new(width, height, slices))))
    }

    pub fn publish(&self, value: u16) {
        self.0.lock().publish(value);
    }
}

impl FrameSource for SharedProducer {
    fn with_frame<R, F>(&mut self, f: F) -> Option<R>
    where
        F: FnOnce(&FrameDescriptor<'_>) -> R,
    {
        let producer = self.0.lock();
        Some(f(&producer.descriptor()))
    }
}
