//! Backend abstractions for the classifier engine.
//!
//! The engine never talks to a camera directly. It pulls frames from a
//! [`FrameSource`] and timestamps work through a [`TimeSource`], so desktop
//! runs and tests can substitute deterministic implementations.

use std::time::Instant;

use crate::error::CaptureError;

/// One fixed-size image, row-major, `channels` values per pixel in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    channels: usize,
    pixels: Vec<f32>,
}

impl Frame {
    /// Wrap a pixel buffer, checking it matches the stated geometry
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        pixels: Vec<f32>,
    ) -> Result<Self, CaptureError> {
        let expected = width * height * channels;
        if pixels.len() != expected {
            return Err(CaptureError::InvalidFrame {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Uniform mid-grey frame, used to warm up the extractor
    pub fn uniform(width: usize, height: usize, channels: usize, value: f32) -> Self {
        Self {
            width,
            height,
            channels,
            pixels: vec![value; width * height * channels],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }
}

/// Trait implemented by frame providers (camera, synthetic, queue-fed).
///
/// `open` is where permission is requested; a denial must surface as
/// `CaptureError::PermissionDenied`.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), CaptureError>;
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
}

/// Trait representing a monotonic time source used for latency and timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

mod desktop_stub;
mod queue;

pub use desktop_stub::{SceneControl, StubTimeSource, SyntheticFrameSource};
pub use queue::{FrameProducer, QueueFrameSource};
