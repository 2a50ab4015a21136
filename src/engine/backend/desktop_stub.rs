use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ExtractorConfig;
use crate::error::CaptureError;

use super::{Frame, FrameSource, TimeSource};

/// Shared handle selecting what the synthetic camera "sees"
#[derive(Debug, Clone, Default)]
pub struct SceneControl {
    scene: Arc<AtomicUsize>,
}

impl SceneControl {
    pub fn set(&self, scene: usize) {
        self.scene.store(scene, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.scene.load(Ordering::SeqCst)
    }
}

/// Desktop stub frame source used for deterministic testing and CLI tooling.
///
/// Each scene index maps to a fixed base image derived from the seed; every
/// frame is that image plus bounded per-frame noise. Frames of the same scene
/// are therefore close to each other and far from other scenes.
pub struct SyntheticFrameSource {
    width: usize,
    height: usize,
    channels: usize,
    seed: u64,
    noise: f32,
    scene: SceneControl,
    rng: StdRng,
    denied: Option<String>,
    open: bool,
}

impl SyntheticFrameSource {
    pub fn new(config: &ExtractorConfig, seed: u64) -> Self {
        Self {
            width: config.input_width,
            height: config.input_height,
            channels: config.channels,
            seed,
            noise: 0.02,
            scene: SceneControl::default(),
            rng: StdRng::seed_from_u64(seed),
            denied: None,
            open: false,
        }
    }

    /// Source that refuses permission on `open`
    pub fn denied(config: &ExtractorConfig, detail: impl Into<String>) -> Self {
        let mut source = Self::new(config, 0);
        source.denied = Some(detail.into());
        source
    }

    /// Per-pixel noise amplitude (0 gives identical frames per scene)
    pub fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    pub fn scene_control(&self) -> SceneControl {
        self.scene.clone()
    }

    /// Noise-free image for a scene; what `next_frame` returns with zero noise
    pub fn scene_frame(&self, scene: usize) -> Frame {
        let len = self.width * self.height * self.channels;
        let mut rng = StdRng::seed_from_u64(self.seed ^ (scene as u64).wrapping_mul(0x9E37_79B9));
        let pixels = (0..len).map(|_| rng.gen_range(0.0_f32..1.0)).collect();
        Frame {
            width: self.width,
            height: self.height,
            channels: self.channels,
            pixels,
        }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        if let Some(detail) = &self.denied {
            return Err(CaptureError::PermissionDenied {
                detail: detail.clone(),
            });
        }
        self.open = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.open {
            return Err(CaptureError::NotOpen);
        }

        let mut frame = self.scene_frame(self.scene.get());
        if self.noise > 0.0 {
            for value in frame.pixels.iter_mut() {
                let jitter = self.rng.gen_range(-self.noise..=self.noise);
                *value = (*value + jitter).clamp(0.0, 1.0);
            }
        }
        Ok(frame)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Deterministic time source for desktop runs.
///
/// Each call to `now()` advances by a fixed step (10ms by default) to
/// guarantee monotonic, reproducible timestamps and latencies.
pub struct StubTimeSource {
    start: Instant,
    step_ms: u64,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self::with_step(Duration::from_millis(10))
    }

    pub fn with_step(step: Duration) -> Self {
        Self {
            start: Instant::now(),
            step_ms: step.as_millis() as u64,
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(self.step_ms, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExtractorConfig {
        ExtractorConfig {
            input_width: 4,
            input_height: 4,
            channels: 3,
            feature_len: 8,
            seed: 1,
        }
    }

    #[test]
    fn test_next_frame_requires_open() {
        let mut source = SyntheticFrameSource::new(&config(), 3);
        assert_eq!(source.next_frame().unwrap_err(), CaptureError::NotOpen);
        source.open().unwrap();
        assert_eq!(source.next_frame().unwrap().pixels().len(), 48);
        source.close();
        assert!(!source.is_open());
    }

    #[test]
    fn test_denied_source() {
        let mut source = SyntheticFrameSource::denied(&config(), "blocked by user");
        assert!(matches!(
            source.open(),
            Err(CaptureError::PermissionDenied { detail }) if detail == "blocked by user"
        ));
        assert!(!source.is_open());
    }

    #[test]
    fn test_scene_control_switches_content() {
        let mut source = SyntheticFrameSource::new(&config(), 3).with_noise(0.0);
        let control = source.scene_control();
        source.open().unwrap();

        let first = source.next_frame().unwrap();
        assert_eq!(first, source.scene_frame(0));

        control.set(2);
        let second = source.next_frame().unwrap();
        assert_eq!(second, source.scene_frame(2));
        assert_ne!(first, second);
    }

    #[test]
    fn test_noise_stays_bounded() {
        let mut source = SyntheticFrameSource::new(&config(), 3).with_noise(0.05);
        source.open().unwrap();
        let base = source.scene_frame(0);
        let noisy = source.next_frame().unwrap();
        for (a, b) in base.pixels().iter().zip(noisy.pixels()) {
            assert!((a - b).abs() <= 0.05 + 1e-6);
        }
    }

    #[test]
    fn test_stub_time_source_advances() {
        let source = StubTimeSource::with_step(Duration::from_millis(5));
        let a = source.now();
        let b = source.now();
        assert_eq!(b.duration_since(a), Duration::from_millis(5));
    }
}
