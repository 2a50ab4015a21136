//! Core telemetry event types recorded in the hub's history and exposed to
//! the CLI through snapshots.

use serde::{Deserialize, Serialize};

/// High-level lifecycle stages reported by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    CaptureGranted,
    CaptureDenied,
    Loading,
    Ready,
    Paused,
    Resumed,
    Stopped,
    Shutdown,
}

/// Rich metric events covering readback latency, predictions and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    ReadbackLatency {
        last_ms: f32,
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    Prediction {
        top_class: Option<usize>,
        k: usize,
    },
    ExampleRecorded {
        class: usize,
        count: usize,
    },
    ClassCleared {
        class: usize,
        removed: usize,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    Error {
        code: i32,
        context: String,
    },
}
