//! Engine module housing the classifier control loop.
//!
//! This module exposes trait-based frame/time sources (`backend`), the
//! lifecycle state machine (`state`), readback scheduling (`readback`) and the
//! `ClassifierEngine` orchestration layer (`core`).

pub mod backend;
pub mod core;
pub mod readback;
pub mod state;

pub use backend::{
    Frame, FrameProducer, FrameSource, QueueFrameSource, SceneControl, StubTimeSource,
    SyntheticFrameSource, SystemTimeSource, TimeSource,
};
pub use core::{
    ClassSpec, ClassifierEngine, EngineBuilder, EngineCommand, EngineController, EngineNotice,
    ExampleCountChanged, TickOutcome,
};
pub use readback::{AlwaysAwait, LatencyProbe, ReadbackPlan, ReadbackStrategy};
pub use state::{EngineState, ResumeTarget};
