//! Readback strategies for classification ticks.
//!
//! A strategy decides, per classification tick, whether the engine waits for
//! the similarity job, times it, or skips the wait and instead sleeps for the
//! last measured latency before reading whatever has finished.

use std::time::Duration;

use crate::config::{ReadbackPolicy, SchedulerConfig};

/// What the engine should do with one similarity job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackPlan {
    /// Wait for completion; next tick follows immediately
    Await,
    /// Wait for completion and report the submit→completion latency
    Measure,
    /// Sleep this long instead of waiting for completion, then take the
    /// scores only if the job has finished
    Throttle(Duration),
}

pub trait ReadbackStrategy: Send {
    /// Plan for the `tick`-th classification tick (0-based)
    fn plan(&mut self, tick: u64) -> ReadbackPlan;

    /// Latency measured for a `Measure` plan
    fn observe_latency(&mut self, latency: Duration);

    /// Last latency observed, if any
    fn last_latency(&self) -> Option<Duration> {
        None
    }
}

/// Always wait for true completion
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAwait;

impl ReadbackStrategy for AlwaysAwait {
    fn plan(&mut self, _tick: u64) -> ReadbackPlan {
        ReadbackPlan::Await
    }

    fn observe_latency(&mut self, _latency: Duration) {}
}

/// Measure every N ticks, throttle by the last measurement in between
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    every: u64,
    last: Option<Duration>,
}

impl LatencyProbe {
    pub const DEFAULT_INTERVAL: u64 = 20;

    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            last: None,
        }
    }
}

impl Default for LatencyProbe {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl ReadbackStrategy for LatencyProbe {
    fn plan(&mut self, tick: u64) -> ReadbackPlan {
        match self.last {
            Some(latency) if tick % self.every != 0 => ReadbackPlan::Throttle(latency),
            _ => ReadbackPlan::Measure,
        }
    }

    fn observe_latency(&mut self, latency: Duration) {
        self.last = Some(latency);
    }

    fn last_latency(&self) -> Option<Duration> {
        self.last
    }
}

/// Strategy matching the scheduler configuration
pub fn from_config(config: &SchedulerConfig) -> Box<dyn ReadbackStrategy> {
    match config.readback {
        ReadbackPolicy::Await => Box::new(AlwaysAwait),
        ReadbackPolicy::LatencyProbe => Box::new(LatencyProbe::new(config.measure_every_n_ticks)),
    }
}
