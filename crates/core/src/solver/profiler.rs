/// Timing helpers for the step loop.
///
/// Provides an RAII stage scope and a running step timer.
use std::time::{Duration, Instant};
use tracing::trace;

/// A profiling scope that measures elapsed time using RAII.
///
/// Emits a `trace` event with the elapsed time when dropped.
pub struct ProfilerScope {
    start: Instant,
    name: &'static str,
    step: usize,
}

impl ProfilerScope {
    /// Creates a new profiling scope for `name` during `step`.
    pub fn new(name: &'static str, step: usize) -> Self {
        Self {
            start: Instant::now(),
            name,
            step,
        }
    }

    /// Gets elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        trace!(
            stage = self.name,
            step = self.step,
            elapsed_ms = self.elapsed_ms(),
            "stage finished"
        );
    }
}

/// Accumulates per-step wall time over a run.
#[derive(Debug, Clone, Default)]
pub struct StepTimer {
    steps: usize,
    total: Duration,
    last: Duration,
}

impl StepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the duration of one step.
    pub fn record(&mut self, elapsed: Duration) {
        self.steps += 1;
        self.total += elapsed;
        self.last = elapsed;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Gets the last recorded step time in milliseconds.
    pub fn last_step_ms(&self) -> f64 {
        self.last.as_secs_f64() * 1000.0
    }

    /// Mean step time in milliseconds, 0 before the first step.
    pub fn mean_step_ms(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.total.as_secs_f64() * 1000.0 / self.steps as f64
        }
    }
}
