//! Run observation and cancellation
//!
//! Callbacks are invoked on the thread driving the run. Implementations
//! must be cheap; the step loop waits for them.

use crate::error::SimError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives lifecycle notifications from a [`WaveSolver`](super::WaveSolver).
///
/// Every method has a no-op default, so observers implement only what they
/// need.
pub trait SolverObserver: Send + Sync {
    /// Human-readable lifecycle change ("Running simulation", ...).
    fn status(&self, _text: &str) {}

    /// Whole-percent progress, reported only when the percentage increases.
    fn progress(&self, _percent: u8) {}

    /// A run failed; the solver has already returned to idle.
    fn error(&self, _error: &SimError) {}

    /// `completed` steps have been handed to the result writer.
    fn step_completed(&self, _completed: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SolverObserver for NullObserver {}

/// Cooperative cancellation flag shared between a solver and its callers.
///
/// The step loop checks it before each step; a cancelled run still shuts
/// down its writer normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Converts completed-step counts into strictly increasing percentages.
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    total: usize,
    last: Option<u8>,
}

impl ProgressThrottle {
    pub(crate) fn new(total: usize) -> Self {
        Self { total, last: None }
    }

    /// Percentage to report after `completed` steps, if it moved.
    pub(crate) fn update(&mut self, completed: usize) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let percent = u8::try_from(completed.min(self.total) * 100 / self.total).unwrap_or(100);
        if self.last.is_some_and(|last| last >= percent) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_reports_each_percent_once() {
        let mut throttle = ProgressThrottle::new(300);
        let reported: Vec<u8> = (1..=300).filter_map(|s| throttle.update(s)).collect();
        assert_eq!(reported.len(), 101);
        assert_eq!(reported.first(), Some(&0));
        assert_eq!(reported.last(), Some(&100));
        assert!(reported.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_throttle_short_runs_skip_percentages() {
        let mut throttle = ProgressThrottle::new(4);
        let reported: Vec<u8> = (1..=4).filter_map(|s| throttle.update(s)).collect();
        assert_eq!(reported, vec![25, 50, 75, 100]);
        assert_eq!(ProgressThrottle::new(0).update(0), None);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!other.is_cancelled());
    }
}
