use super::state::WaveState;
use super::strategy::ExecutionStrategy;
use super::task::{Stage, StageContext};
use crate::error::{Result, SimError};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// Dispatches each stage onto a dedicated rayon pool and joins it before
/// returning.
pub struct ThreadPoolStrategy {
    pool: ThreadPool,
}

impl ThreadPoolStrategy {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("wave-pool-{i}"))
            .build()
            .map_err(|e| SimError::Worker(e.to_string()))?;
        debug!(threads, "Built stage thread pool");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ExecutionStrategy for ThreadPoolStrategy {
    fn name(&self) -> &'static str {
        "thread_pool"
    }

    fn run_stage(&mut self, stage: Stage, state: &WaveState, ctx: &Arc<StageContext>) -> Result<()> {
        let ctx: &StageContext = ctx;
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| {
                stage
                    .tasks()
                    .par_iter()
                    .for_each(|task| task.execute(state, ctx));
            });
        }))
        .map_err(|payload| {
            SimError::Worker(format!(
                "{} stage panicked: {}",
                stage.name(),
                panic_message(payload.as_ref())
            ))
        })
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        let strategy = ThreadPoolStrategy::new(2).unwrap();
        assert_eq!(strategy.threads(), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");
    }
}
