use super::shared_arena::SharedArenaStrategy;
use super::state::WaveState;
use super::task::{Stage, StageContext};
use super::thread_pool::ThreadPoolStrategy;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// How the tasks of each stage are dispatched.
///
/// Every strategy must leave the wave state bit-for-bit identical to
/// [`SequentialStrategy`] after each stage: tasks of one stage
/// write disjoint buffers, so ordering among them is irrelevant, and the
/// call to [`run_stage`](Self::run_stage) does not return until all of them
/// have finished.
pub trait ExecutionStrategy: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Called once per run before the first stage.
    ///
    /// Strategies that keep workers alive across stages bind them to
    /// `state` here. Subsequent [`run_stage`](Self::run_stage) calls of the
    /// same run pass the same arena.
    fn start(&mut self, _state: &WaveState, _ctx: &Arc<StageContext>) -> Result<()> {
        Ok(())
    }

    /// Run every task of `stage` and wait for all of them.
    fn run_stage(&mut self, stage: Stage, state: &WaveState, ctx: &Arc<StageContext>) -> Result<()>;

    /// Release any workers. Idempotent.
    fn shutdown(&mut self) {}
}

/// Selectable execution strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    /// Tasks run one after another on the calling thread.
    #[default]
    Sequential,
    /// Tasks are pulled from a work-stealing pool. `None` uses one thread
    /// per core.
    ThreadPool {
        #[serde(default)]
        threads: Option<usize>,
    },
    /// Persistent workers that share the wave arena for the whole run.
    SharedArena {
        #[serde(default)]
        workers: Option<usize>,
    },
}

/// Runs tasks in stage order on the caller's thread.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl ExecutionStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn run_stage(&mut self, stage: Stage, state: &WaveState, ctx: &Arc<StageContext>) -> Result<()> {
        for task in stage.tasks() {
            task.execute(state, ctx);
        }
        Ok(())
    }
}

/// Worker count for `requested`, defaulting to the available parallelism.
pub(crate) fn worker_count(requested: Option<usize>) -> usize {
    requested
        .filter(|&n| n > 0)
        .or_else(|| std::thread::available_parallelism().ok().map(usize::from))
        .unwrap_or(1)
}

/// Create an execution strategy for `kind`.
///
/// # Example
///
/// ```rust
/// use wave_sim_core::solver::{create_execution_strategy, StrategyKind};
///
/// let strategy = create_execution_strategy(StrategyKind::ThreadPool { threads: Some(2) }).unwrap();
/// assert_eq!(strategy.name(), "thread_pool");
/// ```
pub fn create_execution_strategy(kind: StrategyKind) -> Result<Box<dyn ExecutionStrategy>> {
    let strategy: Box<dyn ExecutionStrategy> = match kind {
        StrategyKind::Sequential => Box::new(SequentialStrategy),
        StrategyKind::ThreadPool { threads } => {
            Box::new(ThreadPoolStrategy::new(worker_count(threads))?)
        }
        StrategyKind::SharedArena { workers } => {
            Box::new(SharedArenaStrategy::new(worker_count(workers)))
        }
    };
    info!("Using {} execution strategy", strategy.name());
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_json() {
        let kind: StrategyKind = serde_json::from_str(r#"{"kind":"shared_arena"}"#).unwrap();
        assert_eq!(kind, StrategyKind::SharedArena { workers: None });

        let json = serde_json::to_string(&StrategyKind::ThreadPool { threads: Some(3) }).unwrap();
        assert_eq!(json, r#"{"kind":"thread_pool","threads":3}"#);
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(Some(3)), 3);
        assert!(worker_count(Some(0)) >= 1);
        assert!(worker_count(None) >= 1);
    }

    #[test]
    fn test_factory_names() {
        for (kind, name) in [
            (StrategyKind::Sequential, "sequential"),
            (StrategyKind::ThreadPool { threads: Some(1) }, "thread_pool"),
            (StrategyKind::SharedArena { workers: Some(1) }, "shared_arena"),
        ] {
            assert_eq!(create_execution_strategy(kind).unwrap().name(), name);
        }
    }
}
