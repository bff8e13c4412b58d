//! Elastic wave solver
//!
//! Second-order staggered-grid finite differences for 3-D elastic wave
//! propagation. A run is a loop of time steps; each step is split into four
//! stages whose tasks write disjoint buffers, so the same step can be
//! executed sequentially, on a thread pool, or by persistent workers sharing
//! the wave arena, with identical results.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wave_sim_core::config::SimulationConfig;
//! use wave_sim_core::grid::MeshGenerator;
//! use wave_sim_core::material::MaterialField;
//! use wave_sim_core::solver::{create_execution_strategy, RunSettings, WaveSolver};
//!
//! # fn main() -> wave_sim_core::Result<()> {
//! let config = SimulationConfig::gaas_block();
//! let mesh = MeshGenerator::new(config.domain, config.mesh, &config.inclusions).generate()?;
//! let material = MaterialField::build(
//!     &mesh,
//!     &config.inclusions,
//!     &config.materials,
//!     &config.primary,
//!     &config.secondary,
//!     config.courant,
//! )?;
//!
//! let mut solver = WaveSolver::new(create_execution_strategy(config.strategy)?);
//! solver.initialize(
//!     Arc::new(mesh),
//!     Arc::new(material),
//!     RunSettings {
//!         steps: config.steps,
//!         source: config.source,
//!         boundary: config.boundary,
//!         output: "block.wvfd".into(),
//!         writer: config.writer,
//!     },
//! )?;
//! let summary = solver.run()?;
//! println!("{} steps recorded", summary.recorded_steps);
//! # Ok(())
//! # }
//! ```

pub mod boundary;
mod fields;
mod kernels;
mod observer;
pub mod profiler;
mod shared_arena;
mod source;
mod state;
mod strategy;
mod task;
mod thread_pool;
mod wave_solver;

// Re-exports
pub use boundary::{BoundaryConfig, Face, LateralBoundary, SurfaceBoundary};
pub use fields::Field3;
pub use observer::{CancelToken, NullObserver, SolverObserver};
pub use profiler::{ProfilerScope, StepTimer};
pub use shared_arena::SharedArenaStrategy;
pub use source::{SourceConfig, Waveform};
pub use state::{
    DisplacementComponent, SharedField, Snapshot, StressComponent, TimeLevel, WaveState,
};
pub use strategy::{
    create_execution_strategy, ExecutionStrategy, SequentialStrategy, StrategyKind,
};
pub use task::{BufferId, ExecutionTask, Stage, StageContext};
pub use thread_pool::ThreadPoolStrategy;
pub use wave_solver::{RunOutcome, RunSettings, RunSummary, SolverState, WaveSolver};
