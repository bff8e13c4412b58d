//! Elastic Wave Simulation Core Library
//!
//! Simulates 3-D elastic wave propagation through a rectangular block of
//! anisotropic material containing cylindrical inclusions of a second
//! material. The pipeline is:
//!
//! 1. [`grid::MeshGenerator`] builds a rectilinear mesh, graded toward the
//!    inclusion boundaries along x and y.
//! 2. [`material::MaterialField`] rasterizes per-cell stiffness and density
//!    and derives a stable time step.
//! 3. [`solver::WaveSolver`] advances the staggered-grid displacement and
//!    stress fields through an [`solver::ExecutionStrategy`].
//! 4. [`writer::ResultWriter`] streams each step into a self-describing
//!    binary container that [`writer::ContainerReader`] reads back.
//!
//! [`Session`] ties the pieces together and can run in the background.

pub mod config;
pub mod error;
pub mod grid;
pub mod material;
pub mod session;
pub mod solver;
pub mod writer;

// Re-export the main entry points
pub use config::{DomainSize, MeshParams, SimulationConfig};
pub use error::{ConfigError, Result, SimError};
pub use grid::{InclusionRegion, Mesh, MeshGenerator};
pub use material::{MaterialField, MaterialProperties, MaterialTable};
pub use session::{FinishedRun, RunHandle, Session, SpawnError};
pub use solver::{
    create_execution_strategy, CancelToken, RunOutcome, RunSummary, SolverObserver, SolverState,
    StrategyKind, WaveSolver,
};
pub use writer::{ContainerReader, ResultWriter, WriterConfig};
