//! Simulation session
//!
//! A [`Session`] owns one configuration and lazily builds the mesh and the
//! material field from it. Changing a parameter marks the affected products
//! stale; they are rebuilt on the next request. A session can run in the
//! foreground or be moved onto a background thread with [`Session::spawn`].

use crate::config::{DomainSize, MeshParams, SimulationConfig};
use crate::error::{Result, SimError};
use crate::grid::{InclusionRegion, Mesh, MeshGenerator};
use crate::material::{MaterialField, MaterialProperties};
use crate::solver::{
    create_execution_strategy, CancelToken, NullObserver, RunOutcome, RunSettings, RunSummary,
    SolverObserver, SolverState, StrategyKind, WaveSolver,
};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Configuration plus the products built from it.
pub struct Session {
    config: SimulationConfig,
    mesh: Option<Arc<Mesh>>,
    material: Option<Arc<MaterialField>>,
    observer: Arc<dyn SolverObserver>,
    solver: WaveSolver,
    runs: usize,
}

impl Session {
    /// Validate `config` and create its execution strategy.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let solver = WaveSolver::new(create_execution_strategy(config.strategy)?);
        Ok(Self {
            config,
            mesh: None,
            material: None,
            observer: Arc::new(NullObserver),
            solver,
            runs: 0,
        })
    }

    /// Session over a mesh and material field produced elsewhere, for
    /// example by [`Mesh::to_blob`] and [`MaterialField::to_blob`] on another
    /// host. `config` supplies the run settings; its geometry is used only
    /// if a parameter change later forces a rebuild.
    pub fn from_blobs(mesh: &[u8], material: &[u8], config: SimulationConfig) -> Result<Self> {
        let mesh = Mesh::from_blob(mesh)?;
        let material = MaterialField::from_blob(material)?;
        if material.dims() != mesh.dims() {
            return Err(SimError::Transport(
                "mesh and material blobs describe different grids".into(),
            ));
        }
        let mut session = Self::new(config)?;
        session.mesh = Some(Arc::new(mesh));
        session.material = Some(Arc::new(material));
        Ok(session)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn solver_state(&self) -> SolverState {
        self.solver.state()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.solver.cancel_token()
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SolverObserver>) {
        self.observer = Arc::clone(&observer);
        self.solver.set_observer(observer);
    }

    fn invalidate_mesh(&mut self) {
        self.mesh = None;
        self.material = None;
    }

    pub fn set_domain(&mut self, domain: DomainSize) -> Result<()> {
        let mut config = self.config.clone();
        config.domain = domain;
        self.replace_geometry(config)
    }

    pub fn set_mesh_params(&mut self, params: MeshParams) -> Result<()> {
        let mut config = self.config.clone();
        config.mesh = params;
        self.replace_geometry(config)
    }

    pub fn set_inclusions(&mut self, inclusions: Vec<InclusionRegion>) -> Result<()> {
        let mut config = self.config.clone();
        config.inclusions = inclusions;
        self.replace_geometry(config)
    }

    fn replace_geometry(&mut self, config: SimulationConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.invalidate_mesh();
        Ok(())
    }

    /// Select the host and inclusion materials.
    pub fn set_materials(&mut self, primary: &str, secondary: &str) -> Result<()> {
        let mut config = self.config.clone();
        config.primary = primary.to_string();
        config.secondary = secondary.to_string();
        config.validate()?;
        self.config = config;
        self.material = None;
        Ok(())
    }

    /// Add or replace a material in the session's table.
    pub fn register_material(&mut self, name: &str, properties: MaterialProperties) -> Result<()> {
        properties.validate(name)?;
        if self.config.primary == name || self.config.secondary == name {
            self.material = None;
        }
        self.config.materials.register(name, properties);
        Ok(())
    }

    pub fn set_courant(&mut self, courant: f64) -> Result<()> {
        let mut config = self.config.clone();
        config.courant = courant;
        config.validate()?;
        self.config = config;
        self.material = None;
        Ok(())
    }

    pub fn set_steps(&mut self, steps: usize) -> Result<()> {
        let mut config = self.config.clone();
        config.steps = steps;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_strategy(&mut self, kind: StrategyKind) -> Result<()> {
        self.solver.set_strategy(create_execution_strategy(kind)?)?;
        self.config.strategy = kind;
        Ok(())
    }

    /// The mesh, generating it if stale.
    pub fn mesh(&mut self) -> Result<Arc<Mesh>> {
        if let Some(mesh) = &self.mesh {
            return Ok(Arc::clone(mesh));
        }
        let mesh = MeshGenerator::new(self.config.domain, self.config.mesh, &self.config.inclusions)
            .generate()?;
        let mesh = Arc::new(mesh);
        self.mesh = Some(Arc::clone(&mesh));
        Ok(mesh)
    }

    /// The material field, rebuilding it (and the mesh) if stale.
    pub fn material(&mut self) -> Result<Arc<MaterialField>> {
        if let Some(material) = &self.material {
            return Ok(Arc::clone(material));
        }
        let mesh = self.mesh()?;
        let config = &self.config;
        let material = Arc::new(MaterialField::build(
            &mesh,
            &config.inclusions,
            &config.materials,
            &config.primary,
            &config.secondary,
            config.courant,
        )?);
        self.material = Some(Arc::clone(&material));
        Ok(material)
    }

    /// Configured output path, or a fresh temp file named after the process,
    /// the wall clock, and this session's run count.
    fn output_path(&mut self) -> PathBuf {
        self.runs += 1;
        if let Some(path) = &self.config.writer.path {
            return path.clone();
        }
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!(
            "wave-sim-{}-{stamp}-{}.wvfd",
            std::process::id(),
            self.runs
        ))
    }

    /// Build anything stale and prepare the solver. Returns the output path.
    pub fn initialize(&mut self) -> Result<PathBuf> {
        let mesh = self.mesh()?;
        let material = self.material()?;
        let output = self.output_path();
        let settings = RunSettings {
            steps: self.config.steps,
            source: self.config.source,
            boundary: self.config.boundary,
            output: output.clone(),
            writer: self.config.writer.clone(),
        };
        self.solver.initialize(mesh, material, settings)?;
        Ok(output)
    }

    /// Run a prepared solver in the foreground.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.solver.run()
    }

    /// Initialize and run in the foreground.
    pub fn execute(&mut self) -> Result<RunSummary> {
        self.initialize()?;
        self.run()
    }

    /// Move the session onto a background thread that initializes and runs
    /// it. The returned handle polls status, cancels, and joins.
    ///
    /// # Errors
    ///
    /// [`SpawnError`] if the thread cannot be started. It hands the session
    /// back unchanged.
    pub fn spawn(self) -> std::result::Result<RunHandle, SpawnError> {
        let monitor = Arc::new(RunMonitor::new(Arc::clone(&self.observer)));
        let forward = Arc::clone(&self.observer);
        let cancel = self.cancel_token();

        // the session crosses over only once the thread exists
        let (handoff, inbox) = bounded::<Session>(1);
        let thread_monitor = Arc::clone(&monitor);
        let spawned = thread::Builder::new()
            .name("wave-session".into())
            .spawn(move || {
                let mut session = inbox.recv().ok()?;
                session.solver.set_observer(thread_monitor.clone());
                let result = session.execute();
                session.solver.set_observer(forward);
                thread_monitor.running.store(false, Ordering::SeqCst);
                Some(FinishedRun { session, result })
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return Err(SpawnError {
                    session: Box::new(self),
                    error: e.into(),
                });
            }
        };
        if let Err(returned) = handoff.send(self) {
            return Err(SpawnError {
                session: Box::new(returned.into_inner()),
                error: SimError::Worker("session thread exited before the handoff".into()),
            });
        }
        info!("Simulation started in the background");
        Ok(RunHandle {
            monitor,
            cancel,
            handle,
        })
    }
}

/// Observer installed for a background run. Keeps the latest status and
/// progress for polling and forwards every notification.
struct RunMonitor {
    status: Mutex<String>,
    last_error: Mutex<Option<String>>,
    progress: AtomicU8,
    running: AtomicBool,
    forward: Arc<dyn SolverObserver>,
}

impl RunMonitor {
    fn new(forward: Arc<dyn SolverObserver>) -> Self {
        Self {
            status: Mutex::new("Starting".to_string()),
            last_error: Mutex::new(None),
            progress: AtomicU8::new(0),
            running: AtomicBool::new(true),
            forward,
        }
    }
}

impl SolverObserver for RunMonitor {
    fn status(&self, text: &str) {
        *self.status.lock() = text.to_string();
        self.forward.status(text);
    }

    fn progress(&self, percent: u8) {
        self.progress.store(percent, Ordering::SeqCst);
        self.forward.progress(percent);
    }

    fn error(&self, error: &SimError) {
        *self.last_error.lock() = Some(error.to_string());
        self.forward.error(error);
    }

    fn step_completed(&self, completed: usize) {
        self.forward.step_completed(completed);
    }
}

/// A background run that never started, with the session it was given.
pub struct SpawnError {
    pub session: Box<Session>,
    pub error: SimError,
}

impl std::fmt::Debug for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "background run did not start: {}", self.error)
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Session returned by a background run, with the run's result.
pub struct FinishedRun {
    pub session: Session,
    pub result: Result<RunSummary>,
}

impl FinishedRun {
    pub fn was_cancelled(&self) -> bool {
        matches!(&self.result, Ok(summary) if summary.outcome == RunOutcome::Cancelled)
    }
}

/// Handle to a session running on a background thread.
pub struct RunHandle {
    monitor: Arc<RunMonitor>,
    cancel: CancelToken,
    handle: JoinHandle<Option<FinishedRun>>,
}

impl RunHandle {
    /// Latest status text.
    pub fn status(&self) -> String {
        self.monitor.status.lock().clone()
    }

    /// Latest whole-percent progress.
    pub fn progress(&self) -> u8 {
        self.monitor.progress.load(Ordering::SeqCst)
    }

    /// Message of the error that ended the run, if any.
    pub fn last_error(&self) -> Option<String> {
        self.monitor.last_error.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.monitor.running.load(Ordering::SeqCst)
    }

    /// Request cancellation before the next step.
    pub fn cancel(&self) {
        debug!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Wait for the run and take the session back.
    ///
    /// # Errors
    ///
    /// [`SimError::Worker`] if the run thread panicked; the session is lost.
    pub fn join(self) -> Result<FinishedRun> {
        self.handle
            .join()
            .map_err(|_| SimError::Worker("session thread panicked".into()))?
            .ok_or_else(|| SimError::Worker("session never reached the run thread".into()))
    }
}
