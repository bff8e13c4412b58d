use super::boundary::BoundaryConfig;
use super::observer::{CancelToken, NullObserver, ProgressThrottle, SolverObserver};
use super::profiler::{ProfilerScope, StepTimer};
use super::source::SourceConfig;
use super::state::{TimeLevel, WaveState};
use super::strategy::ExecutionStrategy;
use super::task::{Stage, StageContext};
use crate::error::{ConfigError, Result, SimError};
use crate::grid::Mesh;
use crate::material::MaterialField;
use crate::writer::{ResultWriter, WriterConfig};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Solver lifecycle.
///
/// `Idle -> Initialized -> Running -> {Completed | Cancelled} -> Idle`.
/// Any failure returns the solver to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Idle,
    Initialized,
    Running,
    Completed,
    Cancelled,
}

impl SolverState {
    pub fn name(self) -> &'static str {
        match self {
            SolverState::Idle => "idle",
            SolverState::Initialized => "initialized",
            SolverState::Running => "running",
            SolverState::Completed => "completed",
            SolverState::Cancelled => "cancelled",
        }
    }

    fn described(self) -> &'static str {
        match self {
            SolverState::Idle => "the solver is idle",
            SolverState::Initialized => "the solver is initialized",
            SolverState::Running => "the solver is running",
            SolverState::Completed => "the solver is completed",
            SolverState::Cancelled => "the solver is cancelled",
        }
    }
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Per-run inputs besides the mesh and material field.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub steps: usize,
    pub source: SourceConfig,
    pub boundary: BoundaryConfig,
    pub output: PathBuf,
    pub writer: WriterConfig,
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Steps fully advanced and handed to the writer.
    pub steps_run: usize,
    /// Steps the writer stored.
    pub recorded_steps: u64,
    pub dt: f64,
    pub elapsed: Duration,
    pub mean_step_ms: f64,
    pub output: PathBuf,
}

struct PreparedRun {
    wave: WaveState,
    ctx: Arc<StageContext>,
    writer: ResultWriter,
    settings: RunSettings,
}

/// Drives the time-step loop over a mesh and material field.
///
/// Each step injects the source, runs the four stages through the
/// configured [`ExecutionStrategy`], rotates the time levels, and hands a
/// snapshot to the result writer.
pub struct WaveSolver {
    state: SolverState,
    strategy: Box<dyn ExecutionStrategy>,
    observer: Arc<dyn SolverObserver>,
    cancel: CancelToken,
    prepared: Option<PreparedRun>,
}

impl WaveSolver {
    pub fn new(strategy: Box<dyn ExecutionStrategy>) -> Self {
        Self {
            state: SolverState::Idle,
            strategy,
            observer: Arc::new(NullObserver),
            cancel: CancelToken::new(),
            prepared: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SolverObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SolverObserver>) {
        self.observer = observer;
    }

    pub fn observer(&self) -> &Arc<dyn SolverObserver> {
        &self.observer
    }

    /// Swap the execution strategy. Not allowed while a run is prepared.
    pub fn set_strategy(&mut self, strategy: Box<dyn ExecutionStrategy>) -> Result<()> {
        if self.state != SolverState::Idle {
            return Err(self.invalid_state("set_strategy"));
        }
        self.strategy.shutdown();
        self.strategy = strategy;
        Ok(())
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Token that stops the current or next run before its next step.
    /// The flag is cleared when a run ends.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn invalid_state(&self, operation: &'static str) -> SimError {
        ConfigError::InvalidState {
            operation,
            state: self.state.described(),
        }
        .into()
    }

    fn set_state(&mut self, state: SolverState) {
        debug!("Solver {} -> {}", self.state, state);
        self.state = state;
    }

    /// Allocate the wave fields and open the result writer.
    ///
    /// Re-initializing an initialized solver discards the earlier
    /// preparation and closes its writer.
    pub fn initialize(
        &mut self,
        mesh: Arc<Mesh>,
        material: Arc<MaterialField>,
        settings: RunSettings,
    ) -> Result<()> {
        if !matches!(self.state, SolverState::Idle | SolverState::Initialized) {
            return Err(self.invalid_state("initialize"));
        }
        if material.dims() != mesh.dims() {
            return Err(SimError::invalid(
                "material",
                "material field does not match the mesh dimensions",
            ));
        }
        if settings.steps == 0 {
            return Err(SimError::invalid("steps", "must be at least 1"));
        }
        settings.source.validate()?;

        if let Some(mut previous) = self.prepared.take() {
            if let Err(e) = previous.writer.finish(settings.writer.shutdown_timeout()) {
                warn!("Discarding previous preparation: {}", e);
            }
            self.set_state(SolverState::Idle);
        }

        let mut writer = ResultWriter::open(
            &settings.output,
            &mesh,
            &material,
            settings.steps,
            &settings.writer,
        )?;
        writer.start()?;

        let dims = mesh.dims();
        let ctx = StageContext {
            spacing: mesh.spacing(),
            dt: material.dt(),
            material,
            boundary: settings.boundary,
        };
        info!(
            "Initialized {}x{}x{} grid for {} steps, dt = {:.4e} s",
            dims.nx, dims.ny, dims.nz, settings.steps, ctx.dt
        );

        self.prepared = Some(PreparedRun {
            wave: WaveState::new(dims),
            ctx: Arc::new(ctx),
            writer,
            settings,
        });
        self.set_state(SolverState::Initialized);
        self.observer.status("Solver initialized");
        Ok(())
    }

    /// Run the prepared simulation to completion or cancellation.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidState`] unless the solver is initialized.
    /// Stage, writer, and timeout failures are reported to the observer,
    /// then returned; the solver is idle afterwards either way.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.state != SolverState::Initialized {
            return Err(self.invalid_state("run"));
        }
        let Some(mut prepared) = self.prepared.take() else {
            return Err(self.invalid_state("run"));
        };

        self.set_state(SolverState::Running);
        self.observer.status("Running simulation");
        let started = Instant::now();

        let stepped = self.step_loop(&mut prepared);
        self.strategy.shutdown();
        // a cancellation consumed by this run must not leak into the next
        self.cancel.reset();

        let timeout = prepared.settings.writer.shutdown_timeout();
        let finished = match stepped {
            Ok((outcome, steps_run, timer)) => prepared
                .writer
                .finish(timeout)
                .map(|report| (outcome, steps_run, timer, report)),
            Err(e) => {
                if let Err(cleanup) = prepared.writer.finish(timeout) {
                    warn!("Result writer cleanup failed: {}", cleanup);
                }
                Err(e)
            }
        };

        match finished {
            Ok((outcome, steps_run, timer, report)) => {
                let summary = RunSummary {
                    outcome,
                    steps_run,
                    recorded_steps: report.recorded_steps,
                    dt: prepared.ctx.dt,
                    elapsed: started.elapsed(),
                    mean_step_ms: timer.mean_step_ms(),
                    output: report.path,
                };
                match outcome {
                    RunOutcome::Completed => {
                        self.set_state(SolverState::Completed);
                        self.observer.status("Simulation complete");
                    }
                    RunOutcome::Cancelled => {
                        self.set_state(SolverState::Cancelled);
                        self.observer.status("Simulation cancelled");
                    }
                }
                info!(
                    "Run {:?}: {} steps in {:.2?} ({:.3} ms/step)",
                    outcome, steps_run, summary.elapsed, summary.mean_step_ms
                );
                self.set_state(SolverState::Idle);
                Ok(summary)
            }
            Err(e) => {
                error!("Simulation failed: {}", e);
                self.set_state(SolverState::Idle);
                self.observer.error(&e);
                Err(e)
            }
        }
    }

    fn step_loop(&mut self, run: &mut PreparedRun) -> Result<(RunOutcome, usize, StepTimer)> {
        let steps = run.settings.steps;
        let dt = run.ctx.dt;
        let source = run.settings.source;
        let mut throttle = ProgressThrottle::new(steps);
        let mut timer = StepTimer::new();

        self.strategy.start(&run.wave, &run.ctx)?;
        for step in 0..steps {
            if self.cancel.is_cancelled() {
                warn!("Cancelled after {} of {} steps", step, steps);
                return Ok((RunOutcome::Cancelled, step, timer));
            }
            let step_started = Instant::now();

            source.inject(run.wave.displacement(source.component, TimeLevel::Current), step, dt);
            for stage in Stage::ORDER {
                let _scope = ProfilerScope::new(stage.name(), step);
                self.strategy.run_stage(stage, &run.wave, &run.ctx)?;
            }
            run.wave.rotate();
            run.writer.put(run.wave.snapshot(step))?;

            timer.record(step_started.elapsed());
            self.observer.step_completed(step + 1);
            if let Some(percent) = throttle.update(step + 1) {
                self.observer.progress(percent);
            }
        }
        Ok((RunOutcome::Completed, steps, timer))
    }
}

impl Drop for WaveSolver {
    fn drop(&mut self) {
        self.strategy.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainSize, MeshParams};
    use crate::grid::MeshGenerator;
    use crate::material::MaterialTable;
    use crate::solver::strategy::SequentialStrategy;
    use parking_lot::Mutex;

    fn inputs() -> (Arc<Mesh>, Arc<MaterialField>) {
        let mesh = MeshGenerator::new(DomainSize::new(4.0, 5.0, 6.0), MeshParams::uniform(1.0), &[])
            .generate()
            .unwrap();
        let material =
            MaterialField::build(&mesh, &[], &MaterialTable::default(), "GaAs", "GaAs", 0.5)
                .unwrap();
        (Arc::new(mesh), Arc::new(material))
    }

    fn settings(dir: &tempfile::TempDir, steps: usize) -> RunSettings {
        RunSettings {
            steps,
            source: SourceConfig::default(),
            boundary: BoundaryConfig::default(),
            output: dir.path().join("run.wvfd"),
            writer: WriterConfig::default(),
        }
    }

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<String>>,
        progress: Mutex<Vec<u8>>,
        errors: Mutex<usize>,
    }

    impl SolverObserver for Recorder {
        fn status(&self, text: &str) {
            self.statuses.lock().push(text.to_string());
        }

        fn progress(&self, percent: u8) {
            self.progress.lock().push(percent);
        }

        fn error(&self, _error: &SimError) {
            *self.errors.lock() += 1;
        }
    }

    #[test]
    fn test_run_before_initialize_fails() {
        let mut solver = WaveSolver::new(Box::new(SequentialStrategy));
        let err = solver.run().unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(solver.state(), SolverState::Idle);
    }

    #[test]
    fn test_lifecycle_and_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let (mesh, material) = inputs();
        let recorder = Arc::new(Recorder::default());
        let mut solver =
            WaveSolver::new(Box::new(SequentialStrategy)).with_observer(recorder.clone());

        solver.initialize(mesh, material, settings(&dir, 4)).unwrap();
        assert_eq!(solver.state(), SolverState::Initialized);
        assert!(solver.set_strategy(Box::new(SequentialStrategy)).is_err());

        let summary = solver.run().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.steps_run, 4);
        assert_eq!(summary.recorded_steps, 4);
        assert_eq!(solver.state(), SolverState::Idle);

        assert_eq!(*recorder.progress.lock(), vec![25, 50, 75, 100]);
        let statuses = recorder.statuses.lock();
        assert_eq!(statuses.first().map(String::as_str), Some("Solver initialized"));
        assert_eq!(statuses.last().map(String::as_str), Some("Simulation complete"));
        assert_eq!(*recorder.errors.lock(), 0);

        // a finished run must be prepared again
        assert!(solver.run().unwrap_err().is_configuration());
    }

    #[test]
    fn test_cancel_before_run_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mesh, material) = inputs();
        let mut solver = WaveSolver::new(Box::new(SequentialStrategy));
        solver.initialize(mesh, material, settings(&dir, 3)).unwrap();
        solver.cancel_token().cancel();

        let summary = solver.run().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert_eq!(summary.steps_run, 0);
        assert_eq!(summary.recorded_steps, 0);
        assert_eq!(solver.state(), SolverState::Idle);
    }

    #[test]
    fn test_reinitialize_replaces_preparation() {
        let dir = tempfile::tempdir().unwrap();
        let (mesh, material) = inputs();
        let mut solver = WaveSolver::new(Box::new(SequentialStrategy));
        solver
            .initialize(mesh.clone(), material.clone(), settings(&dir, 2))
            .unwrap();
        let mut second = settings(&dir, 3);
        second.output = dir.path().join("second.wvfd");
        solver.initialize(mesh, material, second).unwrap();

        let summary = solver.run().unwrap();
        assert_eq!(summary.steps_run, 3);
        assert!(summary.output.ends_with("second.wvfd"));
    }

    #[test]
    fn test_mismatched_material_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (_, material) = inputs();
        let other = MeshGenerator::new(DomainSize::new(3.0, 3.0, 3.0), MeshParams::uniform(1.0), &[])
            .generate()
            .unwrap();
        let mut solver = WaveSolver::new(Box::new(SequentialStrategy));
        let err = solver
            .initialize(Arc::new(other), material, settings(&dir, 2))
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(solver.state(), SolverState::Idle);
    }
}
