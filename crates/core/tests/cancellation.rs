mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wave_sim_core::solver::DisplacementComponent;
use wave_sim_core::{
    CancelToken, ContainerReader, RunOutcome, Session, SimulationConfig, SolverObserver, SolverState,
    StrategyKind,
};

/// Cancels the run once `after` steps have completed.
struct CancelAfter {
    token: CancelToken,
    after: usize,
    seen: AtomicUsize,
}

impl SolverObserver for CancelAfter {
    fn step_completed(&self, completed: usize) {
        self.seen.store(completed, Ordering::SeqCst);
        if completed == self.after {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancel_after_k_steps_records_k_steps() {
    for strategy in [
        StrategyKind::Sequential,
        StrategyKind::ThreadPool { threads: Some(2) },
        StrategyKind::SharedArena { workers: Some(2) },
    ] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cancel.wvfd");
        let mut session = Session::new(common::inclusion_block(&path, strategy, 10)).unwrap();
        let observer = Arc::new(CancelAfter {
            token: session.cancel_token(),
            after: 3,
            seen: AtomicUsize::new(0),
        });
        session.set_observer(observer.clone());

        let summary = session.execute().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        assert_eq!(summary.steps_run, 3);
        assert_eq!(summary.recorded_steps, 3);
        assert_eq!(observer.seen.load(Ordering::SeqCst), 3);
        assert_eq!(session.solver_state(), SolverState::Idle);

        let mut reader = ContainerReader::open(&path).unwrap();
        assert_eq!(reader.recorded_steps(), 3);
        assert_eq!(reader.header().steps, 10);
        assert!(reader.read_step(DisplacementComponent::X, 2).is_ok());
        assert!(reader.read_step(DisplacementComponent::X, 3).is_err());
    }
}

#[test]
fn test_cancelled_session_can_run_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("again.wvfd");
    let mut session =
        Session::new(common::inclusion_block(&path, StrategyKind::Sequential, 5)).unwrap();
    session.initialize().unwrap();
    session.cancel_token().cancel();
    assert_eq!(session.run().unwrap().outcome, RunOutcome::Cancelled);

    // the cancelled run cleared the flag
    let summary = session.execute().unwrap();
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.recorded_steps, 5);
}

#[test]
fn test_background_run_can_be_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("background.wvfd");
    let mut config = SimulationConfig::gaas_block();
    config.steps = 50_000;
    config.writer.path = Some(path);
    config.writer.shutdown_timeout_ms = 10_000;
    let handle = Session::new(config).unwrap().spawn().unwrap();

    // a cancel issued before the run starts still applies to it
    handle.cancel();
    std::thread::sleep(Duration::from_millis(10));
    let finished = handle.join().unwrap();
    assert!(finished.was_cancelled());
    let summary = finished.result.unwrap();
    assert!(summary.steps_run < 50_000);
    assert_eq!(summary.recorded_steps as usize, summary.steps_run);
    assert_eq!(finished.session.solver_state(), SolverState::Idle);
}
