//! Persistent workers over a shared wave arena
//!
//! Workers are started once per run and receive clones of the arena handles
//! and the stage context. Each stage sends one job per task and waits for
//! one acknowledgement per job. Tasks only ever reach the arena through the
//! handles bound at start; the buffers are never re-bound mid-run.

use super::state::WaveState;
use super::strategy::ExecutionStrategy;
use super::task::{ExecutionTask, Stage, StageContext};
use super::thread_pool::panic_message;
use crate::error::{Result, SimError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

enum Job {
    Run(ExecutionTask),
    Stop,
}

type Ack = std::result::Result<ExecutionTask, String>;

struct Workers {
    jobs: Sender<Job>,
    acks: Receiver<Ack>,
    handles: Vec<JoinHandle<()>>,
}

/// Strategy backed by long-lived worker threads.
///
/// The workers are threads of this process sharing the arena through
/// `Arc` handles. No OS processes or shared-memory segments are involved;
/// the name refers to the one arena every worker writes into.
pub struct SharedArenaStrategy {
    workers: usize,
    running: Option<Workers>,
}

impl SharedArenaStrategy {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            running: None,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }
}

fn worker_loop(arena: WaveState, ctx: Arc<StageContext>, jobs: Receiver<Job>, acks: Sender<Ack>) {
    for job in jobs.iter() {
        let task = match job {
            Job::Run(task) => task,
            Job::Stop => break,
        };
        let ack = panic::catch_unwind(AssertUnwindSafe(|| task.execute(&arena, &ctx)))
            .map(|()| task)
            .map_err(|payload| format!("{task} panicked: {}", panic_message(payload.as_ref())));
        if acks.send(ack).is_err() {
            break;
        }
    }
}

impl ExecutionStrategy for SharedArenaStrategy {
    fn name(&self) -> &'static str {
        "shared_arena"
    }

    fn start(&mut self, state: &WaveState, ctx: &Arc<StageContext>) -> Result<()> {
        self.shutdown();

        let (job_tx, job_rx) = unbounded();
        let (ack_tx, ack_rx) = unbounded();
        let mut handles = Vec::with_capacity(self.workers);
        for i in 0..self.workers {
            let arena = state.clone();
            let ctx = Arc::clone(ctx);
            let jobs = job_rx.clone();
            let acks = ack_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("wave-worker-{i}"))
                .spawn(move || worker_loop(arena, ctx, jobs, acks))?;
            handles.push(handle);
        }
        debug!(workers = self.workers, "Started shared-arena workers");

        self.running = Some(Workers {
            jobs: job_tx,
            acks: ack_rx,
            handles,
        });
        Ok(())
    }

    fn run_stage(&mut self, stage: Stage, _state: &WaveState, _ctx: &Arc<StageContext>) -> Result<()> {
        let workers = self
            .running
            .as_ref()
            .ok_or_else(|| SimError::Worker("workers were not started for this run".into()))?;

        let tasks = stage.tasks();
        for &task in tasks {
            workers
                .jobs
                .send(Job::Run(task))
                .map_err(|_| SimError::Worker("all workers have exited".into()))?;
        }

        // Drain every ack so no task is still running when the stage returns.
        let mut failure = None;
        for _ in tasks {
            match workers.acks.recv() {
                Ok(Ok(_)) => {}
                Ok(Err(message)) => {
                    error!("{message}");
                    failure.get_or_insert(message);
                }
                Err(_) => return Err(SimError::Worker("all workers have exited".into())),
            }
        }
        failure.map_or(Ok(()), |message| Err(SimError::Worker(message)))
    }

    fn shutdown(&mut self) {
        let Some(workers) = self.running.take() else {
            return;
        };
        for _ in &workers.handles {
            // a worker that already exited has dropped its receiver
            let _ = workers.jobs.send(Job::Stop);
        }
        for handle in workers.handles {
            if handle.join().is_err() {
                error!("Shared-arena worker terminated abnormally");
            }
        }
        debug!("Stopped shared-arena workers");
    }
}

impl Drop for SharedArenaStrategy {
    fn drop(&mut self) {
        self.shutdown();
    }
}
