//! Result writer
//!
//! A producer/consumer pipeline between the step loop and the output
//! container. The producer blocks when the bounded queue is full, so a slow
//! disk throttles the solver instead of growing memory. A `Close` message
//! ends the consumer after every snapshot queued before it has been written.

mod container;
mod reader;

pub use container::{native_byte_order, ContainerHeader, ContainerWriter, DatasetInfo, MAGIC, VERSION};
pub use reader::ContainerReader;

use crate::config::positive_count;
use crate::error::{ConfigError, Result, SimError};
use crate::grid::Mesh;
use crate::material::MaterialField;
use crate::solver::Snapshot;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

fn default_queue_capacity() -> usize {
    16
}

fn default_shutdown_timeout_ms() -> u64 {
    1000
}

/// Result writer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Output container path. `None` writes to the system temp directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Snapshots buffered between the solver and the consumer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long `finish` waits for the consumer to drain.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            path: None,
            queue_capacity: default_queue_capacity(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<()> {
        positive_count("writer.queue_capacity", self.queue_capacity)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// What the consumer wrote before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterReport {
    pub path: PathBuf,
    pub recorded_steps: u64,
}

enum Message {
    Snapshot(Snapshot),
    Close,
}

struct Consumer {
    queue: Sender<Message>,
    done: Receiver<Result<WriterReport>>,
    handle: JoinHandle<()>,
}

/// Bounded, single-consumer pipeline that persists snapshots.
pub struct ResultWriter {
    capacity: usize,
    path: PathBuf,
    pending: Option<ContainerWriter>,
    consumer: Option<Consumer>,
    #[cfg(test)]
    write_delay: Option<Duration>,
}

impl ResultWriter {
    /// Create the container at `path` and write the static datasets.
    /// Snapshots are accepted once [`start`](Self::start) has run.
    pub fn open(
        path: &Path,
        mesh: &Mesh,
        material: &MaterialField,
        steps: usize,
        config: &WriterConfig,
    ) -> Result<Self> {
        config.validate()?;
        let container = ContainerWriter::create(path, mesh, material, steps)?;
        debug!(path = %path.display(), steps, "Opened result container");
        Ok(Self {
            capacity: config.queue_capacity,
            path: path.to_path_buf(),
            pending: Some(container),
            consumer: None,
            #[cfg(test)]
            write_delay: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_started(&self) -> bool {
        self.consumer.is_some()
    }

    /// Spawn the consumer thread.
    pub fn start(&mut self) -> Result<()> {
        let container = self.pending.take().ok_or(ConfigError::InvalidState {
            operation: "start",
            state: "the writer is already started",
        })?;
        let (queue, inbox) = bounded(self.capacity);
        let (done_tx, done) = bounded(1);
        #[cfg(test)]
        let delay = self.write_delay;
        #[cfg(not(test))]
        let delay = None;

        let handle = thread::Builder::new()
            .name("wave-writer".into())
            .spawn(move || {
                let result = consume(container, &inbox, delay);
                // the producer may have given up waiting
                let _ = done_tx.send(result);
            })?;
        self.consumer = Some(Consumer {
            queue,
            done,
            handle,
        });
        Ok(())
    }

    /// Queue one snapshot, blocking while the queue is full.
    pub fn put(&mut self, snapshot: Snapshot) -> Result<()> {
        let consumer = self.consumer.as_ref().ok_or(ConfigError::InvalidState {
            operation: "put",
            state: "the writer is not started",
        })?;
        consumer
            .queue
            .send(Message::Snapshot(snapshot))
            .map_err(|_| SimError::Writer("consumer exited before the run finished".into()))
    }

    /// Send the close sentinel and wait up to `timeout` for the consumer to
    /// drain. A writer that was never started just closes its container.
    ///
    /// # Errors
    ///
    /// [`SimError::PipelineTimeout`] when the consumer is still busy at the
    /// deadline; the consumer thread is then detached. Write errors seen by
    /// the consumer are returned here.
    pub fn finish(&mut self, timeout: Duration) -> Result<WriterReport> {
        if let Some(container) = self.pending.take() {
            let recorded_steps = container.close()?;
            return Ok(WriterReport {
                path: self.path.clone(),
                recorded_steps,
            });
        }
        let consumer = self.consumer.take().ok_or(ConfigError::InvalidState {
            operation: "finish",
            state: "the writer is already finished",
        })?;

        let deadline = Instant::now() + timeout;
        match consumer.queue.send_timeout(Message::Close, timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Result queue still full after {:?}", timeout);
                return Err(SimError::PipelineTimeout { timeout });
            }
            // consumer already gone; its result is on the done channel
            Err(SendTimeoutError::Disconnected(_)) => {}
        }
        drop(consumer.queue);

        match consumer.done.recv_deadline(deadline) {
            Ok(result) => {
                if consumer.handle.join().is_err() {
                    error!("Result consumer panicked after reporting");
                }
                let report = result?;
                info!(
                    "Wrote {} steps to {}",
                    report.recorded_steps,
                    report.path.display()
                );
                Ok(report)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Result consumer still draining after {:?}", timeout);
                Err(SimError::PipelineTimeout { timeout })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = consumer.handle.join();
                Err(SimError::Writer("consumer terminated without a report".into()))
            }
        }
    }
}

impl Drop for ResultWriter {
    fn drop(&mut self) {
        if self.consumer.is_some() {
            // dropping the queue disconnects the consumer, which then closes
            // the container on its own thread
            debug!(path = %self.path.display(), "Result writer dropped without finish");
        }
    }
}

fn consume(
    mut container: ContainerWriter,
    inbox: &Receiver<Message>,
    delay: Option<Duration>,
) -> Result<WriterReport> {
    let mut failure = None;
    for message in inbox {
        match message {
            Message::Snapshot(snapshot) => {
                if let Some(delay) = delay {
                    thread::sleep(delay);
                }
                // keep draining after a failure so the producer never blocks
                if failure.is_none() {
                    if let Err(e) = container.write_step(&snapshot) {
                        error!("Failed to write step {}: {}", snapshot.step, e);
                        failure = Some(e);
                    }
                }
            }
            Message::Close => break,
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }
    let path = container.path().to_path_buf();
    let recorded_steps = container.close()?;
    Ok(WriterReport {
        path,
        recorded_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainSize, MeshParams};
    use crate::grid::MeshGenerator;
    use crate::material::MaterialTable;
    use crate::solver::{DisplacementComponent, WaveState};

    fn fixture() -> (Mesh, MaterialField) {
        let mesh = MeshGenerator::new(DomainSize::new(3.0, 4.0, 3.0), MeshParams::uniform(1.0), &[])
            .generate()
            .unwrap();
        let material =
            MaterialField::build(&mesh, &[], &MaterialTable::default(), "GaAs", "GaAs", 0.5)
                .unwrap();
        (mesh, material)
    }

    fn snapshot(state: &WaveState, step: usize, value: f64) -> Snapshot {
        let mut snapshot = state.snapshot(step);
        snapshot.uz.fill(value);
        snapshot
    }

    #[test]
    fn test_put_before_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mesh, material) = fixture();
        let state = WaveState::new(mesh.dims());
        let mut writer = ResultWriter::open(
            &dir.path().join("out.wvfd"),
            &mesh,
            &material,
            2,
            &WriterConfig::default(),
        )
        .unwrap();

        let err = writer.put(state.snapshot(0)).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(writer.finish(Duration::from_secs(1)).unwrap().recorded_steps, 0);
    }

    #[test]
    fn test_pipeline_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wvfd");
        let (mesh, material) = fixture();
        let state = WaveState::new(mesh.dims());
        let config = WriterConfig {
            queue_capacity: 1,
            ..WriterConfig::default()
        };
        let mut writer = ResultWriter::open(&path, &mesh, &material, 5, &config).unwrap();
        writer.start().unwrap();
        for step in 0..5 {
            writer.put(snapshot(&state, step, step as f64)).unwrap();
        }
        let report = writer.finish(Duration::from_secs(5)).unwrap();
        assert_eq!(report.recorded_steps, 5);

        let mut reader = ContainerReader::open(&path).unwrap();
        for step in 0..5 {
            let uz = reader.read_step(DisplacementComponent::Z, step).unwrap();
            assert!(uz.data.iter().all(|&v| v == step as f64));
        }
    }

    #[test]
    fn test_finish_times_out_on_slow_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let (mesh, material) = fixture();
        let state = WaveState::new(mesh.dims());
        let mut writer = ResultWriter::open(
            &dir.path().join("slow.wvfd"),
            &mesh,
            &material,
            4,
            &WriterConfig::default(),
        )
        .unwrap();
        writer.write_delay = Some(Duration::from_millis(200));
        writer.start().unwrap();
        for step in 0..4 {
            writer.put(state.snapshot(step)).unwrap();
        }

        let err = writer.finish(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, SimError::PipelineTimeout { .. }));
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mesh, material) = fixture();
        let mut writer = ResultWriter::open(
            &dir.path().join("twice.wvfd"),
            &mesh,
            &material,
            1,
            &WriterConfig::default(),
        )
        .unwrap();
        writer.start().unwrap();
        assert!(writer.start().is_err());
        writer.finish(Duration::from_secs(1)).unwrap();
    }
}
