//! Recording engine - streams capture frames to a WAV file on its own thread
//!
//! The front panel talks to the engine only through [`RecorderHandle`],
//! which enqueues [`EngineCommand`]s on an unbounded FIFO channel. The worker
//! keeps its own sender to re-enqueue `ContinueRecording` after every frame
//! pump, so a `StopRecording` from the panel is seen between two pumps.

mod worker;

pub use worker::{EngineSettings, RecordingEngine, SessionStats};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioBackend, AudioFormat};
use crate::storage::{self, RecordingPointer};

/// Commands processed by the engine worker, strictly in enqueue order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Open `path` and start pumping frames
    StartRecording { path: PathBuf },
    /// Close the current file
    StopRecording,
    /// Pump one period; re-enqueued by the worker while recording
    ContinueRecording,
    /// Close any open file and exit the worker loop
    Shutdown,
}

/// Status updates from the engine worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// No session open
    Idle,
    /// A session is writing to `path`
    Recording { path: PathBuf },
    /// The session writing to `path` was closed
    Stopped { path: PathBuf, stats: SessionStats },
    /// Something went wrong, `path` names the affected session if any
    Error {
        path: Option<PathBuf>,
        message: String,
    },
}

/// What the front panel needs from the recorder
pub trait Recorder {
    /// Begin a new recording. False if one is already active or it could
    /// not be set up.
    fn start(&mut self) -> bool;

    /// End the active recording. False if none was active.
    fn stop(&mut self) -> bool;

    /// Whether the engine reported that the last started session failed
    fn session_failed(&mut self) -> bool;

    /// Most recently started recording, for audition
    fn current_recording(&self) -> Option<PathBuf>;

    /// Release the engine on exit
    fn shutdown(&mut self) {}
}

/// Create command and status channels for the engine
pub fn create_engine_channels() -> (
    mpsc::UnboundedSender<EngineCommand>,
    mpsc::UnboundedReceiver<EngineCommand>,
    broadcast::Sender<EngineStatus>,
    broadcast::Receiver<EngineStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = broadcast::channel(16);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}

/// Panel-side handle to the engine worker.
///
/// `recording` is an advisory cache of what the panel asked for; the worker
/// alone owns the capture device and the file.
pub struct RecorderHandle {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    status_rx: broadcast::Receiver<EngineStatus>,
    format: AudioFormat,
    output_dir: PathBuf,
    pointer: RecordingPointer,
    recording: bool,
    current: Option<PathBuf>,
    failed: bool,
    last_status: Option<EngineStatus>,
    worker: Option<JoinHandle<()>>,
}

impl RecorderHandle {
    /// Spawn the engine worker on a dedicated thread.
    ///
    /// The worker builds its capture device inside that thread, so platform
    /// audio streams never cross threads.
    pub fn spawn(
        settings: EngineSettings,
        backend: Arc<dyn AudioBackend>,
        output_dir: PathBuf,
        pointer: RecordingPointer,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx, status_tx, status_rx) = create_engine_channels();
        let format = settings.format;
        let worker_tx = cmd_tx.clone();

        let worker = std::thread::Builder::new()
            .name("record-engine".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build engine runtime: {}", e);
                        return;
                    }
                };

                let engine = RecordingEngine::new(settings, backend, worker_tx, cmd_rx, status_tx);
                runtime.block_on(engine.run());
            })
            .context("Failed to spawn recording engine thread")?;

        let mut handle = Self::from_channels(cmd_tx, status_rx, format, output_dir, pointer);
        handle.worker = Some(worker);
        Ok(handle)
    }

    /// Build a handle around existing channels without a worker thread
    pub fn from_channels(
        cmd_tx: mpsc::UnboundedSender<EngineCommand>,
        status_rx: broadcast::Receiver<EngineStatus>,
        format: AudioFormat,
        output_dir: PathBuf,
        pointer: RecordingPointer,
    ) -> Self {
        let current = pointer.load();
        Self {
            cmd_tx,
            status_rx,
            format,
            output_dir,
            pointer,
            recording: false,
            current,
            failed: false,
            last_status: None,
            worker: None,
        }
    }

    #[cfg(test)]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Latest status reported by the worker
    #[cfg(test)]
    pub fn status(&mut self) -> Option<EngineStatus> {
        self.poll_status();
        self.last_status.clone()
    }

    fn poll_status(&mut self) {
        loop {
            match self.status_rx.try_recv() {
                Ok(status) => {
                    if let EngineStatus::Error { path, message } = &status {
                        if path.is_some() && *path == self.current {
                            warn!("Recording failed: {}", message);
                            self.failed = true;
                        } else {
                            debug!("Ignoring engine error for {:?}: {}", path, message);
                        }
                    } else if let EngineStatus::Stopped { path, stats } = &status {
                        info!(
                            "Recording {:?} closed: {} periods written, {} dropped",
                            path, stats.frames_written, stats.frames_dropped
                        );
                    } else {
                        debug!("Engine status: {:?}", status);
                    }
                    self.last_status = Some(status);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Missed {} engine status updates", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn send(&self, cmd: EngineCommand) -> bool {
        match self.cmd_tx.send(cmd) {
            Ok(()) => true,
            Err(e) => {
                error!("Recording engine is gone, dropped {:?}", e.0);
                false
            }
        }
    }
}

impl Recorder for RecorderHandle {
    fn start(&mut self) -> bool {
        info!("start requested, recording = {}", self.recording);
        if self.recording {
            warn!("Recording already in progress");
            return false;
        }

        if let Err(e) = self.format.validate_for_recording() {
            error!("Cannot record: {}", e);
            return false;
        }

        if let Err(e) = storage::ensure_output_dir(&self.output_dir) {
            error!("Cannot record: {}", e);
            return false;
        }

        let path = storage::next_recording_path(&self.output_dir);
        if let Err(e) = self.pointer.store(&path) {
            error!("Cannot record: {}", e);
            return false;
        }

        // Statuses from earlier sessions no longer count as failures
        self.poll_status();
        self.failed = false;

        if !self.send(EngineCommand::StartRecording { path: path.clone() }) {
            return false;
        }

        info!("Recording requested: {:?}", path);
        self.current = Some(path);
        self.recording = true;
        true
    }

    fn stop(&mut self) -> bool {
        info!("stop requested, recording = {}", self.recording);
        if !self.recording {
            return false;
        }

        // Cleared even if the worker is gone, so the panel can recover
        self.recording = false;
        self.send(EngineCommand::StopRecording)
    }

    fn session_failed(&mut self) -> bool {
        self.poll_status();
        self.failed
    }

    fn current_recording(&self) -> Option<PathBuf> {
        self.current.clone().or_else(|| self.pointer.load())
    }

    /// Stop the worker thread. Frames still in flight are not guaranteed to
    /// reach the file.
    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        info!("Shutting down recording engine");
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        self.recording = false;
        if worker.join().is_err() {
            error!("Recording engine thread panicked");
        }
    }
}

impl Drop for RecorderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
