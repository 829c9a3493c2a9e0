//! Engine worker loop

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::{EngineCommand, EngineStatus};
use crate::audio::{pcm, AudioBackend, AudioError, AudioFormat, CaptureDevice};

/// Continuations between heartbeat log lines
const HEARTBEAT_EVERY: u64 = 500;

#[derive(Error, Debug)]
enum SessionError {
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Static engine configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub format: AudioFormat,
    /// Resolved capture device name
    pub device: String,
    /// Pause after each frame pump
    pub loop_period: Duration,
}

/// Per-session counters, kept after stop until the next start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Periods read from the device and appended to the file
    pub frames_written: u64,
    /// Pumps that found no data (underrun or device error)
    pub frames_dropped: u64,
}

/// An open recording
struct RecordingSession {
    path: PathBuf,
    writer: WavWriter<BufWriter<File>>,
}

/// The engine worker. Owns the capture device and the output file.
pub struct RecordingEngine {
    settings: EngineSettings,
    backend: Arc<dyn AudioBackend>,
    /// Opened on the first start, reconfigured on every start
    capture: Option<Box<dyn CaptureDevice>>,
    session: Option<RecordingSession>,
    stats: SessionStats,
    continuations: u64,
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
    status_tx: broadcast::Sender<EngineStatus>,
}

impl RecordingEngine {
    pub fn new(
        settings: EngineSettings,
        backend: Arc<dyn AudioBackend>,
        cmd_tx: mpsc::UnboundedSender<EngineCommand>,
        cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        Self {
            settings,
            backend,
            capture: None,
            session: None,
            stats: SessionStats::default(),
            continuations: 0,
            cmd_tx,
            cmd_rx,
            status_tx,
        }
    }

    /// Run until a `Shutdown` command arrives
    pub async fn run(mut self) {
        info!(
            "Recording engine started (device '{}', loop period {:?})",
            self.settings.device, self.settings.loop_period
        );
        let _ = self.status_tx.send(EngineStatus::Idle);

        while self.step().await {}

        info!("Recording engine stopped");
    }

    /// Wait for and handle one command. Returns false once the loop should end.
    pub async fn step(&mut self) -> bool {
        let Some(cmd) = self.cmd_rx.recv().await else {
            return false;
        };

        match cmd {
            EngineCommand::StartRecording { path } => self.handle_start(path),
            EngineCommand::StopRecording => self.handle_stop(),
            EngineCommand::ContinueRecording => self.handle_continue().await,
            EngineCommand::Shutdown => {
                info!("Shutdown command received");
                self.handle_stop();
                return false;
            }
        }
        true
    }

    #[cfg(test)]
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Counters of the current or most recent session
    #[cfg(test)]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    fn handle_start(&mut self, path: PathBuf) {
        if self.session.is_some() {
            warn!("Recording already in progress, ignoring start for {:?}", path);
            return;
        }

        info!("Starting recording: {:?}", path);
        match self.open_session(&path) {
            Ok(session) => {
                self.stats = SessionStats::default();
                self.continuations = 0;
                self.session = Some(session);
                let _ = self.status_tx.send(EngineStatus::Recording { path });
                self.enqueue_continue();
            }
            Err(e) => {
                error!("Failed to start recording {:?}: {}", path, e);
                let _ = self.status_tx.send(EngineStatus::Error {
                    path: Some(path),
                    message: e.to_string(),
                });
            }
        }
    }

    fn open_session(&mut self, path: &Path) -> Result<RecordingSession, SessionError> {
        let format = self.settings.format;
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.rate,
            bits_per_sample: format.sample_width * 8,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)?;

        if let Err(e) = self.prepare_capture(&format) {
            // Leave a valid, empty file behind rather than a truncated header
            if let Err(close_err) = writer.finalize() {
                warn!("Failed to close {:?}: {}", path, close_err);
            }
            return Err(e.into());
        }

        Ok(RecordingSession {
            path: path.to_path_buf(),
            writer,
        })
    }

    fn prepare_capture(&mut self, format: &AudioFormat) -> Result<(), AudioError> {
        if self.capture.is_none() {
            self.capture = Some(self.backend.open_capture(&self.settings.device)?);
        }

        match self.capture.as_mut() {
            Some(capture) => capture.configure(format),
            None => Err(AudioError::NotConfigured),
        }
    }

    fn handle_stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            debug!("No recording in progress");
            return;
        };

        info!("Stopping recording: {:?}", session.path);
        // The device stays open for the next start
        if let Some(capture) = self.capture.as_mut() {
            if let Err(e) = capture.pause() {
                warn!("Failed to pause capture: {}", e);
            }
        }
        if let Err(e) = session.writer.flush() {
            warn!("Failed to flush {:?}: {}", session.path, e);
        }
        if let Err(e) = session.writer.finalize() {
            error!("Failed to close {:?}: {}", session.path, e);
            let _ = self.status_tx.send(EngineStatus::Error {
                path: Some(session.path.clone()),
                message: e.to_string(),
            });
        }

        info!(
            "Recording stopped: frames written = {}, frames dropped = {}",
            self.stats.frames_written, self.stats.frames_dropped
        );
        let _ = self.status_tx.send(EngineStatus::Stopped {
            path: session.path,
            stats: self.stats,
        });
    }

    async fn handle_continue(&mut self) {
        let Some(session) = self.session.as_mut() else {
            debug!("Recording has stopped, dropping continuation");
            return;
        };

        let read = match self.capture.as_mut() {
            Some(capture) => capture.read_period(),
            None => Err(AudioError::NotConfigured),
        };

        match read {
            Ok(Some(frames)) if !frames.is_empty() => {
                match append_frames(&mut session.writer, &frames, self.settings.format.sample_width)
                {
                    Ok(()) => self.stats.frames_written += 1,
                    Err(e) => error!("Failed to write frames to {:?}: {}", session.path, e),
                }
            }
            Ok(_) => self.stats.frames_dropped += 1,
            // Device errors are indistinguishable from an underrun here
            Err(e) => {
                debug!("Capture read failed: {}", e);
                self.stats.frames_dropped += 1;
            }
        }

        self.continuations += 1;
        if self.continuations % HEARTBEAT_EVERY == 0 {
            debug!(
                "Recording... {} written, {} dropped",
                self.stats.frames_written, self.stats.frames_dropped
            );
        }

        tokio::time::sleep(self.settings.loop_period).await;
        self.enqueue_continue();
    }

    fn enqueue_continue(&self) {
        if self.cmd_tx.send(EngineCommand::ContinueRecording).is_err() {
            error!("Engine command channel closed");
        }
    }
}

/// Append raw little-endian frames to the WAV body
fn append_frames(
    writer: &mut WavWriter<BufWriter<File>>,
    frames: &[u8],
    sample_width: u16,
) -> Result<(), hound::Error> {
    for sample in pcm::decode(frames, sample_width) {
        writer.write_sample(sample)?;
    }
    Ok(())
}
