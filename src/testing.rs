//! Scripted stand-ins for audio hardware, switches and the recorder

use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AudioBackend, AudioError, AudioFormat, CaptureDevice, PlaybackDevice};
use crate::audition::{AuditionError, AuditionReport, Auditioner};
use crate::engine::Recorder;
use crate::panel::{Switch, SwitchInput, SwitchLevels};

#[derive(Default)]
pub struct FakeAudio {
    pub devices: Vec<String>,
    pub capture_opens: usize,
    /// Whether the capture is running; cleared by `pause`
    pub capturing: bool,
    pub capture_pauses: usize,
    pub configured: Vec<AudioFormat>,
    pub reads: VecDeque<Option<Vec<u8>>>,
    pub fail_capture: bool,
    pub playback_formats: Vec<AudioFormat>,
    pub played: Vec<u8>,
    pub paced: bool,
}

/// Audio backend whose devices replay a script and record what they were given
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeAudio>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(self, names: &[&str]) -> Self {
        self.state.lock().devices = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Results of successive capture reads; exhausted scripts read as no data
    pub fn with_reads(self, reads: Vec<Option<Vec<u8>>>) -> Self {
        self.state.lock().reads = reads.into();
        self
    }

    pub fn failing_capture(self) -> Self {
        self.state.lock().fail_capture = true;
        self
    }

    /// Make playback writes take as long as the audio they carry
    pub fn paced(self) -> Self {
        self.state.lock().paced = true;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeAudio> {
        self.state.lock()
    }
}

impl AudioBackend for FakeBackend {
    fn capture_device_names(&self) -> Result<Vec<String>, AudioError> {
        Ok(self.state.lock().devices.clone())
    }

    fn open_capture(&self, device: &str) -> Result<Box<dyn CaptureDevice>, AudioError> {
        let mut state = self.state.lock();
        if state.fail_capture || !state.devices.iter().any(|d| d == device) {
            return Err(AudioError::DeviceNotFound(device.to_string()));
        }
        state.capture_opens += 1;
        Ok(Box::new(FakeCapture {
            state: self.state.clone(),
            configured: false,
        }))
    }

    fn open_playback(
        &self,
        _device: &str,
        format: &AudioFormat,
    ) -> Result<Box<dyn PlaybackDevice>, AudioError> {
        let mut state = self.state.lock();
        state.playback_formats.push(*format);
        Ok(Box::new(FakePlayback {
            state: self.state.clone(),
            format: *format,
            paced: state.paced,
        }))
    }
}

struct FakeCapture {
    state: Arc<Mutex<FakeAudio>>,
    configured: bool,
}

impl CaptureDevice for FakeCapture {
    fn configure(&mut self, format: &AudioFormat) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.configured.push(*format);
        state.capturing = true;
        self.configured = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        state.capturing = false;
        state.capture_pauses += 1;
        Ok(())
    }

    fn read_period(&mut self) -> Result<Option<Vec<u8>>, AudioError> {
        if !self.configured {
            return Err(AudioError::NotConfigured);
        }
        Ok(self.state.lock().reads.pop_front().flatten())
    }
}

struct FakePlayback {
    state: Arc<Mutex<FakeAudio>>,
    format: AudioFormat,
    paced: bool,
}

impl PlaybackDevice for FakePlayback {
    fn write(&mut self, frames: &[u8]) -> Result<(), AudioError> {
        self.state.lock().played.extend_from_slice(frames);
        if self.paced {
            let frame_count = frames.len() / self.format.frame_bytes().max(1);
            std::thread::sleep(Duration::from_secs_f64(
                frame_count as f64 / self.format.rate as f64,
            ));
        }
        Ok(())
    }
}

/// Switch input replaying one set of held switches per read
#[derive(Clone, Default)]
pub struct ScriptedInput {
    frames: Arc<Mutex<VecDeque<Vec<Switch>>>>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one tick with `held` down and everything else up
    pub fn push(&self, held: &[Switch]) {
        self.frames.lock().push_back(held.to_vec());
    }

    /// Queue `ticks` ticks with nothing pressed
    pub fn idle(&self, ticks: usize) {
        for _ in 0..ticks {
            self.push(&[]);
        }
    }
}

impl SwitchInput for ScriptedInput {
    fn read(&mut self) -> SwitchLevels {
        let held = self.frames.lock().pop_front().unwrap_or_default();
        SwitchLevels::from_held(&held)
    }
}

/// Recorder that only counts calls
#[derive(Debug, Default)]
pub struct FakeRecorder {
    pub refuse_start: bool,
    pub failed: bool,
    pub recording: bool,
    pub starts: usize,
    pub stops: usize,
    pub current: Option<PathBuf>,
}

impl Recorder for FakeRecorder {
    fn start(&mut self) -> bool {
        self.starts += 1;
        if self.refuse_start || self.recording {
            return false;
        }
        self.recording = true;
        self.current = Some(PathBuf::from(format!("take{}.wav", self.starts)));
        true
    }

    fn stop(&mut self) -> bool {
        self.stops += 1;
        std::mem::replace(&mut self.recording, false)
    }

    fn session_failed(&mut self) -> bool {
        self.failed
    }

    fn current_recording(&self) -> Option<PathBuf> {
        self.current.clone()
    }
}

/// Auditioner that remembers what it was asked to play
#[derive(Debug, Default)]
pub struct FakeAuditioner {
    pub fail: bool,
    pub played: Vec<PathBuf>,
}

impl Auditioner for FakeAuditioner {
    fn audition(&mut self, path: Option<&Path>) -> Result<AuditionReport, AuditionError> {
        let path = path.ok_or(AuditionError::NoRecording)?;
        if self.fail {
            return Err(AuditionError::UnsupportedFormat("float samples".to_string()));
        }
        self.played.push(path.to_path_buf());
        Ok(AuditionReport {
            periods: 1,
            frames: 1,
        })
    }
}
