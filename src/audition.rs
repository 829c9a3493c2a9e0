//! Audition - play back the start of the most recent recording

use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::audio::{pcm, AudioBackend, AudioError, AudioFormat, ByteOrder, PcmEncoding};

/// Periods per second of audio written to the playback device
const PERIODS_PER_SECOND: u32 = 8;

#[derive(Error, Debug)]
pub enum AuditionError {
    #[error("No recording to audition")]
    NoRecording,

    #[error("Failed to read recording: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported recording format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Device(#[from] AudioError),
}

/// What an audition actually played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditionReport {
    pub periods: u64,
    pub frames: u64,
}

/// Something that can audition a recording
pub trait Auditioner {
    fn audition(&mut self, path: Option<&Path>) -> Result<AuditionReport, AuditionError>;
}

pub struct AuditionPlayer {
    backend: Arc<dyn AudioBackend>,
    device: String,
    max_duration: Duration,
}

impl AuditionPlayer {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        device: impl Into<String>,
        max_duration: Duration,
    ) -> Self {
        Self {
            backend,
            device: device.into(),
            max_duration,
        }
    }

    /// Play `path` until it ends or `max_duration` of wall-clock time has passed.
    ///
    /// The check happens between periods, so playback can run over by at
    /// most one period.
    pub fn play_excerpt(
        &self,
        path: Option<&Path>,
        max_duration: Duration,
    ) -> Result<AuditionReport, AuditionError> {
        let path = path.ok_or(AuditionError::NoRecording)?;

        let mut reader = WavReader::open(path)?;
        let format = playback_format(reader.spec())?;
        let mut device = self.backend.open_playback(&self.device, &format)?;

        info!("Auditioning {:?} for up to {:?}", path, max_duration);

        let period_samples = format.period_size as usize * format.channels as usize;
        let mut samples = reader.samples::<i32>();
        let mut report = AuditionReport { periods: 0, frames: 0 };
        let started = Instant::now();

        while started.elapsed() < max_duration {
            let chunk = samples
                .by_ref()
                .take(period_samples)
                .collect::<Result<Vec<i32>, _>>()?;
            if chunk.is_empty() {
                break;
            }

            device.write(&pcm::encode(&chunk, format.sample_width))?;
            report.periods += 1;
            report.frames += (chunk.len() / format.channels as usize) as u64;
        }

        device.drain();
        debug!(
            "Audition finished after {:?}: {} periods, {} frames",
            started.elapsed(),
            report.periods,
            report.frames
        );
        Ok(report)
    }
}

impl Auditioner for AuditionPlayer {
    fn audition(&mut self, path: Option<&Path>) -> Result<AuditionReport, AuditionError> {
        self.play_excerpt(path, self.max_duration)
    }
}

/// Playback format matching a WAV header
fn playback_format(spec: hound::WavSpec) -> Result<AudioFormat, AuditionError> {
    if spec.sample_format != SampleFormat::Int {
        return Err(AuditionError::UnsupportedFormat("float samples".to_string()));
    }
    if spec.bits_per_sample % 8 != 0 || !(1..=4).contains(&(spec.bits_per_sample / 8)) {
        return Err(AuditionError::UnsupportedFormat(format!(
            "{} bits per sample",
            spec.bits_per_sample
        )));
    }
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(AuditionError::UnsupportedFormat(format!(
            "{} channel(s) at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    let bits = spec.bits_per_sample;
    Ok(AudioFormat {
        channels: spec.channels,
        rate: spec.sample_rate,
        encoding: PcmEncoding::from_settings(bits, bits != 8, ByteOrder::Little),
        sample_width: bits / 8,
        period_size: (spec.sample_rate / PERIODS_PER_SECOND).max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, rate: u32, frames: u32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn player(backend: &FakeBackend) -> AuditionPlayer {
        AuditionPlayer::new(Arc::new(backend.clone()), "default", Duration::from_secs(3))
    }

    #[test]
    fn test_no_recording_opens_nothing() {
        let backend = FakeBackend::new();
        let result = player(&backend).play_excerpt(None, Duration::from_secs(1));
        assert!(matches!(result, Err(AuditionError::NoRecording)));
        assert!(backend.state().playback_formats.is_empty());
    }

    #[test]
    fn test_float_recording_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        let backend = FakeBackend::new();
        let result = player(&backend).play_excerpt(Some(&path), Duration::from_secs(1));
        assert!(matches!(result, Err(AuditionError::UnsupportedFormat(_))));
        assert!(backend.state().playback_formats.is_empty());
    }

    #[test]
    fn test_short_recording_plays_to_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 800, 250);

        let backend = FakeBackend::new();
        let report = player(&backend)
            .play_excerpt(Some(&path), Duration::from_secs(3))
            .unwrap();

        // 100-frame periods: two full and one partial
        assert_eq!(report.periods, 3);
        assert_eq!(report.frames, 250);

        let state = backend.state();
        assert_eq!(state.playback_formats[0].period_size, 100);
        assert_eq!(state.played.len(), 500);
        assert_eq!(&state.played[..4], &[0, 0, 1, 0]);
    }

    #[test]
    fn test_long_recording_is_cut_within_one_period() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        // 2 s of audio at 800 Hz
        write_wav(&path, 800, 1600);

        let backend = FakeBackend::new().paced();
        let limit = Duration::from_millis(300);
        let report = player(&backend).play_excerpt(Some(&path), limit).unwrap();

        let played = Duration::from_secs_f64(report.frames as f64 / 800.0);
        let period = Duration::from_millis(125);
        assert!(played >= limit, "played {:?}", played);
        assert!(played < limit + period, "played {:?}", played);
    }

    #[test]
    fn test_audition_uses_configured_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        write_wav(&path, 800, 100);

        let backend = FakeBackend::new();
        let mut player = player(&backend);
        let report = player.audition(Some(&path)).unwrap();
        assert_eq!(report.frames, 100);
    }
}
