//! cpal-based audio backend
//!
//! Capture frames arrive on the cpal callback thread and are handed to the
//! recording engine through a bounded channel, so `read_period` never blocks.
//! When the engine falls behind, new periods are dropped like a device
//! overrun.
//! Playback goes the other way through a bounded sample queue.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, SizedSample, Stream, StreamConfig};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{pcm, AudioBackend, AudioError, AudioFormat, CaptureDevice, PlaybackDevice, NO_DEVICE};

/// Capture periods buffered between the callback and the engine
const CAPTURE_QUEUE_PERIODS: usize = 16;

/// How long a playback write waits for the device before giving up
const PLAYBACK_STALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Audio backend using the platform's default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn capture_device_names(&self) -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AudioError::Enumeration(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn open_capture(&self, device: &str) -> Result<Box<dyn CaptureDevice>, AudioError> {
        if device == NO_DEVICE {
            return Err(AudioError::DeviceNotFound(device.to_string()));
        }

        let host = cpal::default_host();
        let found = host
            .input_devices()
            .map_err(|e| AudioError::Enumeration(e.to_string()))?
            .find(|d| d.name().map(|n| n == device).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(device.to_string()))?;

        info!("Opened capture device: {}", device);
        Ok(Box::new(CpalCapture {
            device: found,
            name: device.to_string(),
            stream: None,
            frames_rx: None,
        }))
    }

    fn open_playback(
        &self,
        device: &str,
        format: &AudioFormat,
    ) -> Result<Box<dyn PlaybackDevice>, AudioError> {
        let host = cpal::default_host();
        let needle = device.to_lowercase();
        let found = host
            .output_devices()
            .map_err(|e| AudioError::Enumeration(e.to_string()))?
            .find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .or_else(|| host.default_output_device())
            .ok_or_else(|| AudioError::DeviceNotFound(device.to_string()))?;

        let playback = CpalPlayback::new(&found, format)?;
        debug!(
            "Opened playback device: {}",
            found.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(Box::new(playback))
    }
}

fn stream_config(format: &AudioFormat) -> StreamConfig {
    StreamConfig {
        channels: format.channels,
        sample_rate: SampleRate(format.rate),
        buffer_size: BufferSize::Fixed(format.period_size),
    }
}

struct CpalCapture {
    device: Device,
    name: String,
    stream: Option<Stream>,
    frames_rx: Option<Receiver<Vec<u8>>>,
}

impl CaptureDevice for CpalCapture {
    fn configure(&mut self, format: &AudioFormat) -> Result<(), AudioError> {
        // Tear down the previous stream before building one with new settings
        self.stream = None;
        self.frames_rx = None;

        let config = stream_config(format);
        let (tx, rx) = mpsc::sync_channel(CAPTURE_QUEUE_PERIODS);

        let stream = match format.sample_width {
            1 => build_capture_stream::<u8, _>(&self.device, &config, tx, |data| data.to_vec()),
            2 => build_capture_stream::<i16, _>(&self.device, &config, tx, |data| {
                data.iter().flat_map(|s| s.to_le_bytes()).collect()
            }),
            3 => build_capture_stream::<i32, _>(&self.device, &config, tx, |data| {
                let narrowed: Vec<i32> = data.iter().map(|s| s >> 8).collect();
                pcm::encode(&narrowed, 3)
            }),
            4 => build_capture_stream::<i32, _>(&self.device, &config, tx, |data| {
                data.iter().flat_map(|s| s.to_le_bytes()).collect()
            }),
            width => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "sample width {}",
                    width
                )))
            }
        }
        .map_err(|e| AudioError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        info!(
            "Capture '{}' configured: {} ch, {} Hz, {}, period {}",
            self.name, format.channels, format.rate, format.encoding, format.period_size
        );

        self.stream = Some(stream);
        self.frames_rx = Some(rx);
        Ok(())
    }

    fn read_period(&mut self) -> Result<Option<Vec<u8>>, AudioError> {
        let rx = self.frames_rx.as_ref().ok_or(AudioError::NotConfigured)?;
        match rx.try_recv() {
            Ok(frames) => Ok(Some(frames)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(AudioError::Disconnected),
        }
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| AudioError::Stream(e.to_string()))?;
        }
        if let Some(rx) = &self.frames_rx {
            let stale = rx.try_iter().count();
            debug!("Capture '{}' paused, {} unread periods dropped", self.name, stale);
        }
        Ok(())
    }
}

fn build_capture_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    tx: SyncSender<Vec<u8>>,
    to_bytes: F,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    F: Fn(&[T]) -> Vec<u8> + Send + 'static,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Full: the engine is behind, lose this period. Disconnected: the
            // engine has moved on to a new stream.
            let _ = tx.try_send(to_bytes(data));
        },
        |err| {
            error!("Capture stream error: {}", err);
        },
        None,
    )
}

/// Samples waiting for the output callback
struct PlaybackQueue {
    samples: Mutex<VecDeque<f32>>,
    space: Condvar,
}

struct CpalPlayback {
    _stream: Stream,
    queue: Arc<PlaybackQueue>,
    sample_width: u16,
    high_water: usize,
}

impl CpalPlayback {
    fn new(device: &Device, format: &AudioFormat) -> Result<Self, AudioError> {
        let queue = Arc::new(PlaybackQueue {
            samples: Mutex::new(VecDeque::new()),
            space: Condvar::new(),
        });

        let callback_queue = queue.clone();
        let stream = device
            .build_output_stream(
                &stream_config(format),
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut samples = callback_queue.samples.lock();
                    for slot in out.iter_mut() {
                        *slot = samples.pop_front().unwrap_or(0.0);
                    }
                    drop(samples);
                    callback_queue.space.notify_all();
                },
                |err| {
                    error!("Playback stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            queue,
            sample_width: format.sample_width,
            // two periods of lookahead
            high_water: 2 * format.period_size as usize * format.channels as usize,
        })
    }
}

impl PlaybackDevice for CpalPlayback {
    fn write(&mut self, frames: &[u8]) -> Result<(), AudioError> {
        let samples: Vec<f32> = pcm::decode(frames, self.sample_width)
            .into_iter()
            .map(|s| pcm::to_f32(s, self.sample_width))
            .collect();

        let mut queue = self.queue.samples.lock();
        while queue.len() > self.high_water {
            if self
                .queue
                .space
                .wait_for(&mut queue, PLAYBACK_STALL_TIMEOUT)
                .timed_out()
            {
                return Err(AudioError::Disconnected);
            }
        }
        queue.extend(samples);
        Ok(())
    }

    fn drain(&mut self) {
        let mut queue = self.queue.samples.lock();
        while !queue.is_empty() {
            if self
                .queue
                .space
                .wait_for(&mut queue, PLAYBACK_STALL_TIMEOUT)
                .timed_out()
            {
                break;
            }
        }
    }
}
