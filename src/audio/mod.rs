//! Audio device seam
//!
//! The recording engine and the audition player only talk to audio hardware
//! through [`AudioBackend`]. The production backend is cpal; tests use a
//! scripted backend.

mod catalog;
mod cpal_backend;
pub mod pcm;

pub use catalog::{DeviceCatalog, NO_DEVICE};
pub use cpal_backend::CpalBackend;

use std::fmt;
use thiserror::Error;

/// Audio device errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio device matching '{0}'")]
    DeviceNotFound(String),

    #[error("Failed to enumerate audio devices: {0}")]
    Enumeration(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to build audio stream: {0}")]
    Stream(String),

    #[error("Capture device is not configured")]
    NotConfigured,

    #[error("Audio stream disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Sample encoding requested from the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmEncoding {
    pub bits: u16,
    pub signed: bool,
    pub byte_order: ByteOrder,
}

impl PcmEncoding {
    /// Build an encoding from config values. Bit depths other than 8, 24 and
    /// 32 fall back to 16.
    pub fn from_settings(bits: u16, signed: bool, byte_order: ByteOrder) -> Self {
        let bits = match bits {
            8 | 24 | 32 => bits,
            _ => 16,
        };
        Self {
            bits,
            signed,
            byte_order,
        }
    }

    /// WAV stores 8-bit samples unsigned and wider samples signed little-endian
    pub fn is_wav_native(&self) -> bool {
        if self.bits == 8 {
            !self.signed
        } else {
            self.signed && self.byte_order == ByteOrder::Little
        }
    }
}

impl fmt::Display for PcmEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.signed { 'S' } else { 'U' };
        if self.bits == 8 {
            return write!(f, "{}8", sign);
        }
        let order = match self.byte_order {
            ByteOrder::Little => "LE",
            ByteOrder::Big => "BE",
        };
        write!(f, "{}{}_{}", sign, self.bits, order)
    }
}

/// Everything needed to open a capture or playback stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub rate: u32,
    pub encoding: PcmEncoding,
    /// Bytes per sample in the file
    pub sample_width: u16,
    /// Frames per device read/write
    pub period_size: u32,
}

impl AudioFormat {
    /// Bytes in one interleaved frame
    #[cfg(test)]
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.sample_width as usize
    }

    /// Check that frames in this format can go straight into a WAV file
    pub fn validate_for_recording(&self) -> Result<(), AudioError> {
        if self.channels == 0 || self.rate == 0 || self.period_size == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} channel(s) at {} Hz, period {}",
                self.channels, self.rate, self.period_size
            )));
        }
        if !(1..=4).contains(&self.sample_width) {
            return Err(AudioError::UnsupportedFormat(format!(
                "sample width {}",
                self.sample_width
            )));
        }
        if self.encoding.bits != self.sample_width * 8 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} does not fit a {}-byte sample",
                self.encoding, self.sample_width
            )));
        }
        if !self.encoding.is_wav_native() {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} cannot be stored in a WAV file",
                self.encoding
            )));
        }
        Ok(())
    }
}

/// A capture stream, owned by the recording engine
pub trait CaptureDevice {
    /// (Re)configure channels, rate, format and period size
    fn configure(&mut self, format: &AudioFormat) -> Result<(), AudioError>;

    /// Non-blocking read of up to one period of raw little-endian frames.
    /// `Ok(None)` means nothing was available.
    fn read_period(&mut self) -> Result<Option<Vec<u8>>, AudioError>;

    /// Stop capturing until the next `configure`. Periods not yet read are
    /// discarded.
    fn pause(&mut self) -> Result<(), AudioError>;
}

/// A playback stream, used by the audition player
pub trait PlaybackDevice {
    /// Queue raw little-endian frames, blocking while the device is behind
    fn write(&mut self, frames: &[u8]) -> Result<(), AudioError>;

    /// Wait until queued frames have been played
    fn drain(&mut self) {}
}

/// Factory for audio devices
pub trait AudioBackend: Send + Sync {
    /// Names of the available capture devices
    fn capture_device_names(&self) -> Result<Vec<String>, AudioError>;

    fn open_capture(&self, device: &str) -> Result<Box<dyn CaptureDevice>, AudioError>;

    fn open_playback(
        &self,
        device: &str,
        format: &AudioFormat,
    ) -> Result<Box<dyn PlaybackDevice>, AudioError>;
}
