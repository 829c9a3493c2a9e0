//! Configuration management for picorder

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{AudioFormat, ByteOrder, PcmEncoding};

/// Config file looked up in the working directory before the per-user one
const LOCAL_CONFIG_FILE: &str = "piRecord.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Recording device configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Loop timing
    #[serde(default)]
    pub tuning: TuningConfig,

    /// User preferences
    #[serde(default)]
    pub preferences: PreferencesConfig,

    /// Where recordings go
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Front panel switch mapping
    #[serde(default)]
    pub switches: SwitchConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Substring matched (case-insensitive) against capture device names
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Sample rate in Hz
    #[serde(default = "default_rate")]
    pub rate: u32,

    /// Bits per sample (8, 16, 24 or 32)
    #[serde(default = "default_bits")]
    pub bits: u16,

    #[serde(default = "default_true")]
    pub signed: bool,

    /// "LE" or "BE"
    #[serde(default = "default_byte_order")]
    pub byte_order: String,

    /// Frames exchanged with the device per read
    #[serde(default = "default_period_size")]
    pub period_size: u32,

    /// Bytes per sample written to the WAV file
    #[serde(default = "default_sample_width")]
    pub sample_width: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Front panel tick period, also the switch debounce window (ms)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Recording engine loop period (ms)
    #[serde(default = "default_engine_loop_ms")]
    pub engine_loop_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    /// Inactivity before the panel goes to sleep
    #[serde(default = "default_idle_seconds")]
    pub idle_seconds: f64,

    /// Maximum length of an audition excerpt
    #[serde(default = "default_audition_seconds")]
    pub audition_seconds: f64,

    /// How long Select must be held to enter mode selection
    #[serde(default = "default_mode_hold_seconds")]
    pub mode_hold_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory new recordings are written to
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// File holding the path of the most recent recording
    #[serde(default = "default_pointer_file")]
    pub pointer_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// evdev device node; auto-detected when unset
    pub device: Option<PathBuf>,

    /// Linux input key codes for each switch
    #[serde(default = "default_key_select")]
    pub select: u16,
    #[serde(default = "default_key_up")]
    pub up: u16,
    #[serde(default = "default_key_down")]
    pub down: u16,
    #[serde(default = "default_key_left")]
    pub left: u16,
    #[serde(default = "default_key_right")]
    pub right: u16,
}

// Default value functions
fn default_device_name() -> String {
    "default".to_string()
}

fn default_channels() -> u16 {
    1
}

fn default_rate() -> u32 {
    44100
}

fn default_bits() -> u16 {
    16
}

fn default_true() -> bool {
    true
}

fn default_byte_order() -> String {
    "LE".to_string()
}

fn default_period_size() -> u32 {
    160
}

fn default_sample_width() -> u16 {
    2
}

fn default_tick_ms() -> u64 {
    20
}

fn default_engine_loop_ms() -> u64 {
    1
}

fn default_idle_seconds() -> f64 {
    300.0
}

fn default_audition_seconds() -> f64 {
    3.0
}

fn default_mode_hold_seconds() -> f64 {
    1.0
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("../Recordings")
}

fn default_pointer_file() -> PathBuf {
    PathBuf::from(".currfn")
}

// KEY_ENTER, KEY_UP, KEY_DOWN, KEY_LEFT, KEY_RIGHT
fn default_key_select() -> u16 {
    28
}

fn default_key_up() -> u16 {
    103
}

fn default_key_down() -> u16 {
    108
}

fn default_key_left() -> u16 {
    105
}

fn default_key_right() -> u16 {
    106
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            channels: default_channels(),
            rate: default_rate(),
            bits: default_bits(),
            signed: true,
            byte_order: default_byte_order(),
            period_size: default_period_size(),
            sample_width: default_sample_width(),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            engine_loop_ms: default_engine_loop_ms(),
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            idle_seconds: default_idle_seconds(),
            audition_seconds: default_audition_seconds(),
            mode_hold_seconds: default_mode_hold_seconds(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            pointer_file: default_pointer_file(),
        }
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            device: None,
            select: default_key_select(),
            up: default_key_up(),
            down: default_key_down(),
            left: default_key_left(),
            right: default_key_right(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            tuning: TuningConfig::default(),
            preferences: PreferencesConfig::default(),
            recording: RecordingConfig::default(),
            switches: SwitchConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `piRecord.toml` in the working
    /// directory wins, then the per-user config file, which is created with
    /// defaults on first run.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::load_from(&local);
        }

        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "picorder", "picorder")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Recording format derived from the device section
    pub fn audio_format(&self) -> AudioFormat {
        let byte_order = if self.device.byte_order.eq_ignore_ascii_case("BE") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        };

        AudioFormat {
            channels: self.device.channels,
            rate: self.device.rate,
            encoding: PcmEncoding::from_settings(self.device.bits, self.device.signed, byte_order),
            sample_width: self.device.sample_width,
            period_size: self.device.period_size,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tuning.tick_ms.max(1))
    }

    pub fn engine_loop_period(&self) -> Duration {
        Duration::from_millis(self.tuning.engine_loop_ms)
    }

    pub fn audition_duration(&self) -> Duration {
        // inf (valid TOML) is out of range for a Duration
        Duration::try_from_secs_f64(self.preferences.audition_seconds.max(0.0))
            .unwrap_or(Duration::MAX)
    }

    /// Number of ticks Select must be held before mode selection opens
    pub fn mode_hold_ticks(&self) -> u32 {
        ticks_for(self.preferences.mode_hold_seconds, self.tick_period())
    }

    /// Number of idle ticks before the panel sleeps
    pub fn idle_ticks(&self) -> u32 {
        ticks_for(self.preferences.idle_seconds, self.tick_period())
    }

    /// Human readable dump of the active configuration
    pub fn summary(&self) -> String {
        let format = self.audio_format();
        let mut out = String::new();
        out.push_str("Current Recording Config:\n");
        out.push_str(&format!("  device = {}\n", self.device.name));
        out.push_str(&format!("  channels = {}\n", format.channels));
        out.push_str(&format!("  rate = {}\n", format.rate));
        out.push_str(&format!("  format = {}\n", format.encoding));
        out.push_str(&format!("  period_size = {}\n", format.period_size));
        out.push_str(&format!("  sample_width = {}\n", format.sample_width));
        out.push_str("Performance Tuning:\n");
        out.push_str(&format!("  tick_ms = {}\n", self.tuning.tick_ms));
        out.push_str(&format!("  engine_loop_ms = {}\n", self.tuning.engine_loop_ms));
        out.push_str("User Preferences:\n");
        out.push_str(&format!("  idle_seconds = {}\n", self.preferences.idle_seconds));
        out.push_str(&format!("  audition_seconds = {}\n", self.preferences.audition_seconds));
        out.push_str(&format!("  mode_hold_seconds = {}\n", self.preferences.mode_hold_seconds));
        if let Ok(path) = self.config_path() {
            out.push_str(&format!(
                "\nto change a setting, edit {} and restart picorder\n",
                path.display()
            ));
        }
        out
    }
}

/// Whole ticks covering `seconds`, rounded up, at least one
fn ticks_for(seconds: f64, tick: Duration) -> u32 {
    let micros = (seconds.max(0.0) * 1_000_000.0).round() as u64;
    let tick_micros = (tick.as_micros() as u64).max(1);
    let ticks = micros.div_ceil(tick_micros);
    u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
}
