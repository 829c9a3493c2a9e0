//! evdev-based switch input for Linux
//! Requires the user to be in the 'input' group

use anyhow::{Context, Result};
use evdev::{Device, Key};
use tracing::{debug, info, warn};

use super::input::SwitchInput;
use super::switches::{Switch, SwitchLevels};
use crate::config::SwitchConfig;

pub struct EvdevSwitches {
    device: Device,
    keys: [(Switch, Key); 5],
    read_failed: bool,
}

impl EvdevSwitches {
    /// Open the configured device, or the first one reporting all five keys
    pub fn new(config: &SwitchConfig) -> Result<Self> {
        let keys = [
            (Switch::Select, Key::new(config.select)),
            (Switch::Up, Key::new(config.up)),
            (Switch::Down, Key::new(config.down)),
            (Switch::Left, Key::new(config.left)),
            (Switch::Right, Key::new(config.right)),
        ];

        let device = match &config.device {
            Some(path) => Device::open(path)
                .with_context(|| format!("Failed to open switch device {:?}", path))?,
            None => find_device(&keys)?,
        };

        info!("Switch input: {}", device.name().unwrap_or("Unknown"));

        Ok(Self {
            device,
            keys,
            read_failed: false,
        })
    }
}

fn find_device(keys: &[(Switch, Key); 5]) -> Result<Device> {
    for entry in std::fs::read_dir("/dev/input").context("Failed to list /dev/input")? {
        let path = entry?.path();

        if !path.to_string_lossy().contains("event") {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                if has_keys(&device, keys) {
                    debug!("Found switch device {:?}", path);
                    return Ok(device);
                }
            }
            Err(e) => debug!("Could not open {:?}: {}", path, e),
        }
    }

    anyhow::bail!(
        "No input device with the front panel keys. Make sure you are in the 'input' group."
    )
}

fn has_keys(device: &Device, keys: &[(Switch, Key); 5]) -> bool {
    device
        .supported_keys()
        .map(|supported| keys.iter().all(|(_, key)| supported.contains(*key)))
        .unwrap_or(false)
}

impl SwitchInput for EvdevSwitches {
    fn read(&mut self) -> SwitchLevels {
        let mut levels = SwitchLevels::default();
        match self.device.get_key_state() {
            Ok(state) => {
                if self.read_failed {
                    info!("Switch input recovered");
                    self.read_failed = false;
                }
                for (switch, key) in &self.keys {
                    levels.set(*switch, state.contains(*key));
                }
            }
            Err(e) => {
                if !self.read_failed {
                    warn!("Failed to read switch state: {}", e);
                    self.read_failed = true;
                }
            }
        }
        levels
    }
}
