//! Switch input backends

use tracing::{info, warn};

use super::switches::SwitchLevels;
use crate::config::SwitchConfig;

/// Source of raw switch levels, polled once per panel tick
pub trait SwitchInput {
    fn read(&mut self) -> SwitchLevels;
}

/// Input with every switch permanently up
#[derive(Debug, Default)]
pub struct NullSwitches;

impl SwitchInput for NullSwitches {
    fn read(&mut self) -> SwitchLevels {
        SwitchLevels::default()
    }
}

/// Create the switch input for the current platform
pub fn create_switch_input(config: &SwitchConfig) -> Box<dyn SwitchInput> {
    #[cfg(target_os = "linux")]
    {
        match super::evdev_input::EvdevSwitches::new(config) {
            Ok(switches) => {
                info!("Using evdev switch input");
                return Box::new(switches);
            }
            Err(e) => warn!("evdev switch input unavailable: {:#}", e),
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        warn!("No switch input on this platform");
    }

    info!("Front panel switches disabled");
    Box::new(NullSwitches)
}

impl<T: SwitchInput + ?Sized> SwitchInput for Box<T> {
    fn read(&mut self) -> SwitchLevels {
        (**self).read()
    }
}
