//! Idle sleep and wake

use tracing::debug;

use super::modes::DeviceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    Wake,
    Sleep,
}

/// Puts the panel to sleep after a stretch of idle ticks without a press
#[derive(Debug)]
pub struct PowerManager {
    idle_ticks: u32,
    threshold: u32,
    sleeping: bool,
}

impl PowerManager {
    pub fn new(threshold: u32) -> Self {
        Self {
            idle_ticks: 0,
            threshold: threshold.max(1),
            sleeping: false,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Advance one tick
    pub fn update(&mut self, state: DeviceState, any_pressed: bool) -> Option<PowerTransition> {
        match state {
            DeviceState::Idle if any_pressed => {
                self.idle_ticks = 0;
                self.wake()
            }
            DeviceState::Idle => {
                if self.sleeping {
                    return None;
                }
                self.idle_ticks += 1;
                if self.idle_ticks >= self.threshold {
                    self.idle_ticks = 0;
                    self.sleeping = true;
                    debug!("recorder put to sleep");
                    return Some(PowerTransition::Sleep);
                }
                None
            }
            // never sleep while recording or showing an error
            DeviceState::Busy | DeviceState::Error => {
                self.idle_ticks = 0;
                self.wake()
            }
        }
    }

    fn wake(&mut self) -> Option<PowerTransition> {
        if !self.sleeping {
            return None;
        }
        self.sleeping = false;
        debug!("recorder awakened");
        Some(PowerTransition::Wake)
    }
}
