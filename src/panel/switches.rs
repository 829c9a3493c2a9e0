//! Debounced front panel switches

use super::input::SwitchInput;

/// A front panel switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    Select,
    Up,
    Down,
    Left,
    Right,
}

impl Switch {
    pub const ALL: [Switch; 5] = [
        Switch::Select,
        Switch::Up,
        Switch::Down,
        Switch::Left,
        Switch::Right,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Raw switch levels read in one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchLevels([bool; 5]);

impl SwitchLevels {
    #[cfg(test)]
    pub fn from_held(held: &[Switch]) -> Self {
        let mut levels = Self::default();
        for switch in held {
            levels.set(*switch, true);
        }
        levels
    }

    pub fn set(&mut self, switch: Switch, down: bool) {
        self.0[switch.index()] = down;
    }

    pub fn is_down(&self, switch: Switch) -> bool {
        self.0[switch.index()]
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SwitchState {
    is_down: bool,
    was_down_last_tick: bool,
    consecutive_down_ticks: u32,
}

/// Switch state sampled once per tick; the tick period is the debounce window
#[derive(Debug, Default)]
pub struct SwitchBank {
    states: [SwitchState; 5],
}

impl SwitchBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every switch once and update edge and hold tracking
    pub fn sample_tick(&mut self, input: &mut dyn SwitchInput) {
        self.apply(input.read());
    }

    fn apply(&mut self, levels: SwitchLevels) {
        for switch in Switch::ALL {
            let state = &mut self.states[switch.index()];
            state.was_down_last_tick = state.is_down;
            state.is_down = levels.is_down(switch);
            if state.is_down {
                state.consecutive_down_ticks = state.consecutive_down_ticks.saturating_add(1);
            } else {
                state.consecutive_down_ticks = 0;
            }
        }
    }

    /// Rising edge in the last sample
    pub fn was_just_pressed(&self, switch: Switch) -> bool {
        let state = &self.states[switch.index()];
        state.is_down && !state.was_down_last_tick
    }

    pub fn any_just_pressed(&self) -> bool {
        Switch::ALL.iter().any(|s| self.was_just_pressed(*s))
    }

    pub fn is_down(&self, switch: Switch) -> bool {
        self.states[switch.index()].is_down
    }

    /// Number of consecutive samples the switch has been down, 0 when up
    #[cfg(test)]
    pub fn held_ticks(&self, switch: Switch) -> u32 {
        self.states[switch.index()].consecutive_down_ticks
    }
}
