//! Front panel: switches, display and the menu state machine
//!
//! One [`Panel::tick`] samples the switches, runs the current mode handler
//! if the panel was awake when sampled, then lets the power manager decide
//! on sleep or wake. The press that wakes the panel is not seen by the
//! mode handlers.

pub mod display;
#[cfg(target_os = "linux")]
mod evdev_input;
mod input;
pub mod modes;
mod power;
mod switches;

pub use display::{Display, TerminalDisplay};
pub use input::{create_switch_input, SwitchInput};
#[cfg(test)]
pub use switches::{Switch, SwitchLevels};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use crate::audition::Auditioner;
use crate::engine::Recorder;
use display::Backlight;
use modes::{ModeContext, ModeMachine, OperationMode};
use power::{PowerManager, PowerTransition};
use switches::SwitchBank;

/// Timing of the panel loop, in ticks where it counts ticks
#[derive(Debug, Clone, Copy)]
pub struct PanelSettings {
    pub tick: Duration,
    pub mode_hold_ticks: u32,
    pub idle_ticks: u32,
}

pub struct Panel<I, D, R, A> {
    input: I,
    display: D,
    recorder: R,
    auditioner: A,
    switches: SwitchBank,
    modes: ModeMachine,
    power: PowerManager,
    tick: Duration,
}

impl<I, D, R, A> Panel<I, D, R, A>
where
    I: SwitchInput,
    D: Display,
    R: Recorder,
    A: Auditioner,
{
    pub fn new(input: I, display: D, recorder: R, auditioner: A, settings: PanelSettings) -> Self {
        Self {
            input,
            display,
            recorder,
            auditioner,
            switches: SwitchBank::new(),
            modes: ModeMachine::new(settings.mode_hold_ticks),
            power: PowerManager::new(settings.idle_ticks),
            tick: settings.tick,
        }
    }

    /// Show the banner for `banner`, then enter Record mode
    pub fn startup(&mut self, banner: Duration) {
        self.display.set_backlight(Backlight::On);
        self.display.clear();
        self.display
            .write_text(&format!("picorder {}\n", env!("CARGO_PKG_VERSION")));
        self.display.write_text("front panel");
        self.display.refresh();
        std::thread::sleep(banner);

        self.display.clear();
        self.modes.set_mode(OperationMode::Record, &mut self.display);
        self.display.refresh();
    }

    /// One pass of the front panel loop
    pub fn tick(&mut self) {
        self.switches.sample_tick(&mut self.input);

        if !self.power.is_sleeping() {
            let mut ctx = ModeContext {
                switches: &self.switches,
                display: &mut self.display,
                recorder: &mut self.recorder,
                auditioner: &mut self.auditioner,
            };
            self.modes.tick(&mut ctx);
        }

        let pressed = self.switches.any_just_pressed();
        match self.power.update(self.modes.device_state(), pressed) {
            Some(PowerTransition::Sleep) => {
                info!("Recorder put to sleep");
                self.display.set_backlight(Backlight::Off);
            }
            Some(PowerTransition::Wake) => {
                info!("Recorder awakened");
                self.display.set_backlight(Backlight::On);
            }
            None => {}
        }

        self.display.refresh();
    }

    /// Tick until `running` is cleared
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Front panel running, tick {:?}", self.tick);
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(self.tick);
            self.tick();
        }
    }

    /// Stop any recording, release the engine and say goodbye
    pub fn graceful_exit(&mut self, farewell: Duration) {
        info!("picorder shutting down");
        self.recorder.stop();
        self.recorder.shutdown();

        self.display.clear();
        self.display.write_text("goodbye!");
        self.display.refresh();
        std::thread::sleep(farewell);

        self.display.clear();
        self.display.set_backlight(Backlight::Off);
        self.display.refresh();
    }

    #[cfg(test)]
    fn mode(&self) -> OperationMode {
        self.modes.mode()
    }

    #[cfg(test)]
    fn is_sleeping(&self) -> bool {
        self.power.is_sleeping()
    }

    #[cfg(test)]
    fn display(&self) -> &D {
        &self.display
    }

    #[cfg(test)]
    fn recorder(&self) -> &R {
        &self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::display::{full_row, LcdFrame};
    use crate::testing::{FakeAuditioner, FakeRecorder, ScriptedInput};

    type TestPanel = Panel<ScriptedInput, LcdFrame, FakeRecorder, FakeAuditioner>;

    fn panel(idle_ticks: u32) -> (ScriptedInput, TestPanel) {
        let input = ScriptedInput::new();
        let mut panel = Panel::new(
            input.clone(),
            LcdFrame::new(),
            FakeRecorder::default(),
            FakeAuditioner::default(),
            PanelSettings {
                tick: Duration::ZERO,
                mode_hold_ticks: 3,
                idle_ticks,
            },
        );
        panel.startup(Duration::ZERO);
        (input, panel)
    }

    fn run_ticks(panel: &mut TestPanel, input: &ScriptedInput, held: &[&[Switch]]) {
        for switches in held {
            input.push(switches);
            panel.tick();
        }
    }

    #[test]
    fn test_startup_lands_in_record_standby() {
        let (input, mut panel) = panel(100);
        assert_eq!(panel.mode(), OperationMode::Record);
        assert_eq!(panel.display().backlight(), Backlight::On);

        run_ticks(&mut panel, &input, &[&[]]);
        assert_eq!(panel.display().row(0), full_row("Standby...   REC"));
        assert_eq!(panel.display().row(1), full_row("Rt Btn to start"));
    }

    #[test]
    fn test_wake_press_is_swallowed() {
        let (input, mut panel) = panel(2);
        run_ticks(&mut panel, &input, &[&[], &[]]);
        assert!(panel.is_sleeping());
        assert_eq!(panel.display().backlight(), Backlight::Off);

        run_ticks(&mut panel, &input, &[&[Switch::Right]]);
        assert!(!panel.is_sleeping());
        assert_eq!(panel.display().backlight(), Backlight::On);
        assert_eq!(panel.recorder().starts, 0);

        run_ticks(&mut panel, &input, &[&[], &[Switch::Right]]);
        assert_eq!(panel.recorder().starts, 1);
    }

    #[test]
    fn test_no_sleep_while_recording() {
        let (input, mut panel) = panel(2);
        run_ticks(&mut panel, &input, &[&[], &[Switch::Right]]);
        assert_eq!(panel.recorder().starts, 1);

        input.idle(10);
        for _ in 0..10 {
            panel.tick();
        }
        assert!(!panel.is_sleeping());
        assert!(panel.recorder().recording);
    }

    #[test]
    fn test_graceful_exit_stops_and_blanks() {
        let (input, mut panel) = panel(100);
        run_ticks(&mut panel, &input, &[&[], &[Switch::Right]]);
        assert!(panel.recorder().recording);

        panel.graceful_exit(Duration::ZERO);
        assert!(!panel.recorder().recording);
        assert_eq!(panel.display().row(0), full_row(""));
        assert_eq!(panel.display().backlight(), Backlight::Off);
    }
}
