//! Operation mode and submode state machine
//!
//! Each tick either advances the mode-select gesture or calls the handler
//! for the current mode, which returns the next submode. Holding Select for
//! the configured time at the top level of a mode opens mode selection; Up
//! and Down cycle the candidate and Select commits it.

use tracing::{debug, error, info, warn};

use super::display::{
    full_row, mode_label, mode_short_label, submode_label, Display, MODE_LABEL_COLUMN,
};
use super::switches::{Switch, SwitchBank};
use crate::audition::{AuditionError, Auditioner};
use crate::engine::Recorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Startup,
    Record,
    Playback,
    Config,
    Utility,
}

impl OperationMode {
    /// Next mode in the Record..Utility ring
    pub fn next(self) -> Self {
        match self {
            OperationMode::Startup => OperationMode::Record,
            OperationMode::Record => OperationMode::Playback,
            OperationMode::Playback => OperationMode::Config,
            OperationMode::Config => OperationMode::Utility,
            OperationMode::Utility => OperationMode::Record,
        }
    }

    /// Previous mode in the Record..Utility ring
    pub fn prev(self) -> Self {
        match self {
            OperationMode::Startup => OperationMode::Utility,
            OperationMode::Record => OperationMode::Utility,
            OperationMode::Playback => OperationMode::Record,
            OperationMode::Config => OperationMode::Playback,
            OperationMode::Utility => OperationMode::Config,
        }
    }
}

/// Position within a mode. Record reads these as Stopped, Standby,
/// InProgress and Error; Config as Start, SelectItem, Change and Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submode {
    Start,
    TopLevel,
    InProgress,
    Error,
}

impl Submode {
    fn is_top_level(self) -> bool {
        matches!(self, Submode::Start | Submode::TopLevel)
    }
}

/// What the recorder is doing, as far as the panel knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Busy,
    Error,
}

/// Settings listed in Config mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigItem {
    Device,
    Channels,
    Rate,
    Format,
    Period,
    Width,
}

impl ConfigItem {
    pub const ALL: [ConfigItem; 6] = [
        ConfigItem::Device,
        ConfigItem::Channels,
        ConfigItem::Rate,
        ConfigItem::Format,
        ConfigItem::Period,
        ConfigItem::Width,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ConfigItem::Device => "Dev",
            ConfigItem::Channels => "Chn",
            ConfigItem::Rate => "Rat",
            ConfigItem::Format => "Fmt",
            ConfigItem::Period => "Per",
            ConfigItem::Width => "Wid",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ModeGesture {
    pending: bool,
    in_progress: bool,
    hold_ticks: u32,
    candidate: OperationMode,
}

impl Default for ModeGesture {
    fn default() -> Self {
        Self {
            pending: false,
            in_progress: false,
            hold_ticks: 0,
            candidate: OperationMode::Startup,
        }
    }
}

/// Collaborators a mode handler may touch during one tick
pub struct ModeContext<'a> {
    pub switches: &'a SwitchBank,
    pub display: &'a mut dyn Display,
    pub recorder: &'a mut dyn Recorder,
    pub auditioner: &'a mut dyn Auditioner,
}

pub struct ModeMachine {
    mode: OperationMode,
    submode: Submode,
    gesture: ModeGesture,
    config_cursor: usize,
    device_state: DeviceState,
    hold_threshold: u32,
}

impl ModeMachine {
    /// `hold_threshold` is the number of ticks Select must stay down
    pub fn new(hold_threshold: u32) -> Self {
        Self {
            mode: OperationMode::Startup,
            submode: Submode::Start,
            gesture: ModeGesture::default(),
            config_cursor: 0,
            device_state: DeviceState::Idle,
            hold_threshold: hold_threshold.max(1),
        }
    }

    #[cfg(test)]
    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    #[cfg(test)]
    pub fn submode(&self) -> Submode {
        self.submode
    }

    pub fn device_state(&self) -> DeviceState {
        self.device_state
    }

    /// Mode being offered while mode selection is open
    #[cfg(test)]
    pub fn candidate(&self) -> Option<OperationMode> {
        self.gesture.in_progress.then_some(self.gesture.candidate)
    }

    pub fn config_item(&self) -> ConfigItem {
        ConfigItem::ALL[self.config_cursor]
    }

    /// Enter `mode` at its Start submode and redraw the top row
    pub fn set_mode(&mut self, mode: OperationMode, display: &mut dyn Display) {
        self.mode = mode;
        self.submode = Submode::Start;
        draw_mode(display, mode, Submode::Start);
        debug!("Mode set to {:?}", mode);
    }

    /// One front panel tick while awake
    pub fn tick(&mut self, ctx: &mut ModeContext<'_>) {
        self.track_gesture(ctx);

        if self.gesture.in_progress {
            self.select_mode(ctx);
        } else {
            self.submode = match self.mode {
                OperationMode::Record => self.record_mode(ctx),
                OperationMode::Playback => self.submode,
                OperationMode::Config => self.config_mode(ctx),
                OperationMode::Utility => self.submode,
                OperationMode::Startup => {
                    error!("Invalid Mode {:?}", self.mode);
                    ctx.display.clear();
                    ctx.display.write_text("Invalid Mode!");
                    self.submode
                }
            };
        }
    }

    fn track_gesture(&mut self, ctx: &mut ModeContext<'_>) {
        let switches = ctx.switches;

        if !switches.is_down(Switch::Select) {
            if self.gesture.pending {
                self.gesture.pending = false;
                self.gesture.hold_ticks = 0;
            }
            return;
        }

        if !self.submode.is_top_level() {
            return;
        }

        if switches.was_just_pressed(Switch::Select) {
            self.gesture.pending = true;
            self.gesture.hold_ticks = 0;
        } else if self.gesture.pending && !self.gesture.in_progress {
            self.gesture.hold_ticks += 1;
            if self.gesture.hold_ticks >= self.hold_threshold {
                self.gesture.hold_ticks = 0;
                self.gesture.pending = false;
                self.gesture.in_progress = true;
                self.gesture.candidate = self.mode;
                ctx.display.set_cursor(0, 0);
                ctx.display.write_text("Sel Mode:    ");
                draw_candidate(ctx.display, self.mode);
                info!("Mode selection opened");
            }
        }
    }

    fn select_mode(&mut self, ctx: &mut ModeContext<'_>) {
        let switches = ctx.switches;

        if switches.was_just_pressed(Switch::Up) {
            self.gesture.candidate = self.gesture.candidate.next();
            draw_candidate(ctx.display, self.gesture.candidate);
        }
        if switches.was_just_pressed(Switch::Down) {
            self.gesture.candidate = self.gesture.candidate.prev();
            draw_candidate(ctx.display, self.gesture.candidate);
        }
        if switches.was_just_pressed(Switch::Select) {
            let mode = self.gesture.candidate;
            ctx.display.clear();
            self.set_mode(mode, ctx.display);
            self.gesture = ModeGesture::default();
            info!("Mode selected: {:?}", mode);
        }
    }

    fn record_mode(&mut self, ctx: &mut ModeContext<'_>) -> Submode {
        let switches = ctx.switches;

        match self.submode {
            Submode::Start => {
                draw_submode(ctx.display, OperationMode::Record, Submode::TopLevel);
                draw_status(ctx.display, "Rt Btn to start ");
                Submode::TopLevel
            }
            Submode::TopLevel => {
                if switches.was_just_pressed(Switch::Right) {
                    info!("recording started");
                    if ctx.recorder.start() {
                        self.device_state = DeviceState::Busy;
                        draw_submode(ctx.display, OperationMode::Record, Submode::InProgress);
                        draw_status(ctx.display, "Any Btn to stop ");
                        Submode::InProgress
                    } else {
                        ctx.recorder.stop();
                        self.record_error(ctx.display)
                    }
                } else if switches.was_just_pressed(Switch::Left) {
                    self.audition(ctx);
                    Submode::TopLevel
                } else {
                    Submode::TopLevel
                }
            }
            Submode::InProgress => {
                if switches.any_just_pressed() {
                    info!("recording stopped");
                    ctx.recorder.stop();
                    self.device_state = DeviceState::Idle;
                    draw_submode(ctx.display, OperationMode::Record, Submode::Start);
                    draw_status(ctx.display, "Stopped.        ");
                    Submode::Start
                } else if ctx.recorder.session_failed() {
                    warn!("recording failed in progress");
                    ctx.recorder.stop();
                    self.record_error(ctx.display)
                } else {
                    Submode::InProgress
                }
            }
            Submode::Error => {
                if switches.any_just_pressed() {
                    info!("rec err cleared");
                    self.device_state = DeviceState::Idle;
                    draw_submode(ctx.display, OperationMode::Record, Submode::Start);
                    draw_status(ctx.display, "Cleared.        ");
                    Submode::Start
                } else {
                    Submode::Error
                }
            }
        }
    }

    fn record_error(&mut self, display: &mut dyn Display) -> Submode {
        self.device_state = DeviceState::Error;
        draw_submode(display, OperationMode::Record, Submode::Error);
        draw_status(display, "Any Btn to clear");
        Submode::Error
    }

    fn audition(&mut self, ctx: &mut ModeContext<'_>) {
        draw_status(ctx.display, "Auditioning...  ");
        ctx.display.refresh();

        let recording = ctx.recorder.current_recording();
        match ctx.auditioner.audition(recording.as_deref()) {
            Ok(report) => {
                debug!("Audition played {} frames", report.frames);
                draw_status(ctx.display, "Rt Btn to start ");
            }
            Err(AuditionError::NoRecording) => {
                info!("Nothing to audition");
                draw_status(ctx.display, "No recording");
            }
            Err(e) => {
                warn!("Audition failed: {}", e);
                draw_status(ctx.display, "Play error");
            }
        }
    }

    fn config_mode(&mut self, ctx: &mut ModeContext<'_>) -> Submode {
        let switches = ctx.switches;
        let items = ConfigItem::ALL.len();

        match self.submode {
            Submode::Start => {
                debug!("submode set to config select item");
                self.config_cursor = 0;
                draw_submode(ctx.display, OperationMode::Config, Submode::TopLevel);
                draw_status(ctx.display, self.config_item().label());
                Submode::TopLevel
            }
            Submode::TopLevel => {
                if switches.was_just_pressed(Switch::Up) {
                    self.config_cursor = (self.config_cursor + 1) % items;
                    draw_status(ctx.display, self.config_item().label());
                    Submode::TopLevel
                } else if switches.was_just_pressed(Switch::Down) {
                    self.config_cursor = (self.config_cursor + items - 1) % items;
                    draw_status(ctx.display, self.config_item().label());
                    Submode::TopLevel
                } else if switches.was_just_pressed(Switch::Select) {
                    draw_submode(ctx.display, OperationMode::Config, Submode::InProgress);
                    Submode::InProgress
                } else {
                    Submode::TopLevel
                }
            }
            Submode::InProgress => {
                // settings are edited in the config file for now
                draw_submode(ctx.display, OperationMode::Config, Submode::TopLevel);
                draw_status(ctx.display, self.config_item().label());
                Submode::TopLevel
            }
            Submode::Error => Submode::Error,
        }
    }
}

fn draw_mode(display: &mut dyn Display, mode: OperationMode, submode: Submode) {
    display.set_cursor(MODE_LABEL_COLUMN, 0);
    display.write_text(mode_short_label(mode));
    draw_submode(display, mode, submode);
}

fn draw_submode(display: &mut dyn Display, mode: OperationMode, submode: Submode) {
    display.set_cursor(0, 0);
    display.write_text(submode_label(mode, submode));
}

fn draw_candidate(display: &mut dyn Display, mode: OperationMode) {
    display.set_cursor(0, 1);
    display.write_text(mode_label(mode));
}

/// Replace the whole second row
fn draw_status(display: &mut dyn Display, text: &str) {
    display.set_cursor(0, 1);
    display.write_text(&full_row(text));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::display::LcdFrame;
    use crate::testing::{FakeAuditioner, FakeRecorder, ScriptedInput};

    const MODES: [OperationMode; 4] = [
        OperationMode::Record,
        OperationMode::Playback,
        OperationMode::Config,
        OperationMode::Utility,
    ];

    struct Rig {
        input: ScriptedInput,
        switches: SwitchBank,
        display: LcdFrame,
        recorder: FakeRecorder,
        auditioner: FakeAuditioner,
        machine: ModeMachine,
    }

    impl Rig {
        fn new(hold_threshold: u32) -> Self {
            Self {
                input: ScriptedInput::new(),
                switches: SwitchBank::new(),
                display: LcdFrame::new(),
                recorder: FakeRecorder::default(),
                auditioner: FakeAuditioner::default(),
                machine: ModeMachine::new(hold_threshold),
            }
        }

        fn in_mode(mode: OperationMode) -> Self {
            let mut rig = Self::new(3);
            rig.machine.set_mode(mode, &mut rig.display);
            rig.step(&[]);
            rig
        }

        fn step(&mut self, held: &[Switch]) {
            self.input.push(held);
            let mut input = self.input.clone();
            self.switches.sample_tick(&mut input);
            let mut ctx = ModeContext {
                switches: &self.switches,
                display: &mut self.display,
                recorder: &mut self.recorder,
                auditioner: &mut self.auditioner,
            };
            self.machine.tick(&mut ctx);
        }

        /// Press and release in two ticks
        fn tap(&mut self, switch: Switch) {
            self.step(&[switch]);
            self.step(&[]);
        }

        fn rows(&self) -> (String, String) {
            (self.display.row(0), self.display.row(1))
        }
    }

    #[test]
    fn test_mode_cycling_is_a_bijection() {
        for mode in MODES {
            assert_eq!(mode.next().prev(), mode);
            assert_eq!(mode.prev().next(), mode);
            assert_eq!(mode.next().next().next().next(), mode);
            assert_eq!(mode.prev().prev().prev().prev(), mode);
        }
        for a in MODES {
            for b in MODES {
                if a != b {
                    assert_ne!(a.next(), b.next());
                    assert_ne!(a.prev(), b.prev());
                }
            }
        }
    }

    #[test]
    fn test_startup_enters_the_ring() {
        assert_eq!(OperationMode::Startup.next(), OperationMode::Record);
        assert_eq!(OperationMode::Startup.prev(), OperationMode::Utility);
        for mode in MODES {
            assert_ne!(mode.next(), OperationMode::Startup);
            assert_ne!(mode.prev(), OperationMode::Startup);
        }
    }

    #[test]
    fn test_record_start_and_stop() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        assert_eq!(rig.machine.submode(), Submode::TopLevel);
        assert_eq!(rig.rows(), (full_row("Standby...   REC"), full_row("Rt Btn to start")));

        rig.step(&[Switch::Right]);
        assert_eq!(rig.machine.submode(), Submode::InProgress);
        assert_eq!(rig.machine.device_state(), DeviceState::Busy);
        assert_eq!(rig.recorder.starts, 1);
        assert_eq!(rig.display.row(1), full_row("Any Btn to stop"));

        // holding the switch is not another press
        rig.step(&[Switch::Right]);
        rig.step(&[]);
        assert_eq!(rig.machine.submode(), Submode::InProgress);

        rig.step(&[Switch::Down]);
        assert_eq!(rig.machine.submode(), Submode::Start);
        assert_eq!(rig.machine.device_state(), DeviceState::Idle);
        assert_eq!(rig.recorder.stops, 1);
        assert!(!rig.recorder.recording);
        assert_eq!(rig.rows(), (full_row("---          REC"), full_row("Stopped.")));

        // back to standby on the next tick
        rig.step(&[]);
        assert_eq!(rig.machine.submode(), Submode::TopLevel);
    }

    #[test]
    fn test_failed_start_shows_error_until_cleared() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        rig.recorder.refuse_start = true;

        rig.step(&[Switch::Right]);
        assert_eq!(rig.machine.submode(), Submode::Error);
        assert_eq!(rig.machine.device_state(), DeviceState::Error);
        assert_eq!(rig.recorder.stops, 1);
        assert_eq!(rig.rows(), (full_row("Rec Error    REC"), full_row("Any Btn to clear")));

        rig.step(&[]);
        assert_eq!(rig.machine.submode(), Submode::Error);

        rig.step(&[Switch::Up]);
        assert_eq!(rig.machine.submode(), Submode::Start);
        assert_eq!(rig.machine.device_state(), DeviceState::Idle);
        assert_eq!(rig.display.row(1), full_row("Cleared."));
    }

    #[test]
    fn test_engine_failure_while_recording() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        rig.step(&[Switch::Right]);
        rig.step(&[]);
        assert_eq!(rig.machine.submode(), Submode::InProgress);

        rig.recorder.failed = true;
        rig.step(&[]);
        assert_eq!(rig.machine.submode(), Submode::Error);
        assert_eq!(rig.machine.device_state(), DeviceState::Error);
        assert!(!rig.recorder.recording);
    }

    #[test]
    fn test_left_auditions_last_recording() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        rig.tap(Switch::Left);
        assert!(rig.auditioner.played.is_empty());
        assert_eq!(rig.display.row(1), full_row("No recording"));

        rig.tap(Switch::Right);
        rig.tap(Switch::Right);
        rig.step(&[]);
        rig.tap(Switch::Left);
        assert_eq!(rig.auditioner.played, vec![std::path::PathBuf::from("take1.wav")]);
        assert_eq!(rig.machine.submode(), Submode::TopLevel);
        assert_eq!(rig.display.row(1), full_row("Rt Btn to start"));

        rig.auditioner.fail = true;
        rig.tap(Switch::Left);
        assert_eq!(rig.display.row(1), full_row("Play error"));
    }

    #[test]
    fn test_config_items_wrap_both_ways() {
        let mut rig = Rig::in_mode(OperationMode::Config);
        assert_eq!(rig.machine.submode(), Submode::TopLevel);
        assert_eq!(rig.machine.config_item(), ConfigItem::Device);
        assert_eq!(rig.rows(), (full_row("Sel item:    CFG"), full_row("Dev")));

        rig.tap(Switch::Down);
        assert_eq!(rig.machine.config_item(), ConfigItem::Width);
        assert_eq!(rig.display.row(1), full_row("Wid"));

        // Up from the last item wraps to the first and redraws it
        rig.tap(Switch::Up);
        assert_eq!(rig.machine.config_item(), ConfigItem::Device);
        assert_eq!(rig.display.row(1), full_row("Dev"));

        for _ in 0..ConfigItem::ALL.len() {
            rig.tap(Switch::Up);
        }
        assert_eq!(rig.machine.config_item(), ConfigItem::Device);
        assert_eq!(rig.display.row(1), full_row("Dev"));
    }

    #[test]
    fn test_config_change_returns_to_item_list() {
        let mut rig = Rig::in_mode(OperationMode::Config);
        rig.tap(Switch::Up);
        rig.step(&[Switch::Select]);
        assert_eq!(rig.machine.submode(), Submode::InProgress);
        assert_eq!(rig.display.row(0), full_row("Changing...  CFG"));

        rig.step(&[]);
        assert_eq!(rig.machine.submode(), Submode::TopLevel);
        assert_eq!(rig.rows(), (full_row("Sel item:    CFG"), full_row("Chn")));
    }

    #[test]
    fn test_hold_select_opens_mode_selection() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        rig.step(&[Switch::Select]);
        rig.step(&[Switch::Select]);
        rig.step(&[Switch::Select]);
        assert_eq!(rig.machine.candidate(), None);

        rig.step(&[Switch::Select]);
        assert_eq!(rig.machine.candidate(), Some(OperationMode::Record));
        assert_eq!(rig.rows(), (full_row("Sel Mode:    REC"), full_row("RECORD")));

        rig.step(&[]);
        rig.tap(Switch::Up);
        rig.tap(Switch::Up);
        assert_eq!(rig.machine.candidate(), Some(OperationMode::Config));
        rig.tap(Switch::Down);
        assert_eq!(rig.machine.candidate(), Some(OperationMode::Playback));
        assert_eq!(rig.display.row(1), full_row("PLAYBACK"));

        // recorder is not driven while selecting
        rig.tap(Switch::Right);
        assert_eq!(rig.recorder.starts, 0);

        rig.step(&[Switch::Select]);
        assert_eq!(rig.machine.candidate(), None);
        assert_eq!(rig.machine.mode(), OperationMode::Playback);
        assert_eq!(rig.machine.submode(), Submode::Start);
        assert_eq!(rig.rows(), (full_row("---          PLY"), full_row("")));
    }

    #[test]
    fn test_short_select_press_is_discarded() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        rig.step(&[Switch::Select]);
        rig.step(&[Switch::Select]);
        rig.step(&[]);
        rig.step(&[Switch::Select]);
        rig.step(&[Switch::Select]);
        rig.step(&[Switch::Select]);
        assert_eq!(rig.machine.candidate(), None);
        assert_eq!(rig.machine.submode(), Submode::TopLevel);
    }

    #[test]
    fn test_commit_does_not_reopen_while_held() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        for _ in 0..4 {
            rig.step(&[Switch::Select]);
        }
        rig.step(&[]);
        for _ in 0..10 {
            rig.step(&[Switch::Select]);
        }
        assert_eq!(rig.machine.candidate(), None);
        assert_eq!(rig.machine.mode(), OperationMode::Record);
    }

    #[test]
    fn test_no_gesture_while_recording() {
        let mut rig = Rig::in_mode(OperationMode::Record);
        rig.step(&[Switch::Right]);
        rig.step(&[]);
        // the Select press that stops the recording does not arm the gesture
        for _ in 0..4 {
            rig.step(&[Switch::Select]);
        }
        assert_eq!(rig.recorder.stops, 1);
        assert_eq!(rig.machine.candidate(), None);
    }

    #[test]
    fn test_startup_mode_is_invalid() {
        let mut rig = Rig::new(3);
        rig.step(&[]);
        assert_eq!(rig.machine.mode(), OperationMode::Startup);
        assert_eq!(rig.display.row(0), full_row("Invalid Mode!"));
    }
}
