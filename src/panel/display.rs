//! Two-line character display and the menu strings drawn on it

use tracing::{debug, info};

use super::modes::{OperationMode, Submode};

pub const COLUMNS: usize = 16;
pub const ROWS: usize = 2;

/// Column of the short mode label on the top row
pub const MODE_LABEL_COLUMN: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backlight {
    On,
    Off,
}

/// Character display driven by the front panel
pub trait Display {
    /// Move the cursor to `col`, `row` (zero based)
    fn set_cursor(&mut self, col: usize, row: usize);

    /// Write text at the cursor, a newline moves to the start of the next row
    fn write_text(&mut self, text: &str);

    fn set_backlight(&mut self, backlight: Backlight);

    /// Blank both rows and home the cursor
    fn clear(&mut self);

    /// Called once per panel tick after all drawing is done
    fn refresh(&mut self) {}
}

/// In-memory 16x2 frame buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdFrame {
    cells: [[char; COLUMNS]; ROWS],
    col: usize,
    row: usize,
    backlight: Backlight,
}

impl Default for LcdFrame {
    fn default() -> Self {
        Self {
            cells: [[' '; COLUMNS]; ROWS],
            col: 0,
            row: 0,
            backlight: Backlight::Off,
        }
    }
}

impl LcdFrame {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of one row, trailing blanks included
    pub fn row(&self, row: usize) -> String {
        self.cells
            .get(row)
            .map(|cells| cells.iter().collect())
            .unwrap_or_default()
    }

    pub fn backlight(&self) -> Backlight {
        self.backlight
    }
}

impl Display for LcdFrame {
    fn set_cursor(&mut self, col: usize, row: usize) {
        self.col = col.min(COLUMNS);
        self.row = row.min(ROWS - 1);
    }

    fn write_text(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.col = 0;
                self.row = (self.row + 1).min(ROWS - 1);
                continue;
            }
            // past the last column characters are lost
            if self.col < COLUMNS {
                self.cells[self.row][self.col] = c;
                self.col += 1;
            }
        }
    }

    fn set_backlight(&mut self, backlight: Backlight) {
        self.backlight = backlight;
    }

    fn clear(&mut self) {
        self.cells = [[' '; COLUMNS]; ROWS];
        self.col = 0;
        self.row = 0;
    }
}

/// Display that keeps a frame buffer and logs it whenever it changes
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    frame: LcdFrame,
    shown: Option<LcdFrame>,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn frame(&self) -> &LcdFrame {
        &self.frame
    }
}

impl Display for TerminalDisplay {
    fn set_cursor(&mut self, col: usize, row: usize) {
        self.frame.set_cursor(col, row);
    }

    fn write_text(&mut self, text: &str) {
        self.frame.write_text(text);
    }

    fn set_backlight(&mut self, backlight: Backlight) {
        if backlight != self.frame.backlight() {
            debug!("Backlight {:?}", backlight);
        }
        self.frame.set_backlight(backlight);
    }

    fn clear(&mut self) {
        self.frame.clear();
    }

    fn refresh(&mut self) {
        if self.shown.as_ref() == Some(&self.frame) {
            return;
        }
        info!("[{}] [{}]", self.frame.row(0), self.frame.row(1));
        self.shown = Some(self.frame.clone());
    }
}

/// Full-width name shown while choosing a mode
pub fn mode_label(mode: OperationMode) -> &'static str {
    match mode {
        OperationMode::Startup => "STARTUP         ",
        OperationMode::Record => "RECORD          ",
        OperationMode::Playback => "PLAYBACK        ",
        OperationMode::Config => "CONFIG          ",
        OperationMode::Utility => "UTILITY         ",
    }
}

/// Three-letter mode tag shown in the top right corner
pub fn mode_short_label(mode: OperationMode) -> &'static str {
    match mode {
        OperationMode::Startup => "SUP",
        OperationMode::Record => "REC",
        OperationMode::Playback => "PLY",
        OperationMode::Config => "CFG",
        OperationMode::Utility => "UTL",
    }
}

/// Top row submode text, padded to clear the previous label
pub fn submode_label(mode: OperationMode, submode: Submode) -> &'static str {
    use OperationMode::*;
    use Submode::*;

    match (mode, submode) {
        (_, Start) => "---         ",
        (Startup, _) => "            ",
        (Record, TopLevel) => "Standby...  ",
        (Record, InProgress) => "Rec in prog  ",
        (Record, Error) => "Rec Error   ",
        (Playback, TopLevel) => "Sel file:   ",
        (Playback, InProgress) => "Playing...   ",
        (Playback, Error) => "Play Error  ",
        (Config, TopLevel) => "Sel item:   ",
        (Config, InProgress) => "Changing...  ",
        (Utility, TopLevel) => "sel utility ",
        (Utility, InProgress) => "Running...   ",
        (Config, Error) | (Utility, Error) => "Error       ",
    }
}

/// Pad or cut `text` to exactly one display row
pub fn full_row(text: &str) -> String {
    format!("{:<width$.width$}", text, width = COLUMNS)
}
