//! Character display abstraction and the 20×4 screen layout.
//!
//! ```text
//!   col 0         8        17
//! 1 *-- C4 Synth --*    OK
//! 2 Preset  001      ACT
//! 3 <preset name, 20 chars>
//! 4 012 Active Presets
//! ```

use crate::catalog::CatalogEntry;

/// Number of text lines.
pub const LINES: u8 = 4;

/// Characters per line.
pub const COLUMNS: u8 = 20;

pub const LINE_TITLE: u8 = 1;
pub const LINE_PRESET: u8 = 2;
pub const LINE_NAME: u8 = 3;
pub const LINE_COUNT: u8 = 4;

/// Device status (` OK` / `NOK`) on the title line.
pub const COL_STATUS: u8 = 17;
/// Preset number on the preset line.
pub const COL_NUMBER: u8 = 8;
/// `ACT` marker on the preset line.
pub const COL_ACTIVE: u8 = 17;

const TITLE: &str = "*-- C4 Synth --*    ";
const NOT_AVAILABLE: &str = "N/A";
const ACTIVE_MARKER: &str = "ACT";
const BLANK_MARKER: &str = "   ";

/// A text display addressed by 1-based line and 0-based column.
///
/// Implementations bound text that runs past the last column.
pub trait CharDisplay {
    fn write_at(&mut self, line: u8, column: u8, text: &str);
}

/// In-memory 20×4 character grid.
///
/// Used as the frame buffer for terminal rendering and as a recording
/// display in tests.
#[derive(Debug, Clone)]
pub struct TextGrid {
    cells: [[u8; COLUMNS as usize]; LINES as usize],
    writes: usize,
}

impl Default for TextGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl TextGrid {
    pub fn new() -> Self {
        TextGrid {
            cells: [[b' '; COLUMNS as usize]; LINES as usize],
            writes: 0,
        }
    }

    /// Contents of a 1-based line, or an empty string if out of range.
    pub fn line(&self, line: u8) -> String {
        match line.checked_sub(1).and_then(|i| self.cells.get(i as usize)) {
            Some(row) => String::from_utf8_lossy(row).into_owned(),
            None => String::new(),
        }
    }

    /// Text at `line`, starting at `column`, `len` characters long.
    pub fn text_at(&self, line: u8, column: u8, len: usize) -> String {
        self.line(line)
            .chars()
            .skip(column as usize)
            .take(len)
            .collect()
    }

    /// All lines joined with newlines.
    pub fn render(&self) -> String {
        (1..=LINES)
            .map(|l| self.line(l))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of `write_at` calls since creation or the last reset.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn reset_write_count(&mut self) {
        self.writes = 0;
    }
}

impl CharDisplay for TextGrid {
    fn write_at(&mut self, line: u8, column: u8, text: &str) {
        self.writes += 1;
        let Some(row) = line
            .checked_sub(1)
            .and_then(|i| self.cells.get_mut(i as usize))
        else {
            return;
        };
        for (cell, b) in row
            .iter_mut()
            .skip(column as usize)
            .zip(text.bytes().map(|b| if b.is_ascii() { b } else { b'?' }))
        {
            *cell = b;
        }
    }
}

// ── Screens ──

/// Power-on screen: title, no device, no preset.
pub fn show_splash(display: &mut impl CharDisplay) {
    display.write_at(LINE_TITLE, 0, TITLE);
    display.write_at(LINE_TITLE, COL_STATUS, "NOK");
    display.write_at(LINE_PRESET, 0, "Preset  N/A");
    display.write_at(LINE_COUNT, 0, "N/A Active Presets  ");
}

pub fn show_connected(display: &mut impl CharDisplay) {
    display.write_at(LINE_TITLE, COL_STATUS, " OK");
}

/// Device gone: everything back to "not available".
pub fn show_disconnected(display: &mut impl CharDisplay) {
    display.write_at(LINE_TITLE, COL_STATUS, "NOK");
    show_unavailable(display);
    display.write_at(LINE_COUNT, 0, NOT_AVAILABLE);
}

/// Discovery finished without any active preset.
pub fn show_unavailable(display: &mut impl CharDisplay) {
    display.write_at(LINE_PRESET, COL_NUMBER, "N/A ");
    display.write_at(LINE_PRESET, COL_ACTIVE, BLANK_MARKER);
    display.write_at(LINE_NAME, 0, &" ".repeat(COLUMNS as usize));
}

/// Show a catalog entry: 1-based number, active marker and name.
pub fn show_preset(
    display: &mut impl CharDisplay,
    entry: &CatalogEntry,
    active: bool,
    name_width: usize,
) {
    display.write_at(
        LINE_PRESET,
        COL_NUMBER,
        &format!("{:03} ", entry.preset_number()),
    );
    show_active_marker(display, active);
    display.write_at(LINE_NAME, 0, &entry.name.display_text(name_width));
}

pub fn show_active_marker(display: &mut impl CharDisplay, active: bool) {
    let marker = if active { ACTIVE_MARKER } else { BLANK_MARKER };
    display.write_at(LINE_PRESET, COL_ACTIVE, marker);
}

pub fn show_count(display: &mut impl CharDisplay, count: usize) {
    display.write_at(LINE_COUNT, 0, &format!("{count:03}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PresetName;

    #[test]
    fn grid_starts_blank() {
        let g = TextGrid::new();
        assert_eq!(g.line(1), " ".repeat(20));
        assert_eq!(g.write_count(), 0);
    }

    #[test]
    fn write_at_positions_text() {
        let mut g = TextGrid::new();
        g.write_at(2, 8, "042");
        assert_eq!(g.text_at(2, 8, 3), "042");
        assert_eq!(g.text_at(2, 0, 8), "        ");
    }

    #[test]
    fn write_clips_at_last_column() {
        let mut g = TextGrid::new();
        g.write_at(1, 17, "ABCDEF");
        assert_eq!(g.line(1).len(), 20);
        assert_eq!(g.text_at(1, 17, 3), "ABC");
    }

    #[test]
    fn out_of_range_line_ignored_but_counted() {
        let mut g = TextGrid::new();
        g.write_at(0, 0, "X");
        g.write_at(5, 0, "X");
        assert_eq!(g.render(), TextGrid::new().render());
        assert_eq!(g.write_count(), 2);
    }

    #[test]
    fn non_ascii_replaced() {
        let mut g = TextGrid::new();
        g.write_at(3, 0, "é");
        assert!(g.line(3).starts_with('?'));
    }

    #[test]
    fn render_has_four_lines() {
        let g = TextGrid::new();
        assert_eq!(g.render().lines().count(), 4);
    }

    #[test]
    fn reset_write_count() {
        let mut g = TextGrid::new();
        g.write_at(1, 0, "A");
        g.reset_write_count();
        assert_eq!(g.write_count(), 0);
    }

    #[test]
    fn splash_layout() {
        let mut g = TextGrid::new();
        show_splash(&mut g);
        assert_eq!(g.line(1), "*-- C4 Synth --* NOK");
        assert!(g.line(2).starts_with("Preset  N/A"));
        assert!(g.line(4).starts_with("N/A Active Presets"));
    }

    #[test]
    fn connected_status() {
        let mut g = TextGrid::new();
        show_splash(&mut g);
        show_connected(&mut g);
        assert_eq!(g.text_at(1, 17, 3), " OK");
    }

    #[test]
    fn preset_layout() {
        let mut g = TextGrid::new();
        let entry = CatalogEntry {
            slot: 2,
            name: PresetName::from_text("Squelch Bass"),
        };
        show_preset(&mut g, &entry, true, 20);
        assert_eq!(g.text_at(2, 8, 3), "003");
        assert_eq!(g.text_at(2, 17, 3), "ACT");
        assert_eq!(g.line(3).trim_end(), "Squelch Bass");
    }

    #[test]
    fn shorter_name_overwrites_longer() {
        let mut g = TextGrid::new();
        let long = CatalogEntry {
            slot: 0,
            name: PresetName::from_text("Very Long Name Here"),
        };
        let short = CatalogEntry {
            slot: 1,
            name: PresetName::from_text("B"),
        };
        show_preset(&mut g, &long, false, 20);
        show_preset(&mut g, &short, false, 20);
        assert_eq!(g.line(3).trim_end(), "B");
    }

    #[test]
    fn disconnected_layout() {
        let mut g = TextGrid::new();
        let entry = CatalogEntry {
            slot: 0,
            name: PresetName::from_text("A"),
        };
        show_preset(&mut g, &entry, true, 20);
        show_disconnected(&mut g);
        assert_eq!(g.text_at(1, 17, 3), "NOK");
        assert_eq!(g.text_at(2, 8, 3), "N/A");
        assert_eq!(g.text_at(2, 17, 3), "   ");
        assert_eq!(g.line(3).trim(), "");
        assert_eq!(g.text_at(4, 0, 3), "N/A");
    }

    #[test]
    fn count_is_zero_padded() {
        let mut g = TextGrid::new();
        show_count(&mut g, 7);
        assert_eq!(g.text_at(4, 0, 3), "007");
    }
}
