//! Encoder-driven preset navigation.
//!
//! `cursor` is the catalog position on screen; `selected` is the position of
//! the last program change sent. They move independently: turning the
//! encoder never changes the loaded preset, only a press does.

use crate::catalog::Catalog;
use crate::device::{self, HidTransport};
use crate::display::{self, CharDisplay};
use crate::input::{Direction, InputEvents};
use crate::protocol::program_change;

/// What one poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    /// The preset lines were redrawn.
    pub refreshed: bool,
    /// Slot sent in a program change.
    pub program_change: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    cursor: usize,
    last_displayed: Option<usize>,
    selected: Option<usize>,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn last_displayed(&self) -> Option<usize> {
        self.last_displayed
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record that `index` is on screen without redrawing.
    pub(crate) fn mark_displayed(&mut self, index: usize) {
        self.last_displayed = Some(index);
    }

    /// Move the cursor one step with wraparound at both ends.
    pub fn step(&mut self, direction: Direction, count: usize) {
        if count == 0 {
            return;
        }
        self.cursor = match direction {
            Direction::Clockwise => (self.cursor + 1) % count,
            Direction::CounterClockwise => (self.cursor + count - 1) % count,
            Direction::None => self.cursor,
        };
    }

    /// Apply one poll's worth of input.
    ///
    /// Redraws only when the cursor lands on a different entry than the one
    /// shown. A press always sends, even when the preset is already active.
    pub fn apply(
        &mut self,
        events: InputEvents,
        catalog: &Catalog,
        transport: &mut impl HidTransport,
        display: &mut impl CharDisplay,
        name_width: usize,
    ) -> device::Result<PollOutcome> {
        let mut outcome = PollOutcome::default();
        let count = catalog.count();
        if count == 0 {
            return Ok(outcome);
        }

        self.step(events.direction, count);

        if self.last_displayed != Some(self.cursor) {
            if let Some(entry) = catalog.entry_at(self.cursor) {
                let active = self.selected == Some(self.cursor);
                display::show_preset(display, entry, active, name_width);
            }
            self.last_displayed = Some(self.cursor);
            outcome.refreshed = true;
        }

        if events.pressed
            && let Some(slot) = catalog.original_index_at(self.cursor)
            && let Some(report) = program_change(slot)
        {
            transport.send_report(&report)?;
            self.selected = Some(self.cursor);
            display::show_active_marker(display, true);
            log::info!("program change: preset {:03} (slot {slot})", slot as u16 + 1);
            outcome.program_change = Some(slot);
        }

        Ok(outcome)
    }
}
