//! Encoder input: the hand-off between the input source and the poll loop.
//!
//! The input source (GPIO interrupt, stdin reader thread, ...) records turns
//! and button edges into an [`EncoderSignal`]; the control loop takes and
//! clears it exactly once per poll.

use std::sync::atomic::{AtomicU8, Ordering};

/// Rotation observed since the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
    #[default]
    None,
}

/// Direction bits of the packed signal.
const DIRECTION_MASK: u8 = 0b011;
const CLOCKWISE: u8 = 0b001;
const COUNTER_CLOCKWISE: u8 = 0b010;
/// Press edge bit of the packed signal.
const PRESSED: u8 = 0b100;

impl Direction {
    fn to_bits(self) -> u8 {
        match self {
            Direction::Clockwise => CLOCKWISE,
            Direction::CounterClockwise => COUNTER_CLOCKWISE,
            Direction::None => 0,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & DIRECTION_MASK {
            CLOCKWISE => Direction::Clockwise,
            COUNTER_CLOCKWISE => Direction::CounterClockwise,
            _ => Direction::None,
        }
    }
}

/// Input consumed by one poll: at most one step and at most one press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputEvents {
    pub direction: Direction,
    pub pressed: bool,
}

impl InputEvents {
    pub fn turn(direction: Direction) -> Self {
        InputEvents {
            direction,
            pressed: false,
        }
    }

    pub fn press() -> Self {
        InputEvents {
            direction: Direction::None,
            pressed: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.direction == Direction::None && !self.pressed
    }
}

/// Single-producer / single-consumer encoder signal cell.
///
/// Turns between two polls coalesce: the last recorded direction wins.
/// Presses are edge-triggered: any number of presses between two polls
/// yields one press. Both live in one byte, so a poll sees a turn and the
/// press recorded after it together or not at all.
#[derive(Debug, Default)]
pub struct EncoderSignal {
    bits: AtomicU8,
}

impl EncoderSignal {
    pub const fn new() -> Self {
        EncoderSignal {
            bits: AtomicU8::new(0),
        }
    }

    /// Producer side: record a detent.
    pub fn record_turn(&self, direction: Direction) {
        if direction == Direction::None {
            return;
        }
        let dir = direction.to_bits();
        // The closure always returns Some, so this cannot fail.
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some(bits & !DIRECTION_MASK | dir)
            });
    }

    /// Producer side: record a button press edge.
    pub fn record_press(&self) {
        self.bits.fetch_or(PRESSED, Ordering::AcqRel);
    }

    /// Consumer side: read and clear both signals with one swap.
    pub fn take(&self) -> InputEvents {
        let bits = self.bits.swap(0, Ordering::AcqRel);
        InputEvents {
            direction: Direction::from_bits(bits),
            pressed: bits & PRESSED != 0,
        }
    }
}
