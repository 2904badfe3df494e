//! Protocol constants and report framing for the Source Audio C4 Synth.
//!
//! The pedal exposes a vendor HID interface with two commands:
//! - `0x36` followed by a 3-byte memory address dumps that memory location.
//!   The response echoes the opcode and carries 32 bytes of data.
//! - `0x77` followed by an internal preset number (0-127) loads that preset.
//!
//! Preset numbers shown to humans (Neuro Desktop range) are 1-based; the
//! device itself is 0-based.

use crate::address::SlotAddress;

// ── USB identifiers ──

/// Source Audio vendor ID.
pub const C4_VID: u16 = 0x29A4;

/// C4 Synth product ID.
pub const C4_PID: u16 = 0x0302;

// ── Opcodes ──

/// Memory read: `[0x36, addr2, addr1, addr0]`.
pub const OP_READ: u8 = 0x36;

/// Program change: `[0x77, slot]`.
pub const OP_PROGRAM_CHANGE: u8 = 0x77;

// ── Preset memory layout ──

/// Base address of the preset bank.
pub const BASE_PRESET_ADDRESS: u32 = 0x8_0000;

/// Each preset fills 4 KB.
pub const PRESET_SIZE: u32 = 0x1000;

/// Preset name lives at this offset from the preset base address.
pub const PRESET_NAME_OFFSET: u8 = 0xA0;

/// Number of preset slots on the device.
pub const SLOT_COUNT: usize = 128;

/// Length of the raw preset name field.
pub const NAME_LEN: usize = 32;

/// First name byte of an erased (empty) slot.
pub const EMPTY_SENTINEL: u8 = 0xFF;

/// Delay before each discovery request. The pedal answers erratically
/// without it.
pub const SETTLE_DELAY_MS: u64 = 25;

// ── Report sizes ──

pub const READ_REQUEST_LEN: usize = 4;

/// Opcode echo + name field.
pub const READ_RESPONSE_LEN: usize = 1 + NAME_LEN;

pub const PROGRAM_CHANGE_LEN: usize = 2;

/// Interrupt IN buffer size (full-speed HID max packet).
pub const REPORT_BUFFER_LEN: usize = 64;

/// Whether a vendor/product pair identifies a C4 Synth.
pub fn is_c4_synth(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == C4_VID && product_id == C4_PID
}

/// Build a memory read request for the given address.
pub fn read_request(addr: SlotAddress) -> [u8; READ_REQUEST_LEN] {
    let [b2, b1, b0] = addr.bytes();
    [OP_READ, b2, b1, b0]
}

/// Build a program change request. Returns `None` for slots outside 0..128.
pub fn program_change(slot: u8) -> Option<[u8; PROGRAM_CHANGE_LEN]> {
    if (slot as usize) < SLOT_COUNT {
        Some([OP_PROGRAM_CHANGE, slot])
    } else {
        None
    }
}

/// A decoded memory read response carrying one preset name field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResponse {
    pub name: [u8; NAME_LEN],
}

impl ReadResponse {
    /// An erased slot has its name filled with `0xFF`.
    pub fn is_empty(&self) -> bool {
        self.name[0] == EMPTY_SENTINEL
    }
}

/// Decode a memory read response.
///
/// Returns `None` for anything that is not a read echo or is too short to
/// hold a full name field. Trailing bytes beyond the name (the transport may
/// hand over a padded 64-byte buffer) are ignored.
pub fn parse_read_response(report: &[u8]) -> Option<ReadResponse> {
    if report.len() < READ_RESPONSE_LEN || report[0] != OP_READ {
        return None;
    }
    let mut name = [0u8; NAME_LEN];
    name.copy_from_slice(&report[1..READ_RESPONSE_LEN]);
    Some(ReadResponse { name })
}
