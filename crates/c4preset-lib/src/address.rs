//! Preset name addresses: one 3-byte device address per slot.

use crate::protocol::{BASE_PRESET_ADDRESS, PRESET_NAME_OFFSET, PRESET_SIZE, SLOT_COUNT};

/// Device memory address of a preset name field, in wire order
/// `[high, mid, name offset]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAddress([u8; 3]);

impl SlotAddress {
    /// Address of the name field of `slot`.
    ///
    /// The high and mid bytes come from `BASE + slot * PRESET_SIZE`; the low
    /// byte is always the name offset since presets are 4 KB aligned.
    pub fn for_slot(slot: u8) -> Self {
        let base = BASE_PRESET_ADDRESS + slot as u32 * PRESET_SIZE;
        let high = (base >> 16) as u8;
        let mid = (base >> 8) as u8;
        SlotAddress([high, mid, PRESET_NAME_OFFSET])
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        SlotAddress(bytes)
    }

    pub fn bytes(self) -> [u8; 3] {
        self.0
    }

    /// Full 24-bit address.
    pub fn value(self) -> u32 {
        let [high, mid, low] = self.0;
        (high as u32) << 16 | (mid as u32) << 8 | low as u32
    }
}

/// All slot addresses, computed once per discovery session.
#[derive(Debug, Clone)]
pub struct AddressTable {
    addrs: [SlotAddress; SLOT_COUNT],
}

impl Default for AddressTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressTable {
    pub fn new() -> Self {
        AddressTable {
            addrs: std::array::from_fn(|i| SlotAddress::for_slot(i as u8)),
        }
    }

    /// Address for `slot`, or `None` past the end of the bank.
    pub fn get(&self, slot: usize) -> Option<SlotAddress> {
        self.addrs.get(slot).copied()
    }

    /// Reverse lookup: which slot does this address name?
    pub fn slot_of(&self, addr: SlotAddress) -> Option<usize> {
        self.addrs.iter().position(|&a| a == addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotAddress> {
        self.addrs.iter()
    }
}
