//! Preset discovery: one read request per slot, strictly sequential.
//!
//! Discovery is event driven: the controller issues a request on mount and
//! after every accepted response. A response is accepted only while a request
//! is in flight; anything else is a stray report and is dropped. A response
//! that never arrives stalls discovery until the device is remounted.

use crate::address::AddressTable;
use crate::catalog::{Catalog, CatalogEntry, PresetName};
use crate::clock::Clock;
use crate::device::{self, HidTransport};
use crate::protocol::{SLOT_COUNT, parse_read_response, read_request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    /// No device mounted, nothing requested.
    Idle,
    Running,
    Complete,
}

/// Result of feeding one accepted response to discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotOutcome {
    pub slot: usize,
    /// Slot was erased and not added to the catalog.
    pub empty: bool,
    /// This was the last slot.
    pub complete: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryState {
    started: bool,
    next_slot: usize,
    found: usize,
    in_flight: bool,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DiscoveryPhase {
        if !self.started {
            DiscoveryPhase::Idle
        } else if self.next_slot >= SLOT_COUNT {
            DiscoveryPhase::Complete
        } else {
            DiscoveryPhase::Running
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase() == DiscoveryPhase::Complete
    }

    /// Next slot to query; equals the number of slots scanned so far.
    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    /// Non-empty slots found so far.
    pub fn found(&self) -> usize {
        self.found
    }

    /// Whether a request is waiting for its response.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Start a new session at slot 0.
    pub fn begin(&mut self) {
        *self = DiscoveryState {
            started: true,
            ..Self::default()
        };
    }

    /// Abandon any session in progress.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Request the name of the next slot.
    ///
    /// Waits `settle_delay_ms` first; the pedal answers erratically when
    /// requests come back to back.
    pub fn issue_request(
        &mut self,
        table: &AddressTable,
        transport: &mut impl HidTransport,
        clock: &impl Clock,
        settle_delay_ms: u64,
    ) -> device::Result<()> {
        if self.phase() != DiscoveryPhase::Running {
            return Ok(());
        }
        let Some(addr) = table.get(self.next_slot) else {
            return Ok(());
        };
        clock.delay_ms(settle_delay_ms);
        transport.send_report(&read_request(addr))?;
        self.in_flight = true;
        log::debug!(
            "discovery: requested slot {} (addr 0x{:06X})",
            self.next_slot,
            addr.value()
        );
        transport.arm_receive()
    }

    /// Feed one input report. Returns `None` if the report was dropped.
    pub fn accept(&mut self, report: &[u8], catalog: &mut Catalog) -> Option<SlotOutcome> {
        if !self.in_flight || self.phase() != DiscoveryPhase::Running {
            return None;
        }
        let response = parse_read_response(report)?;
        self.in_flight = false;

        let slot = self.next_slot;
        let empty = response.is_empty();
        if !empty {
            catalog.push(CatalogEntry {
                slot: slot as u8,
                name: PresetName::from_bytes(response.name),
            });
            self.found += 1;
        }
        self.next_slot += 1;

        Some(SlotOutcome {
            slot,
            empty,
            complete: self.next_slot >= SLOT_COUNT,
        })
    }
}
