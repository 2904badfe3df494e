//! The preset controller: one object owning all discovery and navigation state.
//!
//! The host calls the entry points from its event loop and passes in the
//! transport, display and clock by reference. Everything is single-threaded;
//! only [`EncoderSignal`](crate::input::EncoderSignal) crosses threads.

use crate::address::AddressTable;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::device::{self, DeviceIdentity, HidTransport};
use crate::discovery::DiscoveryState;
use crate::display::{self, CharDisplay, COLUMNS};
use crate::input::InputEvents;
use crate::navigation::{NavigationState, PollOutcome};
use crate::protocol::SETTLE_DELAY_MS;

/// What happened to a report handed to [`PresetController::on_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDisposition {
    /// Not from the mounted device, not expected, or malformed.
    Ignored,
    /// Stored (or skipped as empty); the next request has been issued.
    Accepted,
    /// The last slot arrived and the first preset is on screen.
    Completed,
}

#[derive(Debug)]
pub struct PresetController {
    table: AddressTable,
    catalog: Catalog,
    discovery: DiscoveryState,
    navigation: NavigationState,
    mounted: Option<DeviceIdentity>,
    settle_delay_ms: u64,
    name_width: usize,
}

impl Default for PresetController {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetController {
    pub fn new() -> Self {
        Self::with_settings(SETTLE_DELAY_MS, COLUMNS as usize)
    }

    /// Controller with a custom settling delay and name column width.
    pub fn with_settings(settle_delay_ms: u64, name_width: usize) -> Self {
        PresetController {
            table: AddressTable::new(),
            catalog: Catalog::new(),
            discovery: DiscoveryState::new(),
            navigation: NavigationState::new(),
            mounted: None,
            settle_delay_ms,
            name_width: name_width.clamp(1, COLUMNS as usize),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn discovery(&self) -> &DiscoveryState {
        &self.discovery
    }

    pub fn mounted(&self) -> Option<DeviceIdentity> {
        self.mounted
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn discovery_complete(&self) -> bool {
        self.mounted.is_some() && self.discovery.is_complete()
    }

    pub fn show_splash(&self, display: &mut impl CharDisplay) {
        display::show_splash(display);
    }

    /// A HID interface appeared.
    ///
    /// Returns `Ok(false)` when the device is not a C4 Synth or another one is
    /// already mounted. Otherwise starts discovery from slot 0.
    pub fn on_mount(
        &mut self,
        identity: DeviceIdentity,
        transport: &mut impl HidTransport,
        display: &mut impl CharDisplay,
        clock: &impl Clock,
    ) -> device::Result<bool> {
        if !identity.is_c4_synth() {
            log::debug!(
                "ignoring mount of {:04x}:{:04x}",
                identity.vendor_id,
                identity.product_id
            );
            return Ok(false);
        }
        if let Some(current) = self.mounted
            && !current.same_interface(&identity)
        {
            log::warn!(
                "ignoring second C4 Synth at address {} (already using address {})",
                identity.address,
                current.address
            );
            return Ok(false);
        }

        self.reset_session();
        self.mounted = Some(identity);
        self.table = AddressTable::new();
        display::show_connected(display);
        log::info!(
            "C4 Synth mounted (address {}, instance {})",
            identity.address,
            identity.instance
        );

        self.discovery.begin();
        self.discovery
            .issue_request(&self.table, transport, clock, self.settle_delay_ms)?;
        Ok(true)
    }

    /// A HID interface went away. Returns whether it was the mounted device.
    ///
    /// No program change is sent; the pedal keeps whatever preset it had.
    pub fn on_unmount(&mut self, identity: DeviceIdentity, display: &mut impl CharDisplay) -> bool {
        match self.mounted {
            Some(current) if current.same_interface(&identity) => {
                self.reset_session();
                display::show_disconnected(display);
                log::info!("C4 Synth unmounted");
                true
            }
            _ => false,
        }
    }

    /// An input report arrived.
    pub fn on_report(
        &mut self,
        identity: DeviceIdentity,
        report: &[u8],
        transport: &mut impl HidTransport,
        display: &mut impl CharDisplay,
        clock: &impl Clock,
    ) -> device::Result<ReportDisposition> {
        if !self
            .mounted
            .is_some_and(|current| current.same_interface(&identity))
        {
            return Ok(ReportDisposition::Ignored);
        }

        let Some(outcome) = self.discovery.accept(report, &mut self.catalog) else {
            log::warn!(
                "dropping unexpected report ({} bytes, first byte {:02X?})",
                report.len(),
                report.first()
            );
            return Ok(ReportDisposition::Ignored);
        };

        log::debug!(
            "discovery: slot {} {}",
            outcome.slot,
            if outcome.empty { "empty" } else { "active" }
        );

        if outcome.complete {
            self.finish_discovery(display);
            return Ok(ReportDisposition::Completed);
        }

        self.discovery
            .issue_request(&self.table, transport, clock, self.settle_delay_ms)?;
        Ok(ReportDisposition::Accepted)
    }

    /// One pass of the navigation loop.
    ///
    /// Inert until a device is mounted and discovery has finished.
    pub fn poll(
        &mut self,
        events: InputEvents,
        transport: &mut impl HidTransport,
        display: &mut impl CharDisplay,
    ) -> device::Result<PollOutcome> {
        if !self.discovery_complete() {
            return Ok(PollOutcome::default());
        }
        self.navigation
            .apply(events, &self.catalog, transport, display, self.name_width)
    }

    fn finish_discovery(&mut self, display: &mut impl CharDisplay) {
        self.navigation.reset();
        match self.catalog.entry_at(0) {
            Some(first) => {
                display::show_preset(display, first, false, self.name_width);
                self.navigation.mark_displayed(0);
            }
            None => display::show_unavailable(display),
        }
        display::show_count(display, self.catalog.count());
        log::info!("discovery complete: {} active presets", self.catalog.count());
    }

    fn reset_session(&mut self) {
        self.catalog.clear();
        self.discovery.reset();
        self.navigation.reset();
        self.mounted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mock::ManualClock;
    use crate::device::mock::SimulatedC4;
    use crate::display::TextGrid;
    use crate::input::Direction;
    use crate::protocol::{C4_PID, C4_VID, SLOT_COUNT};
    use std::time::Duration;

    /// Deliver queued reports until none are left.
    fn pump(
        ctl: &mut PresetController,
        dev: &mut SimulatedC4,
        grid: &mut TextGrid,
        clock: &ManualClock,
    ) {
        let id = dev.identity();
        while let Some(report) = dev.receive_report(Duration::ZERO).unwrap() {
            ctl.on_report(id, &report, dev, grid, clock).unwrap();
        }
    }

    fn mounted(dev: &mut SimulatedC4) -> (PresetController, TextGrid, ManualClock) {
        let mut ctl = PresetController::new();
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        ctl.show_splash(&mut grid);
        let id = dev.identity();
        assert!(ctl.on_mount(id, dev, &mut grid, &clock).unwrap());
        pump(&mut ctl, dev, &mut grid, &clock);
        (ctl, grid, clock)
    }

    #[test]
    fn non_c4_mount_ignored() {
        let mut ctl = PresetController::new();
        let mut dev = SimulatedC4::new();
        dev.identity_mut().product_id = 0x1234;
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        let id = dev.identity();
        assert!(!ctl.on_mount(id, &mut dev, &mut grid, &clock).unwrap());
        assert!(!ctl.is_mounted());
        assert!(dev.sent.is_empty());
        assert_eq!(grid.write_count(), 0);
    }

    #[test]
    fn mount_sets_status_and_requests_slot_zero() {
        let mut ctl = PresetController::new();
        let mut dev = SimulatedC4::new();
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        let id = dev.identity();
        ctl.on_mount(id, &mut dev, &mut grid, &clock).unwrap();
        assert_eq!(grid.text_at(1, 17, 3), " OK");
        assert_eq!(dev.sent, vec![vec![0x36, 0x08, 0x00, 0xA0]]);
        assert_eq!(clock.total_delay_ms(), 25);
    }

    #[test]
    fn full_discovery_visits_every_slot_once() {
        let mut dev = SimulatedC4::with_presets(&[(0, "A"), (64, "M"), (127, "Z")]);
        let (ctl, grid, clock) = mounted(&mut dev);
        assert!(ctl.discovery_complete());
        assert_eq!(dev.read_requests(), SLOT_COUNT);
        assert_eq!(clock.delays.borrow().len(), SLOT_COUNT);
        assert!(clock.delays.borrow().iter().all(|&d| d == 25));
        assert_eq!(ctl.catalog().count(), 3);
        assert_eq!(grid.text_at(4, 0, 3), "003");
        assert_eq!(grid.text_at(2, 8, 3), "001");
        assert_eq!(ctl.navigation().last_displayed(), Some(0));
    }

    #[test]
    fn empty_bank_shows_unavailable() {
        let mut dev = SimulatedC4::new();
        let (ctl, grid, _) = mounted(&mut dev);
        assert!(ctl.discovery_complete());
        assert!(ctl.catalog().is_empty());
        assert_eq!(grid.text_at(2, 8, 3), "N/A");
        assert_eq!(grid.text_at(4, 0, 3), "000");
        assert_eq!(ctl.navigation().last_displayed(), None);
    }

    #[test]
    fn poll_inert_during_discovery() {
        let mut ctl = PresetController::new();
        let mut dev = SimulatedC4::with_presets(&[(0, "A")]);
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        let id = dev.identity();
        ctl.on_mount(id, &mut dev, &mut grid, &clock).unwrap();
        grid.reset_write_count();
        let sent = dev.sent.len();
        let out = ctl
            .poll(InputEvents::press(), &mut dev, &mut grid)
            .unwrap();
        assert_eq!(out, PollOutcome::default());
        assert_eq!(dev.sent.len(), sent);
        assert_eq!(grid.write_count(), 0);
    }

    #[test]
    fn poll_inert_without_device() {
        let mut ctl = PresetController::new();
        let mut dev = SimulatedC4::new();
        let mut grid = TextGrid::new();
        let out = ctl
            .poll(InputEvents::turn(Direction::Clockwise), &mut dev, &mut grid)
            .unwrap();
        assert_eq!(out, PollOutcome::default());
    }

    #[test]
    fn unmount_resets_without_program_change() {
        let mut dev = SimulatedC4::with_presets(&[(0, "A"), (1, "B")]);
        let (mut ctl, mut grid, _) = mounted(&mut dev);
        ctl.poll(InputEvents::press(), &mut dev, &mut grid).unwrap();
        let sent = dev.sent.len();

        assert!(ctl.on_unmount(dev.identity(), &mut grid));
        assert!(!ctl.is_mounted());
        assert!(ctl.catalog().is_empty());
        assert_eq!(ctl.navigation().selected(), None);
        assert_eq!(dev.sent.len(), sent);
        assert_eq!(grid.text_at(1, 17, 3), "NOK");
        assert_eq!(grid.text_at(4, 0, 3), "N/A");
    }

    #[test]
    fn unmount_of_other_device_ignored() {
        let mut dev = SimulatedC4::with_presets(&[(0, "A")]);
        let (mut ctl, mut grid, _) = mounted(&mut dev);
        let other = DeviceIdentity {
            address: 9,
            instance: 0,
            vendor_id: C4_VID,
            product_id: C4_PID,
        };
        assert!(!ctl.on_unmount(other, &mut grid));
        assert!(ctl.is_mounted());
        assert_eq!(ctl.catalog().count(), 1);
    }

    #[test]
    fn second_c4_ignored_while_mounted() {
        let mut dev = SimulatedC4::with_presets(&[(0, "A")]);
        let (mut ctl, mut grid, clock) = mounted(&mut dev);
        let mut second = SimulatedC4::new();
        second.identity_mut().address = 2;
        let id = second.identity();
        assert!(!ctl.on_mount(id, &mut second, &mut grid, &clock).unwrap());
        assert!(second.sent.is_empty());
        assert_eq!(ctl.mounted(), Some(dev.identity()));
    }

    #[test]
    fn report_from_other_device_ignored() {
        let mut ctl = PresetController::new();
        let mut dev = SimulatedC4::with_presets(&[(0, "A")]);
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        let id = dev.identity();
        ctl.on_mount(id, &mut dev, &mut grid, &clock).unwrap();
        let report = dev.receive_report(Duration::ZERO).unwrap().unwrap();
        let foreign = DeviceIdentity { address: 7, ..id };
        let disposition = ctl
            .on_report(foreign, &report, &mut dev, &mut grid, &clock)
            .unwrap();
        assert_eq!(disposition, ReportDisposition::Ignored);
        assert_eq!(ctl.discovery().next_slot(), 0);
    }

    #[test]
    fn remount_mid_discovery_restarts_at_slot_zero() {
        let mut ctl = PresetController::new();
        let mut dev = SimulatedC4::with_presets(&[(0, "A"), (5, "F")]);
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        let id = dev.identity();
        ctl.on_mount(id, &mut dev, &mut grid, &clock).unwrap();
        for _ in 0..10 {
            let r = dev.receive_report(Duration::ZERO).unwrap().unwrap();
            ctl.on_report(id, &r, &mut dev, &mut grid, &clock).unwrap();
        }
        assert_eq!(ctl.discovery().next_slot(), 10);
        ctl.on_unmount(id, &mut grid);
        while dev.receive_report(Duration::ZERO).unwrap().is_some() {}

        dev.sent.clear();
        ctl.on_mount(id, &mut dev, &mut grid, &clock).unwrap();
        assert_eq!(dev.sent[0], vec![0x36, 0x08, 0x00, 0xA0]);
        pump(&mut ctl, &mut dev, &mut grid, &clock);
        assert_eq!(ctl.catalog().count(), 2);
    }

    #[test]
    fn send_failure_during_mount_propagates() {
        let mut ctl = PresetController::new();
        let mut dev = SimulatedC4::new();
        dev.fail_sends = true;
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        let id = dev.identity();
        assert!(ctl.on_mount(id, &mut dev, &mut grid, &clock).is_err());
        assert!(ctl.is_mounted());
        assert!(!ctl.discovery().in_flight());
    }

    #[test]
    fn custom_settings_apply() {
        let mut ctl = PresetController::with_settings(5, 8);
        let mut dev = SimulatedC4::with_presets(&[(0, "A Very Long Name")]);
        let mut grid = TextGrid::new();
        let clock = ManualClock::new();
        let id = dev.identity();
        ctl.on_mount(id, &mut dev, &mut grid, &clock).unwrap();
        pump(&mut ctl, &mut dev, &mut grid, &clock);
        assert!(clock.delays.borrow().iter().all(|&d| d == 5));
        assert_eq!(grid.line(3).trim_end(), "A Very L");
    }

    #[test]
    fn name_width_is_clamped() {
        let ctl = PresetController::with_settings(25, 99);
        assert_eq!(ctl.name_width, 20);
        let ctl = PresetController::with_settings(25, 0);
        assert_eq!(ctl.name_width, 1);
    }
}
