//! Host loop helpers: blocking discovery, report pumping, direct selection.

use std::time::Duration;

use crate::clock::Clock;
use crate::controller::{PresetController, ReportDisposition};
use crate::device::{self, DeviceError, HidTransport};
use crate::display::CharDisplay;
use crate::error::{C4Error, Result};
use crate::protocol::{SLOT_COUNT, program_change};

/// Mount `transport` and feed its reports to the controller until every
/// slot has been read.
///
/// Fails with [`C4Error::Stalled`] when no response to the pending request
/// arrives within `stall_timeout`. Reports the controller ignores do not
/// extend the deadline.
pub fn discover<T: HidTransport>(
    controller: &mut PresetController,
    transport: &mut T,
    display: &mut impl CharDisplay,
    clock: &impl Clock,
    stall_timeout: Duration,
) -> Result<()> {
    let identity = transport.identity();
    if !controller.on_mount(identity, transport, display, clock)? {
        return Err(DeviceError::OpenFailed(format!(
            "{}: not a usable C4 Synth",
            transport.info().path
        ))
        .into());
    }

    let stall_ms = stall_timeout.as_millis() as u64;
    let mut last_progress = clock.now_ms();
    while !controller.discovery_complete() {
        let elapsed = clock.now_ms().saturating_sub(last_progress);
        let stalled = C4Error::Stalled {
            slot: controller.discovery().next_slot(),
        };
        if elapsed >= stall_ms {
            return Err(stalled);
        }
        let wait = Duration::from_millis(stall_ms - elapsed);
        let Some(report) = transport.receive_report(wait)? else {
            return Err(stalled);
        };
        match controller.on_report(identity, &report, transport, display, clock)? {
            ReportDisposition::Ignored => {}
            ReportDisposition::Accepted | ReportDisposition::Completed => {
                last_progress = clock.now_ms();
            }
        }
    }
    Ok(())
}

/// Hand every available report to the controller.
///
/// Waits up to `timeout` for the first one, then drains the rest without
/// blocking. Returns how many reports were handled.
pub fn pump_reports<T: HidTransport>(
    controller: &mut PresetController,
    transport: &mut T,
    display: &mut impl CharDisplay,
    clock: &impl Clock,
    timeout: Duration,
) -> device::Result<usize> {
    let identity = transport.identity();
    let mut handled = 0;
    let mut wait = timeout;
    while let Some(report) = transport.receive_report(wait)? {
        controller.on_report(identity, &report, transport, display, clock)?;
        handled += 1;
        wait = Duration::ZERO;
    }
    Ok(handled)
}

/// Device slot for a 1-based preset number.
pub fn slot_for_preset(preset_number: u16) -> Result<u8> {
    if preset_number == 0 || preset_number as usize > SLOT_COUNT {
        return Err(C4Error::InvalidPreset(preset_number));
    }
    Ok((preset_number - 1) as u8)
}

/// Load a preset by its 1-based number without running discovery.
///
/// Returns the 0-based slot that was sent.
pub fn select_preset(transport: &mut impl HidTransport, preset_number: u16) -> Result<u8> {
    let slot = slot_for_preset(preset_number)?;
    let report = program_change(slot).ok_or(C4Error::InvalidPreset(preset_number))?;
    transport.send_report(&report)?;
    log::info!("program change: preset {preset_number:03} (slot {slot})");
    Ok(slot)
}
