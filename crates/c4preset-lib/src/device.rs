//! HID transport: trait, Linux `nusb` backend, stub backend and simulator.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

use serde::Serialize;

use crate::protocol::is_c4_synth;

// ── Error type ──

/// Device communication errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the step (e.g. `"USB open"`, `"interrupt OUT"`).
#[derive(Debug)]
pub enum DeviceError {
    NotFound,
    OpenFailed(String),
    TransferFailed(String),
    Disconnected,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound => write!(f, "C4 Synth not found"),
            DeviceError::OpenFailed(e) => write!(f, "Failed to open device: {e}"),
            DeviceError::TransferFailed(e) => write!(f, "Transfer failed: {e}"),
            DeviceError::Disconnected => write!(f, "Device disconnected"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Identity ──

/// Which HID device a mount, unmount or report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Bus-assigned device address.
    pub address: u8,
    /// HID interface instance on that device.
    pub instance: u8,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub fn is_c4_synth(&self) -> bool {
        is_c4_synth(self.vendor_id, self.product_id)
    }

    /// Same physical interface (address and instance).
    pub fn same_interface(&self, other: &DeviceIdentity) -> bool {
        self.address == other.address && self.instance == other.instance
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub product: String,
    pub serial: Option<String>,
    pub identity: DeviceIdentity,
}

// ── Trait ──

/// Fixed-size report exchange with one HID interface.
pub trait HidTransport {
    fn info(&self) -> &DeviceInfo;

    fn identity(&self) -> DeviceIdentity {
        self.info().identity
    }

    /// Send one output report.
    fn send_report(&mut self, report: &[u8]) -> Result<()>;

    /// Make sure the next input report will be picked up.
    /// Backends that keep a receive permanently queued need not override this.
    fn arm_receive(&mut self) -> Result<()> {
        Ok(())
    }

    /// Wait up to `timeout` for one input report. `Ok(None)` on timeout.
    fn receive_report(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

// ── Input report reader ──

/// Result of one non-blocking look at the interrupt IN endpoint.
#[derive(Debug)]
pub(crate) enum InStep {
    Report(Vec<u8>),
    Pending,
    Lost,
    Failed(String),
}

pub(crate) type ReportResult = std::result::Result<Vec<u8>, DeviceError>;

/// Sleep between empty looks at the endpoint.
const READ_IDLE: Duration = Duration::from_millis(2);

/// Ceiling for the pause after consecutive IN errors.
const MAX_ERROR_BACKOFF: Duration = Duration::from_millis(250);

/// Pause after the `failures`-th consecutive IN error.
fn error_backoff(failures: u32) -> Duration {
    (READ_IDLE * 2u32.saturating_pow(failures.min(16))).min(MAX_ERROR_BACKOFF)
}

/// Forward reports produced by `next` until `stop` is raised, the device is
/// lost or the receiving side is dropped.
///
/// `stop` is checked between every step, so the owner can end the loop
/// within one idle or backoff period and release the interface.
pub(crate) fn run_reader(
    stop: &AtomicBool,
    tx: &Sender<ReportResult>,
    mut next: impl FnMut() -> InStep,
) {
    let mut failures = 0u32;
    while !stop.load(Ordering::Acquire) {
        match next() {
            InStep::Report(data) => {
                failures = 0;
                if tx.send(Ok(data)).is_err() {
                    break;
                }
            }
            InStep::Pending => std::thread::sleep(READ_IDLE),
            InStep::Lost => {
                let _ = tx.send(Err(DeviceError::Disconnected));
                break;
            }
            InStep::Failed(e) => {
                failures = failures.saturating_add(1);
                let wait = error_backoff(failures);
                log::debug!("interrupt IN: {e} (retry in {} ms)", wait.as_millis());
                std::thread::sleep(wait);
            }
        }
    }
}

// ── Linux implementation ──

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
    use std::thread::JoinHandle;

    use nusb::transfer::{
        Control, ControlType, Direction as UsbDirection, EndpointType, Recipient, RequestBuffer,
        TransferError,
    };

    use crate::protocol::REPORT_BUFFER_LEN;

    /// USB interface class for HID.
    const HID_CLASS: u8 = 3;

    /// HID class request SET_REPORT.
    const HID_SET_REPORT: u8 = 0x09;

    /// wValue for SET_REPORT: report type Output (2), report ID 0.
    const HID_OUTPUT_REPORT: u16 = 0x0200;

    const CONTROL_TIMEOUT_MS: u64 = 1000;

    /// Reports queued on the interrupt IN endpoint at any time.
    const IN_FLIGHT: usize = 2;

    pub struct LinuxHidDevice {
        interface: nusb::Interface,
        info: DeviceInfo,
        out_endpoint: Option<u8>,
        reports: Receiver<ReportResult>,
        stop: Arc<AtomicBool>,
        reader: Option<JoinHandle<()>>,
    }

    impl LinuxHidDevice {
        /// Open the first C4 Synth, or the one whose serial matches.
        pub fn open_matching(serial: Option<&str>) -> Result<Self> {
            let device_info = nusb::list_devices()
                .map_err(|e| DeviceError::OpenFailed(format!("USB enumeration: {e}")))?
                .filter(|dev| is_c4_synth(dev.vendor_id(), dev.product_id()))
                .find(|dev| match serial {
                    None => true,
                    Some(want) => dev
                        .serial_number()
                        .is_some_and(|s| s.eq_ignore_ascii_case(want)),
                })
                .ok_or(DeviceError::NotFound)?;

            let iface_num = device_info
                .interfaces()
                .find(|iface| iface.class() == HID_CLASS)
                .map(|iface| iface.interface_number())
                .ok_or_else(|| DeviceError::OpenFailed("no HID interface".into()))?;

            let info = DeviceInfo {
                path: format!(
                    "usb:{:03}/{:03}",
                    device_info.bus_number(),
                    device_info.device_address()
                ),
                product: device_info.product_string().unwrap_or_default().to_string(),
                serial: device_info.serial_number().map(|s| s.to_string()),
                identity: DeviceIdentity {
                    address: device_info.device_address(),
                    instance: iface_num,
                    vendor_id: device_info.vendor_id(),
                    product_id: device_info.product_id(),
                },
            };

            let usb_device = device_info
                .open()
                .map_err(|e| DeviceError::OpenFailed(format!("USB open: {e}")))?;

            let (in_endpoint, out_endpoint) = find_interrupt_endpoints(&usb_device, iface_num)?;

            // usbhid owns the interface until we detach it
            let interface = usb_device
                .detach_and_claim_interface(iface_num)
                .map_err(|e| {
                    DeviceError::OpenFailed(format!("claim interface {iface_num}: {e}"))
                })?;

            log::debug!(
                "opened {} (interface {iface_num}, IN 0x{in_endpoint:02X}, OUT {})",
                info.path,
                out_endpoint.map_or("control".to_string(), |ep| format!("0x{ep:02X}"))
            );

            let stop = Arc::new(AtomicBool::new(false));
            let (reports, reader) =
                spawn_reader(interface.clone(), in_endpoint, Arc::clone(&stop));

            Ok(LinuxHidDevice {
                interface,
                info,
                out_endpoint,
                reports,
                stop,
                reader: Some(reader),
            })
        }
    }

    impl Drop for LinuxHidDevice {
        /// Stop the reader and wait for it, so its interface handle is gone
        /// before anyone tries to claim the interface again.
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Release);
            if let Some(reader) = self.reader.take()
                && reader.join().is_err()
            {
                log::warn!("{}: report reader panicked", self.info.path);
            }
        }
    }

    /// Locate the interrupt IN endpoint (required) and OUT endpoint
    /// (optional; HID falls back to SET_REPORT on the control pipe).
    fn find_interrupt_endpoints(device: &nusb::Device, iface_num: u8) -> Result<(u8, Option<u8>)> {
        let config = device
            .active_configuration()
            .map_err(|e| DeviceError::OpenFailed(format!("active configuration: {e}")))?;
        let alt = config
            .interface_alt_settings()
            .find(|alt| alt.interface_number() == iface_num && alt.alternate_setting() == 0)
            .ok_or_else(|| {
                DeviceError::OpenFailed(format!("no descriptor for interface {iface_num}"))
            })?;

        let mut in_ep = None;
        let mut out_ep = None;
        for ep in alt.endpoints() {
            if ep.transfer_type() != EndpointType::Interrupt {
                continue;
            }
            match ep.direction() {
                UsbDirection::In => {
                    in_ep.get_or_insert(ep.address());
                }
                UsbDirection::Out => {
                    out_ep.get_or_insert(ep.address());
                }
            }
        }
        let in_ep = in_ep
            .ok_or_else(|| DeviceError::OpenFailed("no interrupt IN endpoint".into()))?;
        Ok((in_ep, out_ep))
    }

    /// Keep the interrupt IN endpoint armed on a dedicated thread and forward
    /// every completed report. Dropping the queue on exit cancels whatever is
    /// still submitted.
    fn spawn_reader(
        interface: nusb::Interface,
        endpoint: u8,
        stop: Arc<AtomicBool>,
    ) -> (Receiver<ReportResult>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut queue = interface.interrupt_in_queue(endpoint);
            run_reader(&stop, &tx, || {
                while queue.pending() < IN_FLIGHT {
                    queue.submit(RequestBuffer::new(REPORT_BUFFER_LEN));
                }
                let polled = futures_lite::future::block_on(futures_lite::future::poll_once(
                    queue.next_complete(),
                ));
                match polled {
                    None => InStep::Pending,
                    Some(completion) => match completion.status {
                        Ok(()) => InStep::Report(completion.data),
                        Err(TransferError::Disconnected | TransferError::Cancelled) => {
                            InStep::Lost
                        }
                        Err(e) => InStep::Failed(format!("0x{endpoint:02X}: {e}")),
                    },
                }
            });
        });
        (rx, handle)
    }

    fn map_transfer_error(context: &str, e: TransferError) -> DeviceError {
        match e {
            TransferError::Disconnected => DeviceError::Disconnected,
            e => DeviceError::TransferFailed(format!("{context}: {e}")),
        }
    }

    impl HidTransport for LinuxHidDevice {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn send_report(&mut self, report: &[u8]) -> Result<()> {
            match self.out_endpoint {
                Some(ep) => {
                    let completion = futures_lite::future::block_on(
                        self.interface.interrupt_out(ep, report.to_vec()),
                    );
                    completion
                        .status
                        .map_err(|e| map_transfer_error("interrupt OUT", e))
                }
                None => {
                    let control = Control {
                        control_type: ControlType::Class,
                        recipient: Recipient::Interface,
                        request: HID_SET_REPORT,
                        value: HID_OUTPUT_REPORT,
                        index: self.info.identity.instance as u16,
                    };
                    self.interface
                        .control_out_blocking(
                            control,
                            report,
                            Duration::from_millis(CONTROL_TIMEOUT_MS),
                        )
                        .map(|_| ())
                        .map_err(|e| map_transfer_error("SET_REPORT", e))
                }
            }
        }

        fn receive_report(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
            match self.reports.recv_timeout(timeout) {
                Ok(Ok(report)) => Ok(Some(report)),
                Ok(Err(e)) => Err(e),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(DeviceError::Disconnected),
            }
        }
    }

    pub(super) fn enumerate() -> Vec<DiscoveredDevice> {
        let Ok(devices) = nusb::list_devices() else {
            return Vec::new();
        };

        devices
            .filter(|dev| is_c4_synth(dev.vendor_id(), dev.product_id()))
            .map(|dev| DiscoveredDevice {
                path: format!(
                    "usb:{:03}/{:03} [{:04x}:{:04x}]",
                    dev.bus_number(),
                    dev.device_address(),
                    dev.vendor_id(),
                    dev.product_id(),
                ),
                product: dev.product_string().map(|s| s.to_string()),
                serial: dev.serial_number().map(|s| s.to_string()),
            })
            .collect()
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::LinuxHidDevice;

// ── Stub device for unsupported platforms ──

/// Placeholder device that can never be opened.
/// Keeps the crate building and testable on hosts without a backend.
#[cfg(not(target_os = "linux"))]
pub struct StubDevice {
    info: DeviceInfo,
}

#[cfg(not(target_os = "linux"))]
impl StubDevice {
    pub fn open_matching(_serial: Option<&str>) -> Result<Self> {
        Err(DeviceError::NotFound)
    }
}

#[cfg(not(target_os = "linux"))]
impl HidTransport for StubDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }
    fn send_report(&mut self, _report: &[u8]) -> Result<()> {
        Err(DeviceError::Disconnected)
    }
    fn receive_report(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        Err(DeviceError::Disconnected)
    }
}

// ── Enumeration ──

/// A matching device found on the bus (not opened).
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    pub path: String,
    pub product: Option<String>,
    pub serial: Option<String>,
}

/// List connected C4 Synth pedals. Empty on unsupported platforms.
pub fn enumerate_devices() -> Vec<DiscoveredDevice> {
    #[cfg(target_os = "linux")]
    {
        linux_impl::enumerate()
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

/// Concrete device type for the current platform.
#[cfg(target_os = "linux")]
pub type PlatformDevice = LinuxHidDevice;
#[cfg(not(target_os = "linux"))]
pub type PlatformDevice = StubDevice;

/// Open the first connected C4 Synth.
pub fn open_device() -> Result<PlatformDevice> {
    PlatformDevice::open_matching(None)
}

/// Open the C4 Synth with the given serial number.
///
/// An empty `serial` selects the first device.
pub fn open_device_by_serial(serial: &str) -> Result<PlatformDevice> {
    let serial = serial.trim();
    if serial.is_empty() {
        return open_device();
    }
    match PlatformDevice::open_matching(Some(serial)) {
        Err(DeviceError::NotFound) => {
            let devices = enumerate_devices();
            if devices.is_empty() {
                return Err(DeviceError::NotFound);
            }
            let available: Vec<String> = devices
                .iter()
                .map(|d| d.serial.as_deref().unwrap_or("(no serial)").to_string())
                .collect();
            Err(DeviceError::OpenFailed(format!(
                "no device with serial '{serial}' found (available: {})",
                available.join(", ")
            )))
        }
        other => other,
    }
}

// ── Simulated device ──

/// In-memory C4 Synth for tests and the CLI `--simulate` mode.
///
/// Answers memory reads from a slot table and records every report sent.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    use crate::address::{AddressTable, SlotAddress};
    use crate::catalog::PresetName;
    use crate::protocol::{
        C4_PID, C4_VID, EMPTY_SENTINEL, NAME_LEN, OP_PROGRAM_CHANGE, OP_READ, READ_RESPONSE_LEN,
        REPORT_BUFFER_LEN, SLOT_COUNT,
    };

    pub struct SimulatedC4 {
        info: DeviceInfo,
        slots: [Option<PresetName>; SLOT_COUNT],
        table: AddressTable,
        pending: VecDeque<Vec<u8>>,
        /// Every report passed to `send_report`, in order.
        pub sent: Vec<Vec<u8>>,
        /// Slots requested via program change, in order.
        pub program_changes: Vec<u8>,
        /// Number of `arm_receive` calls.
        pub arms: usize,
        /// Stop answering reads after this many have been answered.
        pub answer_limit: Option<usize>,
        /// If true, `send_report` fails.
        pub fail_sends: bool,
        /// Answer with full 64-byte buffers instead of 33-byte reports.
        pub pad_responses: bool,
        answered: usize,
    }

    impl Default for SimulatedC4 {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SimulatedC4 {
        /// A pedal with every slot erased.
        pub fn new() -> Self {
            SimulatedC4 {
                info: DeviceInfo {
                    path: "sim://c4-synth".into(),
                    product: "C4 Synth (simulated)".into(),
                    serial: Some("SIM0001".into()),
                    identity: DeviceIdentity {
                        address: 1,
                        instance: 0,
                        vendor_id: C4_VID,
                        product_id: C4_PID,
                    },
                },
                slots: [None; SLOT_COUNT],
                table: AddressTable::new(),
                pending: VecDeque::new(),
                sent: Vec::new(),
                program_changes: Vec::new(),
                arms: 0,
                answer_limit: None,
                fail_sends: false,
                pad_responses: false,
                answered: 0,
            }
        }

        /// A pedal holding the given `(slot, name)` presets.
        pub fn with_presets(presets: &[(u8, &str)]) -> Self {
            let mut dev = Self::new();
            for &(slot, name) in presets {
                dev.set_slot(slot, name);
            }
            dev
        }

        /// The bank used by `--simulate`.
        pub fn demo() -> Self {
            Self::with_presets(&[
                (0, "Init Synth"),
                (1, "Octave Fuzz Lead"),
                (3, "Squelch Bass"),
                (4, "Poly Pad Swell Long Release"),
                (9, "Ring Mod Chaos"),
                (17, "Filter Sweep Env"),
                (42, "Sub Octave Drone"),
                (127, "Last Slot Standby"),
            ])
        }

        pub fn set_slot(&mut self, slot: u8, name: &str) {
            if let Some(s) = self.slots.get_mut(slot as usize) {
                *s = Some(PresetName::from_text(name));
            }
        }

        pub fn set_slot_bytes(&mut self, slot: u8, bytes: [u8; NAME_LEN]) {
            if let Some(s) = self.slots.get_mut(slot as usize) {
                *s = Some(PresetName::from_bytes(bytes));
            }
        }

        pub fn clear_slot(&mut self, slot: u8) {
            if let Some(s) = self.slots.get_mut(slot as usize) {
                *s = None;
            }
        }

        pub fn identity_mut(&mut self) -> &mut DeviceIdentity {
            &mut self.info.identity
        }

        /// Queue an arbitrary input report ahead of any answers.
        pub fn inject_report(&mut self, report: Vec<u8>) {
            self.pending.push_front(report);
        }

        /// Number of reads sent so far.
        pub fn read_requests(&self) -> usize {
            self.sent.iter().filter(|r| r.first() == Some(&OP_READ)).count()
        }

        /// Reports waiting to be received.
        pub fn pending_reports(&self) -> usize {
            self.pending.len()
        }

        fn answer_read(&mut self, addr: SlotAddress) {
            if self.answer_limit.is_some_and(|limit| self.answered >= limit) {
                return;
            }
            self.answered += 1;
            let name = self
                .table
                .slot_of(addr)
                .and_then(|slot| self.slots[slot])
                .map(|n| *n.as_bytes())
                .unwrap_or([EMPTY_SENTINEL; NAME_LEN]);
            let len = if self.pad_responses {
                REPORT_BUFFER_LEN
            } else {
                READ_RESPONSE_LEN
            };
            let mut report = vec![0u8; len];
            report[0] = OP_READ;
            report[1..READ_RESPONSE_LEN].copy_from_slice(&name);
            self.pending.push_back(report);
        }
    }

    impl HidTransport for SimulatedC4 {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn send_report(&mut self, report: &[u8]) -> Result<()> {
            if self.fail_sends {
                return Err(DeviceError::TransferFailed(
                    "simulated: send failure injected".into(),
                ));
            }
            self.sent.push(report.to_vec());
            match report {
                [OP_READ, b2, b1, b0, ..] => {
                    self.answer_read(SlotAddress::from_bytes([*b2, *b1, *b0]))
                }
                [OP_PROGRAM_CHANGE, slot, ..] => self.program_changes.push(*slot),
                _ => {}
            }
            Ok(())
        }

        fn arm_receive(&mut self) -> Result<()> {
            self.arms += 1;
            Ok(())
        }

        fn receive_report(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
            Ok(self.pending.pop_front())
        }
    }
}
