//! Unified error type for the c4preset-lib crate.
//!
//! [`C4Error`] wraps [`DeviceError`] and I/O errors and adds the host-level
//! failure kinds. `From` impls let `?` propagate across module boundaries.

use std::fmt;

use crate::device::DeviceError;

#[derive(Debug)]
pub enum C4Error {
    /// Device communication error (open, transfer, disconnect).
    Device(DeviceError),
    /// Standard I/O error (config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
    /// No discovery response arrived for `slot` within the stall timeout.
    Stalled { slot: usize },
    /// Preset number outside 1..=128.
    InvalidPreset(u16),
}

impl fmt::Display for C4Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            C4Error::Device(e) => write!(f, "{e}"),
            C4Error::Io(e) => write!(f, "I/O error: {e}"),
            C4Error::Config(e) => write!(f, "Config error: {e}"),
            C4Error::Stalled { slot } => {
                write!(f, "Discovery stalled: no response for slot {slot} (replug the pedal)")
            }
            C4Error::InvalidPreset(n) => {
                write!(f, "Invalid preset number {n} (expected 1-128)")
            }
        }
    }
}

impl std::error::Error for C4Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            C4Error::Device(e) => Some(e),
            C4Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for C4Error {
    fn from(e: DeviceError) -> Self {
        C4Error::Device(e)
    }
}

impl From<std::io::Error> for C4Error {
    fn from(e: std::io::Error) -> Self {
        C4Error::Io(e)
    }
}

/// Crate-level Result alias using [`C4Error`].
pub type Result<T> = std::result::Result<T, C4Error>;
