//! Application configuration: TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::display::COLUMNS;
use crate::protocol::SETTLE_DELAY_MS;

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# c4preset configuration. Changes made outside the tool may be overwritten.\n\n";

/// Keys accepted by [`Config::set`].
pub const KEYS: &[&str] = &[
    "device_serial",
    "settle_delay_ms",
    "poll_interval_ms",
    "stall_timeout_ms",
    "name_width",
];

/// Upper bound for `settle_delay_ms` and `poll_interval_ms`.
pub const MAX_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Preferred device serial number. Empty = auto-select first device.
    #[serde(default)]
    pub device_serial: String,

    /// Pause before each discovery request. Default: 25 ms.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Encoder poll period in `browse`. Default: 10 ms.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up on a discovery response after this long. Default: 2000 ms.
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    /// Characters of the preset name shown on line 3. Default: 20.
    #[serde(default = "default_name_width")]
    pub name_width: usize,
}

fn default_settle_delay_ms() -> u64 {
    SETTLE_DELAY_MS
}
fn default_poll_interval_ms() -> u64 {
    10
}
fn default_stall_timeout_ms() -> u64 {
    2000
}
fn default_name_width() -> usize {
    COLUMNS as usize
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_serial: String::new(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            stall_timeout_ms: default_stall_timeout_ms(),
            name_width: default_name_width(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    SettleDelayTooLong(u64),
    PollIntervalOutOfRange(u64),
    /// The stall timeout is shorter than the settling delay it must cover.
    StallTimeoutTooShort { stall_timeout_ms: u64, settle_delay_ms: u64 },
    NameWidthOutOfRange(usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::SettleDelayTooLong(v) => {
                write!(f, "settle_delay_ms {v} exceeds {MAX_DELAY_MS}")
            }
            ValidationError::PollIntervalOutOfRange(v) => {
                write!(f, "poll_interval_ms {v} must be 1-{MAX_DELAY_MS}")
            }
            ValidationError::StallTimeoutTooShort {
                stall_timeout_ms,
                settle_delay_ms,
            } => write!(
                f,
                "stall_timeout_ms {stall_timeout_ms} is shorter than settle_delay_ms {settle_delay_ms}"
            ),
            ValidationError::NameWidthOutOfRange(v) => {
                write!(f, "name_width {v} must be 1-{COLUMNS}")
            }
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("c4preset"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Save config to an arbitrary path atomically (write to temp file, then rename).
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // rename fails across filesystems
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Save config to the default platform path.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Set one field from its text form, as given to `config --set`.
    ///
    /// Only parses; range checks are left to [`validate`](Self::validate).
    pub fn set(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        let key = key.trim();
        let value = value.trim();
        let invalid =
            |e: std::num::ParseIntError| crate::C4Error::Config(format!("{key}: {e} ('{value}')"));
        match key {
            "device_serial" => self.device_serial = value.to_string(),
            "settle_delay_ms" => self.settle_delay_ms = value.parse().map_err(invalid)?,
            "poll_interval_ms" => self.poll_interval_ms = value.parse().map_err(invalid)?,
            "stall_timeout_ms" => self.stall_timeout_ms = value.parse().map_err(invalid)?,
            "name_width" => self.name_width = value.parse().map_err(invalid)?,
            other => {
                return Err(crate::C4Error::Config(format!(
                    "unknown setting '{other}' (expected one of: {})",
                    KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.settle_delay_ms > MAX_DELAY_MS {
            errors.push(ValidationError::SettleDelayTooLong(self.settle_delay_ms));
        }
        if !(1..=MAX_DELAY_MS).contains(&self.poll_interval_ms) {
            errors.push(ValidationError::PollIntervalOutOfRange(
                self.poll_interval_ms,
            ));
        }
        if self.stall_timeout_ms < self.settle_delay_ms {
            errors.push(ValidationError::StallTimeoutTooShort {
                stall_timeout_ms: self.stall_timeout_ms,
                settle_delay_ms: self.settle_delay_ms,
            });
        }
        if !(1..=COLUMNS as usize).contains(&self.name_width) {
            errors.push(ValidationError::NameWidthOutOfRange(self.name_width));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Like [`validate`](Self::validate), folded into a single [`C4Error::Config`](crate::C4Error::Config).
    pub fn check(&self) -> crate::error::Result<()> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            crate::C4Error::Config(msgs.join("; "))
        })
    }
}
