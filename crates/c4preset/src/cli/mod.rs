//! CLI subcommands: device listing, preset discovery, selection, browsing.

mod browse;
mod config_cmd;
mod devices;
mod list;
mod select;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use c4preset_lib::C4Error;
pub(super) use c4preset_lib::clock::SystemClock;
pub(super) use c4preset_lib::config::Config;
pub(super) use c4preset_lib::controller::PresetController;
pub(super) use c4preset_lib::device::{
    self, DeviceInfo, DiscoveredDevice, HidTransport, PlatformDevice,
};
pub(super) use c4preset_lib::display::TextGrid;
pub(super) use c4preset_lib::error::Result;
pub(super) use c4preset_lib::session;

use c4preset_lib::device::mock::SimulatedC4;

/// Flags shared by every subcommand.
pub struct Options {
    pub json: bool,
    pub config_path: Option<PathBuf>,
    pub simulate: bool,
}

const PADDING: usize = 2;

/// Alignment width for key-value output: the longest key plus padding,
/// with indented keys aligned to the same value column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{key:<width$}{value}", width = w);
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{text}");
    Ok(())
}

/// Config file in effect: `--config` if given, else the platform default.
pub(super) fn config_path(opts: &Options) -> Option<PathBuf> {
    opts.config_path.clone().or_else(Config::path)
}

pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    let Some(path) = custom_path else {
        return Config::load();
    };
    let (config, warnings) = Config::load_from(path);
    for w in &warnings {
        log::warn!("{w}");
    }
    config
}

/// Load the config and reject values the device loop cannot run with.
pub(super) fn load_checked_config(opts: &Options) -> Result<Config> {
    let config = load_config(opts.config_path.as_deref());
    config.check()?;
    Ok(config)
}

pub(super) fn stall_timeout(config: &Config) -> Duration {
    Duration::from_millis(config.stall_timeout_ms)
}

pub(super) fn controller_for(config: &Config) -> PresetController {
    PresetController::with_settings(config.settle_delay_ms, config.name_width)
}

// ── Transport selection ──

/// Real pedal or the built-in simulator, behind one transport.
pub(super) enum Transport {
    Usb(PlatformDevice),
    Simulated(Box<SimulatedC4>),
}

impl Transport {
    pub(super) fn is_simulated(&self) -> bool {
        matches!(self, Transport::Simulated(_))
    }
}

impl HidTransport for Transport {
    fn info(&self) -> &DeviceInfo {
        match self {
            Transport::Usb(d) => d.info(),
            Transport::Simulated(d) => d.info(),
        }
    }

    fn send_report(&mut self, report: &[u8]) -> device::Result<()> {
        match self {
            Transport::Usb(d) => d.send_report(report),
            Transport::Simulated(d) => d.send_report(report),
        }
    }

    fn arm_receive(&mut self) -> device::Result<()> {
        match self {
            Transport::Usb(d) => d.arm_receive(),
            Transport::Simulated(d) => d.arm_receive(),
        }
    }

    fn receive_report(&mut self, timeout: Duration) -> device::Result<Option<Vec<u8>>> {
        match self {
            Transport::Usb(d) => d.receive_report(timeout),
            Transport::Simulated(d) => d.receive_report(timeout),
        }
    }
}

pub(super) fn open_transport(opts: &Options, config: &Config) -> Result<Transport> {
    if opts.simulate {
        return Ok(Transport::Simulated(Box::new(SimulatedC4::demo())));
    }
    let dev = device::open_device_by_serial(&config.device_serial)?;
    log::info!("opened {}", dev.info().path);
    Ok(Transport::Usb(dev))
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredDevice>,
}

#[derive(Serialize)]
pub(super) struct PresetJson {
    pub preset: u16,
    pub slot: u8,
    pub name: String,
}

#[derive(Serialize)]
pub(super) struct ListOutput {
    pub device: String,
    pub count: usize,
    pub presets: Vec<PresetJson>,
}

#[derive(Serialize)]
pub(super) struct SelectOutput {
    pub device: String,
    pub preset: u16,
    pub slot: u8,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub errors: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List connected C4 Synth pedals
    Devices,

    /// Read every preset slot and print the active presets
    List,

    /// Load a preset by its 1-based number
    Select {
        /// Preset number as shown on the pedal (1-128)
        preset: u16,
    },

    /// Interactive browser: +/n next, -/p previous, empty line or s to load, q to quit
    Browse,

    /// Show current configuration and file path
    Config {
        /// Change a setting and save the file (repeatable), e.g. --set name_width=16
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &Options) -> Result<()> {
    match cmd {
        Command::Devices => devices::cmd_devices(opts),
        Command::List => list::cmd_list(opts),
        Command::Select { preset } => select::cmd_select(opts, preset),
        Command::Browse => {
            if opts.json {
                warn_json_unsupported("browse");
            }
            browse::cmd_browse(opts)
        }
        Command::Config { set } => config_cmd::cmd_config(opts, &set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_width_uses_longest_key() {
        assert_eq!(kv_width(&["Config file:"], &[]), 14);
        assert_eq!(kv_width(&["a:"], &["settle_delay_ms:"]), 20);
        assert_eq!(kv_width(&[], &[]), 0);
    }

    #[test]
    fn simulated_transport_is_c4() {
        let opts = Options {
            json: false,
            config_path: None,
            simulate: true,
        };
        let t = open_transport(&opts, &Config::default()).unwrap();
        assert!(t.is_simulated());
        assert!(t.identity().is_c4_synth());
    }

    #[test]
    fn explicit_config_path_wins() {
        let opts = Options {
            json: false,
            config_path: Some(PathBuf::from("/tmp/custom.toml")),
            simulate: false,
        };
        assert_eq!(config_path(&opts), Some(PathBuf::from("/tmp/custom.toml")));
    }

    #[test]
    fn load_checked_config_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "name_width = 0\n").unwrap();
        let opts = Options {
            json: false,
            config_path: Some(path),
            simulate: true,
        };
        assert!(matches!(
            load_checked_config(&opts),
            Err(C4Error::Config(_))
        ));
    }
}
