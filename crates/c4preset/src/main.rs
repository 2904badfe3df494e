//! c4preset: browse and select Source Audio C4 Synth presets from a terminal.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;

/// Shared shutdown flag, cleared by the Ctrl+C handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "c4preset",
    version,
    about = "Browse and select Source Audio C4 Synth presets over USB HID"
)]
struct Args {
    /// Output as JSON (for devices, list, select, config)
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use a built-in simulated pedal instead of USB hardware
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(args.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    let opts = cli::Options {
        json: args.json,
        config_path: args.config,
        simulate: args.simulate,
    };

    if let Err(e) = cli::run(args.command, &opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
