//! `config` subcommand: show current configuration and file path, and
//! change settings with `--set`.

use super::{
    C4Error, Config, ConfigOutput, Options, Result, config_path, kv, kv_indent, kv_width,
    load_config, print_json,
};

/// Apply `KEY=VALUE` pairs in order. The config is only changed if every
/// pair parses.
fn apply_settings(config: &Config, pairs: &[String]) -> Result<Config> {
    let mut updated = config.clone();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(C4Error::Config(format!("expected KEY=VALUE, got '{pair}'")));
        };
        updated.set(key, value)?;
    }
    Ok(updated)
}

/// Validate and write the config where it was loaded from.
fn save_config(opts: &Options, config: &Config) -> Result<()> {
    config.check()?;
    match &opts.config_path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    Ok(())
}

pub(super) fn cmd_config(opts: &Options, set: &[String]) -> Result<()> {
    let mut config = load_config(opts.config_path.as_deref());
    let path = config_path(opts);
    if !set.is_empty() {
        config = apply_settings(&config, set)?;
        save_config(opts, &config)?;
        log::info!("saved {} setting(s)", set.len());
    }
    let exists = path.as_ref().is_some_and(|p| p.exists());
    let errors: Vec<String> = match config.validate() {
        Ok(()) => Vec::new(),
        Err(errs) => errs.iter().map(|e| e.to_string()).collect(),
    };

    if opts.json {
        return print_json(&ConfigOutput {
            config_file: path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: exists,
            settings: config,
            errors,
        });
    }

    let w = kv_width(
        &["Config file:"],
        &[
            "device_serial:",
            "settle_delay_ms:",
            "poll_interval_ms:",
            "stall_timeout_ms:",
            "name_width:",
        ],
    );

    match &path {
        Some(p) if exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let serial = if config.device_serial.is_empty() {
        "(first device)"
    } else {
        config.device_serial.as_str()
    };
    kv_indent("device_serial:", serial, w);
    kv_indent("settle_delay_ms:", config.settle_delay_ms, w);
    kv_indent("poll_interval_ms:", config.poll_interval_ms, w);
    kv_indent("stall_timeout_ms:", config.stall_timeout_ms, w);
    kv_indent("name_width:", config.name_width, w);

    if !errors.is_empty() {
        println!();
        println!("Problems:");
        for e in &errors {
            println!("  {e}");
        }
    }
    Ok(())
}
