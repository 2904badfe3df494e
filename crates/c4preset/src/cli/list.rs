//! `list` subcommand: run discovery and print the active presets.

use super::{
    HidTransport, ListOutput, Options, PresetJson, Result, SystemClock, TextGrid,
    controller_for, load_checked_config, open_transport, print_json, session, stall_timeout,
};

pub(super) fn cmd_list(opts: &Options) -> Result<()> {
    let config = load_checked_config(opts)?;
    let mut transport = open_transport(opts, &config)?;
    let mut controller = controller_for(&config);
    let mut grid = TextGrid::new();
    let clock = SystemClock::new();

    session::discover(
        &mut controller,
        &mut transport,
        &mut grid,
        &clock,
        stall_timeout(&config),
    )?;

    let catalog = controller.catalog();
    let path = transport.info().path.clone();

    if opts.json {
        return print_json(&ListOutput {
            device: path,
            count: catalog.count(),
            presets: catalog
                .iter()
                .map(|e| PresetJson {
                    preset: e.preset_number(),
                    slot: e.slot,
                    name: e.name.text(),
                })
                .collect(),
        });
    }

    if catalog.is_empty() {
        println!("No active presets on {path}.");
        return Ok(());
    }

    println!(
        "{} active preset{} on {path}:",
        catalog.count(),
        if catalog.count() == 1 { "" } else { "s" }
    );
    println!();
    for entry in catalog.iter() {
        println!("  {:03} - {}", entry.preset_number(), entry.name);
    }
    Ok(())
}
