//! `select` subcommand: send a program change without browsing.

use super::{
    HidTransport, Options, Result, SelectOutput, load_checked_config, open_transport, print_json,
    session,
};

pub(super) fn cmd_select(opts: &Options, preset: u16) -> Result<()> {
    // Reject a bad number before touching the USB bus.
    session::slot_for_preset(preset)?;
    let config = load_checked_config(opts)?;
    let mut transport = open_transport(opts, &config)?;
    let slot = session::select_preset(&mut transport, preset)?;

    if opts.json {
        return print_json(&SelectOutput {
            device: transport.info().path.clone(),
            preset,
            slot,
        });
    }

    println!("Loaded preset {preset:03} (slot {slot})");
    Ok(())
}
