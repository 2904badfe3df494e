//! `devices` subcommand: list connected C4 Synth pedals.

use super::{
    DevicesOutput, DiscoveredDevice, HidTransport, Options, Result, device, load_config,
    open_transport, print_json,
};

pub(super) fn cmd_devices(opts: &Options) -> Result<()> {
    let devices = if opts.simulate {
        let config = load_config(opts.config_path.as_deref());
        let sim = open_transport(opts, &config)?;
        let info = sim.info();
        vec![DiscoveredDevice {
            path: info.path.clone(),
            product: Some(info.product.clone()),
            serial: info.serial.clone(),
        }]
    } else {
        device::enumerate_devices()
    };

    if opts.json {
        return print_json(&DevicesOutput {
            count: devices.len(),
            devices,
        });
    }

    if devices.is_empty() {
        println!("No C4 Synth pedals found.");
        return Ok(());
    }

    println!(
        "Found {} C4 Synth pedal{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] {}", i + 1, dev.path);
        if let Some(ref product) = dev.product {
            println!("      Product: {product}");
        }
        if let Some(ref serial) = dev.serial {
            println!("      Serial: {serial}");
        }
    }

    Ok(())
}
