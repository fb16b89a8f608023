//! Serial port probe
//!
//! Lists serial ports, runs the version handshake on each and sends one
//! test burst to the first device that answers.
//!
//! Usage: `cargo run --example port_probe [slot]`

use ovr_io::config::SerialConfig;
use ovr_io::devices::ovr::SerialGateway;
use ovr_io::transport::{PortProvider, SystemPorts};
use ovr_io::{Algorithm, DeviceGateway, OdorantCommand};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let slot: u8 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 0,
    };

    log::info!("=== OVR Serial Probe ===");
    let config = SerialConfig::default();
    for port in SystemPorts::new(&config).list_ports()? {
        log::info!("Found port: {}", port);
    }

    let mut gateway = SerialGateway::new(&config);
    if !gateway.connect() {
        log::warn!("No port answered the version query");
        return Ok(());
    }
    log::info!("Device on {}", gateway.port_name().unwrap_or("?"));

    gateway.init(1);
    gateway.add_command(OdorantCommand::new("probe", slot, Algorithm::Burst, 128));
    if gateway.send_commands() {
        log::info!("Sent test burst to slot {}", slot);
    } else {
        log::warn!("Send failed");
    }
    Ok(())
}
