//! UDP discovery probe
//!
//! Broadcasts hostname queries until the device answers (or 10 s pass), then
//! prints its address and debug mode.
//!
//! Usage: `cargo run --example discover [hostname]`

use ovr_io::config::{DeviceConfig, UdpConfig};
use ovr_io::devices::ovr::UdpGateway;
use ovr_io::net;
use ovr_io::{ConnectionStatus, DeviceGateway};
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut device = DeviceConfig::default();
    if let Some(hostname) = std::env::args().nth(1) {
        device.hostname = hostname;
    }

    log::info!("=== OVR UDP Discovery ===");
    for address in net::broadcast_addresses()? {
        log::info!("Broadcast target: {}", address);
    }

    let mut gateway = UdpGateway::new(&device, &UdpConfig::default())?;
    log::info!(
        "Listening for '{}' on port {}",
        device.hostname,
        gateway.local_port().unwrap_or_default()
    );

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(10) {
        if gateway.maintain() == ConnectionStatus::Established {
            break;
        }
        std::thread::sleep(Duration::from_millis(500));
    }

    // Give the debug mode reply a moment to arrive
    std::thread::sleep(Duration::from_millis(200));
    gateway.check_connection();

    match gateway.peer() {
        Some(peer) => log::info!(
            "Device at {} (debug mode: {:?})",
            peer,
            gateway.debug_mode()
        ),
        None => log::warn!("No device answered"),
    }
    Ok(())
}
