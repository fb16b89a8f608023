//! Device implementations

pub mod ovr;

use crate::config::{AppConfig, TransportKind};
use crate::core::gateway::DeviceGateway;
use crate::error::Result;

/// Create the configured gateways, in order of preference
pub fn create_gateways(config: &AppConfig) -> Result<Vec<Box<dyn DeviceGateway>>> {
    let mut gateways: Vec<Box<dyn DeviceGateway>> = Vec::new();

    for kind in &config.session.transports {
        match kind {
            #[cfg(feature = "serial")]
            TransportKind::Serial => {
                gateways.push(Box::new(ovr::SerialGateway::new(&config.serial)));
            }
            #[cfg(not(feature = "serial"))]
            TransportKind::Serial => {
                log::warn!("Serial transport requested but built without the `serial` feature");
            }
            TransportKind::Udp => {
                gateways.push(Box::new(ovr::UdpGateway::new(&config.device, &config.udp)?));
            }
        }
    }

    log::info!(
        "Gateways: {}",
        gateways
            .iter()
            .map(|g| g.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(gateways)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateways_follow_preference_order() {
        let mut config = AppConfig::default();
        config.session.transports = vec![TransportKind::Udp];
        let gateways = create_gateways(&config).unwrap();
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways[0].label(), "WiFi");
    }

    #[cfg(feature = "serial")]
    #[test]
    fn test_serial_first_by_default() {
        let gateways = create_gateways(&AppConfig::default()).unwrap();
        let labels: Vec<_> = gateways.iter().map(|g| g.label()).collect();
        assert_eq!(labels, vec!["USB", "WiFi"]);
    }
}
