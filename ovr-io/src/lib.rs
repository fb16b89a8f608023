//! ovr-io - Host-side driver for OVR scent devices
//!
//! Commands submitted by the host are aggregated per cycle (one per slot,
//! capped by the device's recharge budget) and sent over whichever transport
//! currently reaches the device: USB serial first, WiFi/UDP as fallback.
//!
//! ## Features
//!
//! - `serial` (default): USB serial gateway via `serialport`

pub mod aggregator;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod net;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use crate::aggregator::{Admission, CommandAggregator, CommandFilter};
pub use crate::config::AppConfig;
pub use crate::core::gateway::{ConnectionStatus, DeviceGateway};
pub use crate::core::types::{Algorithm, OdorantCommand, OdorantConfig};
pub use crate::error::{Error, Result};
pub use crate::session::Session;
