//! OVR scent device protocol and gateways
//!
//! - [`header`]: 4-byte checksummed frame header
//! - [`packet`]: reusable outgoing packet buffers
//! - [`udp`]: WiFi gateway with broadcast discovery
//! - [`serial`]: USB gateway (feature `serial`)

pub mod constants;
pub mod header;
pub mod packet;
#[cfg(feature = "serial")]
pub mod serial;
pub mod udp;

#[cfg(feature = "serial")]
pub use serial::SerialGateway;
pub use udp::UdpGateway;
