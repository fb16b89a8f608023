//! Configuration for ovr-io
//!
//! Loads configuration from a TOML file. Every section has defaults, so a
//! file only needs the values that differ:
//!
//! ```toml
//! [device]
//! hostname = "OVRv0_2_0"
//! cap_recharge_micros = 22222
//!
//! [session]
//! transports = ["serial", "udp"]
//!
//! [udp]
//! discovery_targets = ["192.168.4.1"]
//! ```

use crate::devices::ovr::constants::{
    CONNECTION_TIMEOUT_MS, DEFAULT_HOSTNAME, DEVICE_UDP_PORT, RECEIVE_POLL_MS,
    RECHARGE_WINDOW_MICROS, REPLY_QUEUE_DEPTH, SERIAL_BAUD_RATE, SERIAL_READ_TIMEOUT_MS,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub session: SessionConfig,
    pub udp: UdpConfig,
    pub serial: SerialConfig,
    pub logging: LoggingConfig,
}

/// Device identity and rate budget
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hostname the device answers discovery queries with
    pub hostname: String,
    /// Capacitor recharge time per release (microseconds)
    ///
    /// The device can fire `200000 / cap_recharge_micros` slots per cycle,
    /// which caps how many commands are aggregated and sent per packet.
    pub cap_recharge_micros: u32,
}

/// Transport kinds the session can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// USB serial link
    Serial,
    /// Local network UDP
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Udp => write!(f, "udp"),
        }
    }
}

/// Per-cycle driver settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often the device connection is checked/re-established
    pub maintain_interval_ms: u64,
    /// Delay before the first connection attempt
    pub initial_maintain_delay_ms: u64,
    /// Daemon tick period
    pub tick_interval_ms: u64,
    /// Transports in order of preference
    pub transports: Vec<TransportKind>,
}

/// UDP gateway settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UdpConfig {
    /// Device listening port
    pub device_port: u16,
    /// Silence after which a peer is considered gone
    pub connection_timeout_ms: u64,
    /// Addresses to query by unicast instead of broadcasting on every subnet
    pub discovery_targets: Option<Vec<Ipv4Addr>>,
    /// Receiver thread wake-up period (bounds shutdown latency)
    pub receive_poll_ms: u64,
    /// Replies buffered between the receiver thread and the main cycle
    pub reply_queue_depth: usize,
}

/// Serial gateway settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Per-read timeout; bounds how long a handshake reply is awaited
    pub read_timeout_ms: u64,
    /// Ports to scan instead of every port the OS reports
    pub port_filter: Option<Vec<String>>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            cap_recharge_micros: 22_222,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            maintain_interval_ms: 1000,
            initial_maintain_delay_ms: 500,
            tick_interval_ms: 50,
            transports: vec![TransportKind::Serial, TransportKind::Udp],
        }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            device_port: DEVICE_UDP_PORT,
            connection_timeout_ms: CONNECTION_TIMEOUT_MS,
            discovery_targets: None,
            receive_poll_ms: RECEIVE_POLL_MS,
            reply_queue_depth: REPLY_QUEUE_DEPTH,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: SERIAL_BAUD_RATE,
            read_timeout_ms: SERIAL_READ_TIMEOUT_MS,
            port_filter: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DeviceConfig {
    /// Commands the device can render per cycle (at least one)
    pub fn max_commands(&self) -> usize {
        (RECHARGE_WINDOW_MICROS / self.cap_recharge_micros.max(1)).max(1) as usize
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use ovr_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("ovrio.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the gateways cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.device.hostname.is_empty() {
            return Err(Error::Config("device.hostname must not be empty".to_string()));
        }
        if self.device.cap_recharge_micros == 0 {
            return Err(Error::Config(
                "device.cap_recharge_micros must be positive".to_string(),
            ));
        }
        if self.session.transports.is_empty() {
            return Err(Error::Config(
                "session.transports must name at least one transport".to_string(),
            ));
        }
        if self.session.maintain_interval_ms == 0 || self.session.tick_interval_ms == 0 {
            return Err(Error::Config(
                "session intervals must be positive".to_string(),
            ));
        }
        if self.udp.connection_timeout_ms == 0 || self.udp.receive_poll_ms == 0 {
            return Err(Error::Config("udp timeouts must be positive".to_string()));
        }
        if self.udp.reply_queue_depth == 0 {
            return Err(Error::Config(
                "udp.reply_queue_depth must be positive".to_string(),
            ));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(Error::Config(
                "serial.read_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
