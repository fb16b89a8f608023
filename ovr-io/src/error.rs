//! Error types for ovr-io
//!
//! Gateways never surface these from their per-cycle operations; they are
//! reserved for resource acquisition (sockets, ports, threads) and config.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ovr-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML write error
    #[error("Config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Operation requires a connected device
    #[error("Device not connected")]
    NotConnected,

    /// No serial port answered the version handshake
    #[error("No serial port answered the handshake")]
    NoPortAvailable,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Background thread panicked
    #[error("Background thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
