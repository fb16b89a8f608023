//! Serial transport implementation

use super::{PortProvider, Transport};
use crate::config::SerialConfig;
use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Serial transport for the device's USB CDC link
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port (8N1, no flow control)
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0", "COM3")
    /// * `baud_rate` - Baud rate (the device uses 115200)
    /// * `timeout` - Per-read timeout; a read that times out returns 0 bytes
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        log::debug!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }
}

/// Ports reported by the operating system, optionally narrowed by config
pub struct SystemPorts {
    baud_rate: u32,
    timeout: Duration,
    filter: Option<Vec<String>>,
}

impl SystemPorts {
    pub fn new(config: &SerialConfig) -> Self {
        Self {
            baud_rate: config.baud_rate,
            timeout: Duration::from_millis(config.read_timeout_ms),
            filter: config.port_filter.clone(),
        }
    }
}

impl PortProvider for SystemPorts {
    fn list_ports(&self) -> Result<Vec<String>> {
        if let Some(ref filter) = self.filter {
            return Ok(filter.clone());
        }
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|info| info.port_name)
            .collect())
    }

    fn open(&self, name: &str) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(
            name,
            self.baud_rate,
            self.timeout,
        )?))
    }
}
