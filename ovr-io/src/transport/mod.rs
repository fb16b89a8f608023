//! Transport layer for byte-stream I/O abstraction
//!
//! The serial gateway talks to a [`Transport`] obtained from a
//! [`PortProvider`], so the handshake/scan logic runs the same against a
//! real serial port or the in-memory [`MockTransport`].

use crate::error::Result;

mod mock;
pub use mock::{MockPorts, MockTransport};

#[cfg(feature = "serial")]
mod serial;
#[cfg(feature = "serial")]
pub use serial::{SerialTransport, SystemPorts};

/// Transport trait for device communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 on timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }

    /// Write the whole buffer, then flush
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            data = &data[n..];
        }
        self.flush()
    }
}

/// Source of candidate ports for device scanning
pub trait PortProvider: Send {
    /// Names of ports worth trying, in scan order
    fn list_ports(&self) -> Result<Vec<String>>;

    /// Open a port by name
    fn open(&self, name: &str) -> Result<Box<dyn Transport>>;
}
