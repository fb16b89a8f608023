//! Mock transport for testing

use super::{PortProvider, Transport};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// Mock transport for unit testing
///
/// Clones share state, so a test keeps one handle while the gateway owns
/// another.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    responder: Option<Responder>,
    fail_writes: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                responder: None,
                fail_writes: false,
            })),
        }
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Answer writes: whatever the closure returns is queued for reading
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.inner.lock().responder = Some(Box::new(responder));
    }

    /// Make every subsequent write fail with a broken pipe
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }

    /// Clear read buffer
    pub fn clear_read(&self) {
        self.inner.lock().read_buffer.clear();
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let available = inner.read_buffer.len().min(buffer.len());

        for (item, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *item = byte;
        }

        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        inner.write_buffer.extend_from_slice(data);

        let reply = inner.responder.as_mut().and_then(|respond| respond(data));
        if let Some(reply) = reply {
            inner.read_buffer.extend(reply);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.inner.lock().read_buffer.len())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory port list handing out shared [`MockTransport`]s
#[derive(Clone, Default)]
pub struct MockPorts {
    ports: Vec<(String, MockTransport)>,
}

impl MockPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port; the returned handle shares state with what `open` yields
    pub fn add(&mut self, name: impl Into<String>) -> MockTransport {
        let transport = MockTransport::new();
        self.ports.push((name.into(), transport.clone()));
        transport
    }
}

impl PortProvider for MockPorts {
    fn list_ports(&self) -> Result<Vec<String>> {
        Ok(self.ports.iter().map(|(name, _)| name.clone()).collect())
    }

    fn open(&self, name: &str) -> Result<Box<dyn Transport>> {
        self.ports
            .iter()
            .find(|(port, _)| port == name)
            .map(|(_, transport)| Box::new(transport.clone()) as Box<dyn Transport>)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown port {}", name)))
    }
}
