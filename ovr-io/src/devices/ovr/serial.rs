//! USB serial gateway
//!
//! Discovery walks the available ports and sends a length-prefixed
//! `"OVR Version Query"` on each; the first port answering with a line that
//! starts with `"OVR version"` is kept. The same handshake doubles as the
//! liveness check on later cycles.

use super::constants::{
    MAX_HANDSHAKE_LINES, MAX_LINE_LENGTH, SERIAL_MODE_SWITCH, SERIAL_VERSION_QUERY,
    SERIAL_VERSION_SIGNATURE,
};
use super::packet::{string_frame, SerialPacket};
use crate::config::SerialConfig;
use crate::core::gateway::{CommandBatch, DeviceGateway};
use crate::core::types::OdorantCommand;
use crate::error::{Error, Result};
use crate::transport::{PortProvider, SystemPorts, Transport};

/// An open, handshaken port
struct OpenPort {
    name: String,
    transport: Box<dyn Transport>,
}

/// Serial gateway
pub struct SerialGateway {
    ports: Box<dyn PortProvider>,
    port: Option<OpenPort>,
    packet: SerialPacket,
    batch: CommandBatch,
}

impl SerialGateway {
    /// Gateway probing the ports the OS reports (or `port_filter`)
    pub fn new(config: &SerialConfig) -> Self {
        Self::with_ports(Box::new(SystemPorts::new(config)))
    }

    /// Gateway probing ports from a custom provider
    pub fn with_ports(ports: Box<dyn PortProvider>) -> Self {
        Self {
            ports,
            port: None,
            packet: SerialPacket::with_capacity(0),
            batch: CommandBatch::new(0),
        }
    }

    /// Name of the connected port
    pub fn port_name(&self) -> Option<&str> {
        self.port.as_ref().map(|p| p.name.as_str())
    }

    fn scan(&self) -> Result<OpenPort> {
        for name in self.ports.list_ports()? {
            let mut transport = match self.ports.open(&name) {
                Ok(t) => t,
                Err(e) => {
                    log::debug!("Skipping {}: {}", name, e);
                    continue;
                }
            };

            match handshake(transport.as_mut()) {
                Ok(true) => return Ok(OpenPort { name, transport }),
                Ok(false) => log::debug!("{} did not answer the version query", name),
                Err(e) => log::debug!("Handshake on {} failed: {}", name, e),
            }
        }
        Err(Error::NoPortAvailable)
    }

    fn close(&mut self, reason: &str) {
        if let Some(port) = self.port.take() {
            log::warn!("USB device on {} lost: {}", port.name, reason);
        }
    }
}

impl DeviceGateway for SerialGateway {
    fn begin_connect(&mut self) {
        // Discovery is synchronous; `connect` does the work
    }

    fn check_connection(&mut self) -> bool {
        let Some(port) = self.port.as_mut() else {
            return false;
        };

        match handshake(port.transport.as_mut()) {
            Ok(true) => true,
            Ok(false) => {
                self.close("no version reply");
                false
            }
            Err(e) => {
                self.close(&e.to_string());
                false
            }
        }
    }

    fn connect(&mut self) -> bool {
        match self.scan() {
            Ok(port) => {
                log::info!("Device found via USB on {}", port.name);
                self.port = Some(port);
                true
            }
            Err(e) => {
                log::debug!("USB scan: {}", e);
                false
            }
        }
    }

    fn init(&mut self, max_commands_per_packet: usize) {
        self.packet = SerialPacket::with_capacity(max_commands_per_packet);
        self.batch.set_capacity(self.packet.max_commands());

        let Some(port) = self.port.as_mut() else {
            return;
        };
        if let Err(e) = port.transport.write_all(&string_frame(SERIAL_MODE_SWITCH)) {
            self.close(&e.to_string());
        }
    }

    fn add_command(&mut self, command: OdorantCommand) {
        self.batch.push(command);
    }

    fn add_commands(&mut self, commands: Vec<OdorantCommand>) {
        self.batch.extend(commands);
    }

    fn remove_command(&mut self, slot: u8) {
        self.batch.remove_slot(slot);
    }

    fn clear_commands(&mut self) {
        self.batch.clear();
    }

    fn has_commands_to_send(&self) -> bool {
        !self.batch.is_empty()
    }

    fn send_commands(&mut self) -> bool {
        let Some(port) = self.port.as_mut() else {
            return false;
        };

        self.packet.set_odorant_commands(self.batch.as_slice());
        if let Err(e) = port.transport.write_all(self.packet.as_bytes()) {
            self.close(&e.to_string());
            return false;
        }

        for command in self.batch.as_slice() {
            log::trace!("{}", command.to_csv());
        }
        true
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn label(&self) -> &'static str {
        "USB"
    }

    fn pending(&self) -> &[OdorantCommand] {
        self.batch.as_slice()
    }

    fn dispose(&mut self) {
        if let Some(port) = self.port.take() {
            log::debug!("Closing {}", port.name);
        }
        self.batch.clear();
    }
}

impl Drop for SerialGateway {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Send the version query and look for the reply signature.
///
/// Boot and log lines ahead of the reply are skipped; a read timeout
/// before the signature shows up fails the handshake.
fn handshake(transport: &mut dyn Transport) -> Result<bool> {
    discard_input(transport)?;
    transport.write_all(&string_frame(SERIAL_VERSION_QUERY))?;

    for _ in 0..MAX_HANDSHAKE_LINES {
        match read_line(transport)? {
            Some(line) if line.starts_with(SERIAL_VERSION_SIGNATURE) => return Ok(true),
            Some(line) => log::trace!("Skipping serial line: {}", line),
            None => return Ok(false),
        }
    }
    Ok(false)
}

// Drop stale bytes so the next line read sees the fresh reply
fn discard_input(transport: &mut dyn Transport) -> Result<()> {
    let mut scratch = [0u8; 64];
    while transport.available()? > 0 {
        if transport.read(&mut scratch)? == 0 {
            break;
        }
    }
    Ok(())
}

/// Read up to a newline; an empty read (port timeout) ends the line.
///
/// `None` when the port times out before any byte arrives.
fn read_line(transport: &mut dyn Transport) -> Result<Option<String>> {
    let mut line = Vec::with_capacity(32);
    let mut byte = [0u8; 1];

    while line.len() < MAX_LINE_LENGTH {
        if transport.read(&mut byte)? == 0 {
            if line.is_empty() {
                return Ok(None);
            }
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }

    let line = String::from_utf8_lossy(&line);
    Ok(Some(line.trim_end_matches('\r').to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gateway::ConnectionStatus;
    use crate::core::types::Algorithm;
    use crate::devices::ovr::header::MessageType;
    use crate::transport::{MockPorts, MockTransport};

    fn answer_version(device: &MockTransport) {
        let query = string_frame(SERIAL_VERSION_QUERY);
        device.set_responder(move |data| {
            (data == query.as_slice()).then(|| b"OVR version 0.2.0\r\n".to_vec())
        });
    }

    fn connected_gateway() -> (SerialGateway, MockTransport) {
        let mut ports = MockPorts::new();
        let device = ports.add("/dev/ttyACM0");
        answer_version(&device);

        let mut gateway = SerialGateway::with_ports(Box::new(ports));
        assert!(gateway.connect());
        device.clear_written();
        (gateway, device)
    }

    #[test]
    fn test_connect_skips_silent_ports() {
        let mut ports = MockPorts::new();
        let silent = ports.add("/dev/ttyS0");
        let device = ports.add("/dev/ttyACM0");
        answer_version(&device);

        let mut gateway = SerialGateway::with_ports(Box::new(ports));
        assert!(gateway.connect());
        assert!(gateway.is_connected());
        assert_eq!(gateway.port_name(), Some("/dev/ttyACM0"));
        assert_eq!(silent.get_written(), string_frame(SERIAL_VERSION_QUERY));
    }

    #[test]
    fn test_connect_rejects_wrong_signature() {
        let mut ports = MockPorts::new();
        let other = ports.add("/dev/ttyUSB0");
        other.set_responder(|_| Some(b"GPS v1.0\n".to_vec()));

        let mut gateway = SerialGateway::with_ports(Box::new(ports));
        assert!(!gateway.connect());
        assert!(!gateway.is_connected());
    }

    #[test]
    fn test_connect_without_ports() {
        let mut gateway = SerialGateway::with_ports(Box::new(MockPorts::new()));
        assert!(!gateway.connect());
        assert_eq!(gateway.maintain(), ConnectionStatus::Unavailable);
    }

    #[test]
    fn test_check_connection_resends_query() {
        let (mut gateway, device) = connected_gateway();
        assert!(gateway.check_connection());
        assert_eq!(device.get_written(), string_frame(SERIAL_VERSION_QUERY));
    }

    #[test]
    fn test_check_connection_ignores_stale_input() {
        let (mut gateway, device) = connected_gateway();
        device.inject_read(b"garbage without newline");
        assert!(gateway.check_connection());
    }

    #[test]
    fn test_check_connection_closes_on_mismatch() {
        let (mut gateway, device) = connected_gateway();
        device.set_responder(|_| Some(b"reset\n".to_vec()));
        assert!(!gateway.check_connection());
        assert!(!gateway.is_connected());
    }

    #[test]
    fn test_handshake_skips_log_lines() {
        let mut ports = MockPorts::new();
        let device = ports.add("/dev/ttyACM0");
        let query = string_frame(SERIAL_VERSION_QUERY);
        device.set_responder(move |data| {
            (data == query.as_slice())
                .then(|| b"\r\nboot: wifi off\r\nOVR version 0.2.0\r\n".to_vec())
        });

        let mut gateway = SerialGateway::with_ports(Box::new(ports));
        assert!(gateway.connect());
        assert!(gateway.check_connection());
        assert!(gateway.is_connected());
    }

    #[test]
    fn test_handshake_gives_up_on_endless_chatter() {
        let (mut gateway, device) = connected_gateway();
        let chatter = b"log\n".repeat(MAX_HANDSHAKE_LINES + 1);
        device.set_responder(move |_| Some(chatter.clone()));
        assert!(!gateway.check_connection());
        assert!(!gateway.is_connected());
    }

    #[test]
    fn test_check_connection_closes_on_write_failure() {
        let (mut gateway, device) = connected_gateway();
        device.set_fail_writes(true);
        assert!(!gateway.check_connection());
        assert!(!gateway.is_connected());
    }

    #[test]
    fn test_init_sends_mode_switch() {
        let (mut gateway, device) = connected_gateway();
        gateway.init(9);
        assert_eq!(device.get_written(), string_frame(SERIAL_MODE_SWITCH));
    }

    #[test]
    fn test_send_commands_writes_serial_batch() {
        let (mut gateway, device) = connected_gateway();
        gateway.init(2);
        device.clear_written();

        gateway.add_commands(vec![
            OdorantCommand::new("a", 1, Algorithm::Burst, 300),
            OdorantCommand::new("b", 2, Algorithm::Ambient, 40),
            OdorantCommand::new("c", 3, Algorithm::Burst, 10),
        ]);
        // Adds until full
        assert_eq!(gateway.pending().len(), 2);
        assert!(gateway.has_commands_to_send());
        assert!(gateway.send_commands());

        assert_eq!(
            device.get_written(),
            vec![0x00, 8, MessageType::OdorantCommands as u8, 2, 1, 0, 255, 2, 1, 40]
        );

        gateway.clear_commands();
        assert!(!gateway.has_commands_to_send());
    }

    #[test]
    fn test_send_failure_disconnects() {
        let (mut gateway, device) = connected_gateway();
        gateway.init(9);
        gateway.add_command(OdorantCommand::new("a", 1, Algorithm::Burst, 10));
        device.set_fail_writes(true);

        assert!(!gateway.send_commands());
        assert!(!gateway.is_connected());
    }

    #[test]
    fn test_send_without_port() {
        let mut gateway = SerialGateway::with_ports(Box::new(MockPorts::new()));
        gateway.init(9);
        gateway.add_command(OdorantCommand::new("a", 1, Algorithm::Burst, 10));
        assert!(!gateway.send_commands());
    }

    #[test]
    fn test_maintain_strategy() {
        let mut ports = MockPorts::new();
        let device = ports.add("/dev/ttyACM0");
        answer_version(&device);

        let mut gateway = SerialGateway::with_ports(Box::new(ports));
        assert_eq!(gateway.maintain(), ConnectionStatus::Established);
        assert_eq!(gateway.maintain(), ConnectionStatus::Maintained);
        assert_eq!(gateway.label(), "USB");

        gateway.dispose();
        assert!(!gateway.is_connected());
    }

    #[test]
    fn test_remove_command() {
        let (mut gateway, _device) = connected_gateway();
        gateway.init(9);
        gateway.add_command(OdorantCommand::new("a", 1, Algorithm::Burst, 10));
        gateway.add_command(OdorantCommand::new("b", 2, Algorithm::Burst, 10));
        gateway.remove_command(1);
        assert_eq!(gateway.pending().len(), 1);
        assert_eq!(gateway.pending()[0].slot(), 2);
    }
}
