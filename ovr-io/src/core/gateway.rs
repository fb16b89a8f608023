//! DeviceGateway trait definition

use crate::core::types::OdorantCommand;
use std::fmt;

/// Outcome of one connection maintenance pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A new connection was made this pass; the gateway needs `init`
    Established,
    /// The existing connection (or an in-flight discovery) is still good
    Maintained,
    /// No device reachable over this transport
    Unavailable,
}

impl ConnectionStatus {
    pub fn is_available(&self) -> bool {
        !matches!(self, ConnectionStatus::Unavailable)
    }
}

/// Device communication contract shared by every transport.
///
/// The host drives a gateway once per cycle in a fixed order:
/// `add_commands` → `has_commands_to_send` → `send_commands` → `clear_commands`.
///
/// None of these operations fail loudly: I/O problems are logged and turn
/// into `false` / a disconnected gateway, and the next cycle retries.
pub trait DeviceGateway: Send {
    /// Non-blocking kick-off of discovery or handshake
    fn begin_connect(&mut self);

    /// Cheap liveness check; may time out a stale connection
    fn check_connection(&mut self) -> bool;

    /// Blocking best-effort connection attempt
    fn connect(&mut self) -> bool;

    /// Size the outgoing packet for `max_commands_per_packet` records
    fn init(&mut self, max_commands_per_packet: usize);

    /// Queue one command (ignored once the packet is full)
    fn add_command(&mut self, command: OdorantCommand);

    /// Queue a cycle's worth of commands
    fn add_commands(&mut self, commands: Vec<OdorantCommand>) {
        for command in commands {
            self.add_command(command);
        }
    }

    /// Drop queued commands for `slot`
    fn remove_command(&mut self, slot: u8);

    fn clear_commands(&mut self);

    fn has_commands_to_send(&self) -> bool;

    /// Serialize queued commands into one packet and transmit it
    fn send_commands(&mut self) -> bool;

    fn is_connected(&self) -> bool;

    /// Short transport name for logs ("USB", "WiFi")
    fn label(&self) -> &'static str;

    /// Commands currently queued
    fn pending(&self) -> &[OdorantCommand];

    /// Release sockets/ports; the gateway reports disconnected afterwards
    fn dispose(&mut self);

    /// Device debug mode as last reported by the device, if the transport supports it
    fn debug_mode(&self) -> Option<bool> {
        None
    }

    /// One connection maintenance pass.
    ///
    /// Default strategy: check the open link, fall back to a blocking connect.
    fn maintain(&mut self) -> ConnectionStatus {
        if self.check_connection() {
            ConnectionStatus::Maintained
        } else if self.connect() {
            ConnectionStatus::Established
        } else {
            ConnectionStatus::Unavailable
        }
    }
}

/// Capacity-limited queue of commands waiting for the next packet
#[derive(Debug, Clone, Default)]
pub struct CommandBatch {
    commands: Vec<OdorantCommand>,
    capacity: usize,
}

impl CommandBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change capacity, dropping commands that no longer fit
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.commands.truncate(capacity);
    }

    /// Append if there is room; returns whether it was kept
    pub fn push(&mut self, command: OdorantCommand) -> bool {
        if self.commands.len() >= self.capacity {
            return false;
        }
        self.commands.push(command);
        true
    }

    /// Append as many as fit
    pub fn extend(&mut self, commands: Vec<OdorantCommand>) {
        for command in commands {
            if !self.push(command) {
                break;
            }
        }
    }

    /// Append all or nothing
    pub fn extend_exact(&mut self, commands: Vec<OdorantCommand>) -> bool {
        if self.commands.len() + commands.len() > self.capacity {
            return false;
        }
        self.commands.extend(commands);
        true
    }

    pub fn remove_slot(&mut self, slot: u8) {
        self.commands.retain(|c| c.slot() != slot);
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn as_slice(&self) -> &[OdorantCommand] {
        &self.commands
    }
}

impl fmt::Display for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            write!(f, "{}", command)?;
        }
        Ok(())
    }
}
