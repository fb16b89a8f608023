//! Reusable outgoing packet buffers for the OVR protocol
//!
//! This module provides:
//! - `UdpPacket`: `[HEADER] [RECORD × N]` batch buffer sized once at `init`
//! - `SerialPacket`: `[LEN_H LEN_L] [TYPE] [COUNT] [SLOT ALGO INTENSITY] × N`
//! - `hostname_request` / `debug_mode_request` / `string_frame`: fixed messages
//!
//! # Pattern
//!
//! ```ignore
//! let mut pkt = UdpPacket::with_capacity(9);  // Once, at gateway init
//! pkt.set_odorant_commands(&commands);        // Every cycle
//! socket.send_to(pkt.as_bytes(), peer)?;      // Only header + used records go out
//! ```

use super::constants::{HEADER_SIZE, SERIAL_LENGTH_PREFIX_SIZE, SERIAL_RECORD_SIZE};
use super::header::{FrameHeader, MessageType};
use crate::core::types::OdorantCommand;

/// Most records a UDP batch can describe (payload length is a u16)
pub const MAX_UDP_COMMANDS: usize = u16::MAX as usize / OdorantCommand::SIZE;

/// Most records a serial batch can describe (count is a single byte)
pub const MAX_SERIAL_COMMANDS: usize = u8::MAX as usize;

/// Reusable UDP batch buffer
///
/// Allocated once for `max_commands` records; `as_bytes` exposes only the
/// header plus the records of the last batch.
pub struct UdpPacket {
    data: Vec<u8>,
    len: usize,
}

impl UdpPacket {
    /// Allocate a buffer for up to `max_commands` records
    pub fn with_capacity(max_commands: usize) -> Self {
        let max_commands = max_commands.min(MAX_UDP_COMMANDS);
        Self {
            data: vec![0u8; HEADER_SIZE + max_commands * OdorantCommand::SIZE],
            len: 0,
        }
    }

    /// Number of records the buffer can hold
    pub fn max_commands(&self) -> usize {
        (self.data.len() - HEADER_SIZE) / OdorantCommand::SIZE
    }

    /// Bytes to put on the wire
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Fill with an odorant batch, truncating to capacity.
    ///
    /// Returns the number of records written.
    pub fn set_odorant_commands(&mut self, commands: &[OdorantCommand]) -> usize {
        let count = commands.len().min(self.max_commands());
        let payload_len = (count * OdorantCommand::SIZE) as u16;

        FrameHeader::new(MessageType::OdorantCommands, payload_len).write_to(&mut self.data);

        let mut index = HEADER_SIZE;
        for command in &commands[..count] {
            self.data[index..index + OdorantCommand::SIZE].copy_from_slice(command.as_bytes());
            index += OdorantCommand::SIZE;
        }

        self.len = index;
        count
    }
}

/// Hostname query carrying the port replies should be sent to
pub fn hostname_request(reply_port: u16) -> [u8; HEADER_SIZE + 2] {
    let mut out = [0u8; HEADER_SIZE + 2];
    FrameHeader::new(MessageType::DeviceHostnameRequest, 2).write_to(&mut out);
    out[HEADER_SIZE..].copy_from_slice(&reply_port.to_le_bytes());
    out
}

/// Debug-mode query (header only)
pub fn debug_mode_request() -> [u8; HEADER_SIZE] {
    FrameHeader::new(MessageType::DeviceDebugModeRequest, 0).to_bytes()
}

/// Reusable serial batch buffer, including the 2-byte length prefix
pub struct SerialPacket {
    data: Vec<u8>,
    len: usize,
    max_commands: usize,
}

impl SerialPacket {
    /// Allocate a buffer for up to `max_commands` records.
    ///
    /// The body is sized `max_commands * 4 + 3`, matching the allocation the
    /// device firmware was written against.
    pub fn with_capacity(max_commands: usize) -> Self {
        let max_commands = max_commands.min(MAX_SERIAL_COMMANDS);
        let body = max_commands * OdorantCommand::SIZE + 3;
        Self {
            data: vec![0u8; SERIAL_LENGTH_PREFIX_SIZE + body],
            len: 0,
            max_commands,
        }
    }

    /// Number of records the buffer can hold
    pub fn max_commands(&self) -> usize {
        self.max_commands
    }

    /// Allocated body size (without the length prefix)
    pub fn body_capacity(&self) -> usize {
        self.data.len() - SERIAL_LENGTH_PREFIX_SIZE
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Fill with an odorant batch, truncating to capacity.
    ///
    /// Intensity is carried as a single byte (saturating).
    pub fn set_odorant_commands(&mut self, commands: &[OdorantCommand]) -> usize {
        let count = commands.len().min(self.max_commands());

        let mut index = SERIAL_LENGTH_PREFIX_SIZE;
        self.data[index] = MessageType::OdorantCommands as u8;
        self.data[index + 1] = count as u8;
        index += 2;

        for command in &commands[..count] {
            self.data[index] = command.slot();
            self.data[index + 1] = command.algorithm_code();
            self.data[index + 2] = command.serial_intensity();
            index += SERIAL_RECORD_SIZE;
        }

        let body_len = (index - SERIAL_LENGTH_PREFIX_SIZE) as u16;
        self.data[..SERIAL_LENGTH_PREFIX_SIZE].copy_from_slice(&body_len.to_be_bytes());
        self.len = index;
        count
    }
}

/// Length-prefixed ASCII string frame used by the serial handshake
pub fn string_frame(message: &str) -> Vec<u8> {
    let bytes = message.as_bytes();
    let mut out = Vec::with_capacity(SERIAL_LENGTH_PREFIX_SIZE + bytes.len());
    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    out.extend_from_slice(bytes);
    out
}
