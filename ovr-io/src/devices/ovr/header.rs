//! Frame header shared by every UDP message
//!
//! Header format: [CHECKSUM] [TYPE] [LEN_L] [LEN_H]
//!
//! `CHECKSUM = 251 - (TYPE + LEN) % 251`, so a well-formed header always
//! satisfies `(CHECKSUM + TYPE + LEN) % 251 == 0`. The check only catches
//! corruption and misaligned reads.

use super::constants::{CHECKSUM_MODULUS, HEADER_SIZE};

/// Message type codes shared with the device firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Host → device: "who are you", payload = host reply port (LE u16)
    DeviceHostnameRequest = 1,
    /// Device → host: ASCII hostname
    DeviceHostname = 2,
    /// Host → device: query debug mode
    DeviceDebugModeRequest = 3,
    /// Device → host: one byte, non-zero = debug mode on
    DeviceDebugMode = 4,
    /// Host → device: batch of odorant command records
    OdorantCommands = 5,
}

impl MessageType {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(MessageType::DeviceHostnameRequest),
            2 => Some(MessageType::DeviceHostname),
            3 => Some(MessageType::DeviceDebugModeRequest),
            4 => Some(MessageType::DeviceDebugMode),
            5 => Some(MessageType::OdorantCommands),
            _ => None,
        }
    }
}

/// Decoded 4-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub checksum: u8,
    pub message_type: u8,
    pub payload_len: u16,
}

impl FrameHeader {
    /// Build a header for an outgoing message
    pub fn new(message_type: MessageType, payload_len: u16) -> Self {
        let message_type = message_type as u8;
        Self {
            checksum: checksum(message_type, payload_len),
            message_type,
            payload_len,
        }
    }

    /// Parse a header from the start of `bytes`.
    ///
    /// Never fails: short input is zero-padded, which yields a header whose
    /// checksum does not verify unless the padded bytes happen to. Callers
    /// must check [`FrameHeader::is_valid`] before trusting the fields.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; HEADER_SIZE];
        let n = bytes.len().min(HEADER_SIZE);
        raw[..n].copy_from_slice(&bytes[..n]);

        let header = Self {
            checksum: raw[0],
            message_type: raw[1],
            payload_len: u16::from_le_bytes([raw[2], raw[3]]),
        };

        // A truncated header is never trusted, even if the padding happens to sum up
        if n < HEADER_SIZE {
            return header.invalidated();
        }
        header
    }

    /// Encode into the first 4 bytes of `out`
    #[inline]
    pub fn write_to(&self, out: &mut [u8]) {
        out[0] = self.checksum;
        out[1] = self.message_type;
        out[2..HEADER_SIZE].copy_from_slice(&self.payload_len.to_le_bytes());
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        self.write_to(&mut out);
        out
    }

    /// Checksum invariant holds
    pub fn is_valid(&self) -> bool {
        (self.checksum as u32 + self.message_type as u32 + self.payload_len as u32)
            % CHECKSUM_MODULUS as u32
            == 0
    }

    /// Known message type, if the header is valid
    pub fn kind(&self) -> Option<MessageType> {
        if self.is_valid() {
            MessageType::from_u8(self.message_type)
        } else {
            None
        }
    }

    /// Header plus payload size in bytes
    pub fn total_len(&self) -> usize {
        HEADER_SIZE + self.payload_len as usize
    }

    // Force the invariant to fail regardless of field values
    fn invalidated(self) -> Self {
        if self.is_valid() {
            Self {
                checksum: self.checksum.wrapping_add(1),
                ..self
            }
        } else {
            self
        }
    }
}

/// Header checksum for a message type and payload length
#[inline]
pub fn checksum(message_type: u8, payload_len: u16) -> u8 {
    let sum = (message_type as u16 % CHECKSUM_MODULUS + payload_len % CHECKSUM_MODULUS)
        % CHECKSUM_MODULUS;
    (CHECKSUM_MODULUS - sum) as u8
}

/// Encode a header for `message_type` with `payload_len` bytes of payload
pub fn encode(message_type: MessageType, payload_len: u16) -> [u8; HEADER_SIZE] {
    FrameHeader::new(message_type, payload_len).to_bytes()
}
