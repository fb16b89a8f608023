//! Core data types for odorant commands.
//!
//! Key types for gateway implementers:
//! - [`OdorantCommand`]: One slot/algorithm/intensity request, backed by its wire record
//! - [`Algorithm`]: Device-side rendering mode
//! - [`OdorantConfig`]: Static name/slot binding an odorant producer is configured with

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slot value reserved for odorants that are not mapped to a device output
pub const UNUSED_SLOT: u8 = 255;

/// Device-side rendering mode for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Algorithm {
    /// Short, high-intensity release
    Burst = 0,
    /// Sustained low-level release
    Ambient = 1,
}

impl Algorithm {
    /// Decode a wire byte; unknown codes yield `None`
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Algorithm::Burst),
            1 => Some(Algorithm::Ambient),
            _ => None,
        }
    }

    /// Name used in CSV output
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Burst => "Burst",
            Algorithm::Ambient => "Ambient",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "burst" | "0" => Ok(Algorithm::Burst),
            "ambient" | "1" => Ok(Algorithm::Ambient),
            other => Err(Error::InvalidParameter(format!("unknown algorithm '{}'", other))),
        }
    }
}

/// Static odorant binding: display name plus the device slot it renders on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OdorantConfig {
    pub name: String,
    pub slot: u8,
}

/// A single odorant command.
///
/// The slot, algorithm and intensity live directly in the 4-byte wire record
/// `[slot, algorithm, intensity_lo, intensity_hi]`, so setters mutate the
/// bytes that get sent and serialization is a borrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdorantCommand {
    name: String,
    record: [u8; OdorantCommand::SIZE],
}

impl OdorantCommand {
    /// Size of the wire record in bytes
    pub const SIZE: usize = 4;

    /// Create a command
    pub fn new(name: impl Into<String>, slot: u8, algorithm: Algorithm, intensity: u16) -> Self {
        let mut cmd = Self {
            name: name.into(),
            record: [0u8; Self::SIZE],
        };
        cmd.set_slot(slot);
        cmd.set_algorithm(algorithm);
        cmd.set_intensity(intensity);
        cmd
    }

    /// Create a command bound to a configured odorant
    pub fn from_config(config: &OdorantConfig, algorithm: Algorithm, intensity: u16) -> Self {
        Self::new(config.name.clone(), config.slot, algorithm, intensity)
    }

    /// Rebuild a command from its wire record (the name is not on the wire)
    pub fn from_bytes(record: [u8; Self::SIZE]) -> Self {
        Self {
            name: String::new(),
            record,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn slot(&self) -> u8 {
        self.record[0]
    }

    #[inline]
    pub fn set_slot(&mut self, slot: u8) {
        self.record[0] = slot;
    }

    /// Raw algorithm byte as carried on the wire
    #[inline]
    pub fn algorithm_code(&self) -> u8 {
        self.record[1]
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        Algorithm::from_u8(self.record[1])
    }

    #[inline]
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.record[1] = algorithm as u8;
    }

    #[inline]
    pub fn intensity(&self) -> u16 {
        u16::from_le_bytes([self.record[2], self.record[3]])
    }

    #[inline]
    pub fn set_intensity(&mut self, intensity: u16) {
        self.record[2..4].copy_from_slice(&intensity.to_le_bytes());
    }

    /// Intensity as carried by the single-byte serial record (saturating)
    #[inline]
    pub fn serial_intensity(&self) -> u8 {
        self.intensity().min(u8::MAX as u16) as u8
    }

    /// Wire record
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.record
    }

    /// True when the command targets the "no slot" sentinel
    pub fn is_unused(&self) -> bool {
        self.slot() == UNUSED_SLOT
    }

    /// CSV row `name,slot,algorithm,intensity` with a 1-based slot
    pub fn to_csv(&self) -> String {
        let algorithm = self.algorithm().unwrap_or(Algorithm::Burst);
        format!(
            "{},{},{},{}",
            self.name,
            self.slot() as u16 + 1,
            algorithm.as_str(),
            self.intensity()
        )
    }
}

impl fmt::Display for OdorantCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N:{} S:{} A:{} I:{}",
            self.name,
            self.slot(),
            self.algorithm_code(),
            self.intensity()
        )
    }
}

/// Parses `name,slot,algorithm,intensity` (0-based slot), the daemon's stdin format
impl FromStr for OdorantCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [name, slot, algorithm, intensity] = fields.as_slice() else {
            return Err(Error::InvalidParameter(format!(
                "expected 4 fields, got {}",
                fields.len()
            )));
        };

        let slot: u8 = slot
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("bad slot '{}'", slot)))?;
        let algorithm: Algorithm = algorithm.parse()?;
        let intensity: u16 = intensity
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("bad intensity '{}'", intensity)))?;

        Ok(Self::new(*name, slot, algorithm, intensity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_write_wire_record() {
        let mut cmd = OdorantCommand::new("pine", 3, Algorithm::Burst, 0);
        cmd.set_intensity(0x1234);
        cmd.set_algorithm(Algorithm::Ambient);
        assert_eq!(cmd.as_bytes(), &[3, 1, 0x34, 0x12]);
    }

    #[test]
    fn test_record_round_trip() {
        let cmd = OdorantCommand::new("smoke", 7, Algorithm::Ambient, 513);
        let back = OdorantCommand::from_bytes(*cmd.as_bytes());
        assert_eq!(back.slot(), 7);
        assert_eq!(back.algorithm(), Some(Algorithm::Ambient));
        assert_eq!(back.intensity(), 513);
        assert_eq!(back.name(), "");
    }

    #[test]
    fn test_from_config() {
        let config = OdorantConfig {
            name: "ocean".to_string(),
            slot: 4,
        };
        let cmd = OdorantCommand::from_config(&config, Algorithm::Burst, 0);
        assert_eq!(cmd.name(), "ocean");
        assert_eq!(cmd.slot(), 4);
        assert_eq!(cmd.intensity(), 0);
    }

    #[test]
    fn test_serial_intensity_saturates() {
        assert_eq!(
            OdorantCommand::new("a", 0, Algorithm::Burst, 200).serial_intensity(),
            200
        );
        assert_eq!(
            OdorantCommand::new("a", 0, Algorithm::Burst, 700).serial_intensity(),
            255
        );
    }

    #[test]
    fn test_display_and_csv() {
        let cmd = OdorantCommand::new("lavender", 0, Algorithm::Ambient, 128);
        assert_eq!(cmd.to_string(), "N:lavender S:0 A:1 I:128");
        assert_eq!(cmd.to_csv(), "lavender,1,Ambient,128");
    }

    #[test]
    fn test_unused_slot() {
        assert!(OdorantCommand::new("none", UNUSED_SLOT, Algorithm::Burst, 10).is_unused());
        assert!(!OdorantCommand::new("some", 254, Algorithm::Burst, 10).is_unused());
    }

    #[test]
    fn test_parse_line() {
        let cmd: OdorantCommand = "grass, 2, ambient, 90".parse().unwrap();
        assert_eq!(cmd.name(), "grass");
        assert_eq!(cmd.slot(), 2);
        assert_eq!(cmd.algorithm(), Some(Algorithm::Ambient));
        assert_eq!(cmd.intensity(), 90);

        assert!("grass,2,ambient".parse::<OdorantCommand>().is_err());
        assert!("grass,300,burst,1".parse::<OdorantCommand>().is_err());
        assert!("grass,1,swirl,1".parse::<OdorantCommand>().is_err());
    }
}
