//! Constants for the OVR scent device protocol

// Frame header
pub const HEADER_SIZE: usize = 4; // CHECKSUM(1) + TYPE(1) + LEN(2, little-endian)
pub const CHECKSUM_MODULUS: u16 = 251;

// Serial command record: SLOT(1) + ALGORITHM(1) + INTENSITY(1)
pub const SERIAL_RECORD_SIZE: usize = 3;

// UDP discovery
pub const DEVICE_UDP_PORT: u16 = 4210;
pub const CONNECTION_TIMEOUT_MS: u64 = 2000;
pub const RECEIVE_POLL_MS: u64 = 100;
pub const REPLY_QUEUE_DEPTH: usize = 64;
pub const MAX_DATAGRAM_SIZE: usize = 1024;

// Serial handshake
pub const SERIAL_VERSION_QUERY: &str = "OVR Version Query";
pub const SERIAL_VERSION_SIGNATURE: &str = "OVR version";
pub const SERIAL_MODE_SWITCH: &str = "RunSerial";
pub const SERIAL_BAUD_RATE: u32 = 115200;
pub const SERIAL_READ_TIMEOUT_MS: u64 = 250;
// Serial frames carry a 2-byte big-endian length prefix
pub const SERIAL_LENGTH_PREFIX_SIZE: usize = 2;
// Longest handshake reply line we keep before giving up on the port
pub const MAX_LINE_LENGTH: usize = 256;
// Lines read per handshake while waiting for the signature
pub const MAX_HANDSHAKE_LINES: usize = 16;

// Default device identity
pub const DEFAULT_HOSTNAME: &str = "OVRv0_2_0";
// Capacitor recharge window shared by all slots (microseconds)
pub const RECHARGE_WINDOW_MICROS: u32 = 200_000;
