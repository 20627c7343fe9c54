//! Error types for the taplink responder.

use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Main error type for taplink operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Out-of-range access on a [`Buffer`](crate::network::Buffer).
///
/// `missing` is the signed number of bytes the operation lacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("read past end of valid data, {missing} byte(s) missing")]
    Read { missing: i64 },

    #[error("write past end of capacity, {missing} byte(s) missing")]
    Write { missing: i64 },

    #[error("invalid varint marker byte {first:#04x}")]
    InvalidVarint { first: u8 },

    #[error("value {0} does not fit in an 8 byte varint")]
    VarintOverflow(u64),

    #[error("integer width must be 1 to 8 bytes, got {0}")]
    InvalidWidth(usize),

    #[error("initial length {len} exceeds storage of {capacity} byte(s)")]
    InvalidLength { len: usize, capacity: usize },
}

/// Malformed or unsupported wire data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unsupported ether type {0:#06x}")]
    UnsupportedEtherType(u16),

    #[error("IPv6 payload length is {declared} but {actual} byte(s) follow the header")]
    PayloadLengthMismatch { declared: u16, actual: usize },

    #[error("invalid ARP address lengths (hardware {hardware}, protocol {protocol})")]
    InvalidArpAddressLength { hardware: u8, protocol: u8 },

    #[error("{remaining} unexpected trailing byte(s) after header")]
    TrailingBytes { remaining: usize },

    #[error("invalid IP version, expected {expected} found {found}")]
    InvalidVersion { expected: u8, found: u8 },

    #[error("invalid IPv4 header length {0}")]
    InvalidHeaderLength(u8),

    #[error("frame does not carry an ARP header")]
    NotArp,

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// A protocol error tied to the frame it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("frame #{index} rejected at offset {offset} of {len}: {source}")]
pub struct FrameError {
    pub index: u64,
    pub offset: usize,
    pub len: usize,
    #[source]
    pub source: ProtocolError,
}

/// Malformed manual injection input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    #[error("empty injection line")]
    Empty,

    #[error("odd number of hex digits ({0})")]
    OddLength(usize),

    #[error("invalid hex digit {found:?} at position {position}")]
    InvalidDigit { position: usize, found: char },
}

/// Device setup errors. These are fatal for the binary.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open TAP device {name:?}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to determine MAC address of {name:?}: {reason}")]
    MacUnavailable { name: String, reason: String },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("interface name cannot be empty")]
    EmptyInterface,

    #[error("interface name {name:?} is longer than 15 characters")]
    InterfaceNameTooLong { name: String },

    #[error("rebroadcast_cooldown_ms must be greater than 0")]
    ZeroRebroadcastCooldown,

    #[error("idle_backoff_ms must be greater than 0")]
    ZeroIdleBackoff,

    #[error("report_interval_secs must be greater than 0")]
    ZeroReportInterval,

    #[error("local_ip {ip} is not a usable host address")]
    UnusableLocalIp { ip: Ipv4Addr },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Config(ConfigError::Validation(err))
    }
}
