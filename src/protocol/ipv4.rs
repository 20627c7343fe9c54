//! IPv4 fixed header (RFC 791).

use std::fmt;
use std::net::Ipv4Addr;

use super::read_array;
use crate::error::{BufferError, ProtocolError};
use crate::network::Buffer;

pub const IPV4_HEADER_LEN: usize = 20;

/// Transport protocol numbers shared by IPv4 `protocol` and IPv6
/// `next_header`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpProtocol {
    Icmp,
    Tcp,
    Udp,
    Ipv6,
    Gre,
    Esp,
    Ah,
    Icmpv6,
    Unknown(u8),
}

impl From<u8> for IpProtocol {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Icmp,
            6 => Self::Tcp,
            17 => Self::Udp,
            41 => Self::Ipv6,
            47 => Self::Gre,
            50 => Self::Esp,
            51 => Self::Ah,
            58 => Self::Icmpv6,
            other => Self::Unknown(other),
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(value: IpProtocol) -> Self {
        match value {
            IpProtocol::Icmp => 1,
            IpProtocol::Tcp => 6,
            IpProtocol::Udp => 17,
            IpProtocol::Ipv6 => 41,
            IpProtocol::Gre => 47,
            IpProtocol::Esp => 50,
            IpProtocol::Ah => 51,
            IpProtocol::Icmpv6 => 58,
            IpProtocol::Unknown(other) => other,
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
            known => write!(f, "{known:?}"),
        }
    }
}

/// Decoded IPv4 header. Options are skipped, not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    offset: usize,
    version_ihl: u8,
    type_of_service: u8,
    total_length: u16,
    identification: u16,
    flags_fragment: u16,
    ttl: u8,
    protocol: IpProtocol,
    checksum: u16,
    source: Ipv4Addr,
    destination: Ipv4Addr,
}

impl Ipv4Header {
    pub fn parse(buffer: &mut Buffer<'_>) -> Result<Self, ProtocolError> {
        let offset = buffer.position();
        let version_ihl = buffer.read_u8()?;
        let version = version_ihl >> 4;
        if version != 4 {
            return Err(ProtocolError::InvalidVersion {
                expected: 4,
                found: version,
            });
        }
        let ihl = version_ihl & 0x0F;
        if ihl < 5 {
            return Err(ProtocolError::InvalidHeaderLength(ihl));
        }

        let header = Self {
            offset,
            version_ihl,
            type_of_service: buffer.read_u8()?,
            total_length: buffer.read_u16()?,
            identification: buffer.read_u16()?,
            flags_fragment: buffer.read_u16()?,
            ttl: buffer.read_u8()?,
            protocol: IpProtocol::from(buffer.read_u8()?),
            checksum: buffer.read_u16()?,
            source: Ipv4Addr::from(read_array::<4>(buffer)?),
            destination: Ipv4Addr::from(read_array::<4>(buffer)?),
        };
        buffer.skip(header.header_len() - IPV4_HEADER_LEN)?;
        Ok(header)
    }

    /// The fixed 20 bytes exactly as they were decoded.
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut out = [0u8; IPV4_HEADER_LEN];
        out[0] = self.version_ihl;
        out[1] = self.type_of_service;
        out[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        out[4..6].copy_from_slice(&self.identification.to_be_bytes());
        out[6..8].copy_from_slice(&self.flags_fragment.to_be_bytes());
        out[8] = self.ttl;
        out[9] = self.protocol.into();
        out[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        out[12..16].copy_from_slice(&self.source.octets());
        out[16..20].copy_from_slice(&self.destination.octets());
        out
    }

    /// Serialize the fixed header at the buffer cursor.
    pub fn write(&mut self, buffer: &mut Buffer<'_>) -> Result<(), BufferError> {
        let offset = buffer.position();
        buffer.write_bytes(&self.to_bytes())?;
        self.offset = offset;
        Ok(())
    }

    /// RFC 1071 checksum of the fixed header with the checksum field zeroed.
    pub fn compute_checksum(&self) -> u16 {
        let mut bytes = self.to_bytes();
        bytes[10] = 0;
        bytes[11] = 0;
        let mut sum: u32 = bytes
            .chunks_exact(2)
            .map(|pair| u32::from(u16::from_be_bytes([pair[0], pair[1]])))
            .sum();
        while sum > 0xFFFF {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        !(sum as u16)
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.compute_checksum() == self.checksum
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    /// Header length in bytes, from the IHL nibble.
    pub const fn header_len(&self) -> usize {
        (self.version_ihl & 0x0F) as usize * 4
    }

    pub const fn type_of_service(&self) -> u8 {
        self.type_of_service
    }

    pub const fn total_length(&self) -> u16 {
        self.total_length
    }

    pub const fn identification(&self) -> u16 {
        self.identification
    }

    pub const fn flags(&self) -> u8 {
        (self.flags_fragment >> 13) as u8
    }

    pub const fn fragment_offset(&self) -> u16 {
        self.flags_fragment & 0x1FFF
    }

    pub const fn ttl(&self) -> u8 {
        self.ttl
    }

    pub const fn protocol(&self) -> IpProtocol {
        self.protocol
    }

    pub const fn checksum(&self) -> u16 {
        self.checksum
    }

    pub const fn source(&self) -> Ipv4Addr {
        self.source
    }

    pub const fn destination(&self) -> Ipv4Addr {
        self.destination
    }
}
