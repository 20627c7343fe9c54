//! IPv6 fixed header (RFC 8200).

use std::net::Ipv6Addr;

use super::ipv4::IpProtocol;
use super::read_array;
use crate::error::{BufferError, ProtocolError};
use crate::network::Buffer;

pub const IPV6_HEADER_LEN: usize = 40;

/// Decoded IPv6 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    offset: usize,
    version_class_flow: u32,
    payload_length: u16,
    next_header: IpProtocol,
    hop_limit: u8,
    source: Ipv6Addr,
    destination: Ipv6Addr,
}

impl Ipv6Header {
    /// Decode the header and check that exactly `payload_length` bytes
    /// follow it in the buffer. Extension headers count as payload.
    pub fn parse(buffer: &mut Buffer<'_>) -> Result<Self, ProtocolError> {
        let offset = buffer.position();
        let version_class_flow = buffer.read_u32()?;
        let version = (version_class_flow >> 28) as u8;
        if version != 6 {
            return Err(ProtocolError::InvalidVersion {
                expected: 6,
                found: version,
            });
        }
        let payload_length = buffer.read_u16()?;
        let next_header = IpProtocol::from(buffer.read_u8()?);
        let hop_limit = buffer.read_u8()?;
        let source = Ipv6Addr::from(read_array::<16>(buffer)?);
        let destination = Ipv6Addr::from(read_array::<16>(buffer)?);

        let actual = buffer.remaining();
        if actual != usize::from(payload_length) {
            return Err(ProtocolError::PayloadLengthMismatch {
                declared: payload_length,
                actual,
            });
        }

        Ok(Self {
            offset,
            version_class_flow,
            payload_length,
            next_header,
            hop_limit,
            source,
            destination,
        })
    }

    /// Serialize at the buffer cursor.
    pub fn write(&mut self, buffer: &mut Buffer<'_>) -> Result<(), BufferError> {
        let offset = buffer.position();
        buffer.write_u32(self.version_class_flow)?;
        buffer.write_u16(self.payload_length)?;
        buffer.write_u8(self.next_header.into())?;
        buffer.write_u8(self.hop_limit)?;
        buffer.write_bytes(&self.source.octets())?;
        buffer.write_bytes(&self.destination.octets())?;
        self.offset = offset;
        Ok(())
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn version(&self) -> u8 {
        (self.version_class_flow >> 28) as u8
    }

    pub const fn traffic_class(&self) -> u8 {
        (self.version_class_flow >> 20) as u8
    }

    pub const fn flow_label(&self) -> u32 {
        self.version_class_flow & 0x000F_FFFF
    }

    pub const fn payload_length(&self) -> u16 {
        self.payload_length
    }

    pub const fn next_header(&self) -> IpProtocol {
        self.next_header
    }

    pub const fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    pub const fn source(&self) -> Ipv6Addr {
        self.source
    }

    pub const fn destination(&self) -> Ipv6Addr {
        self.destination
    }
}
