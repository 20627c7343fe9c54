//! Address Resolution Protocol (RFC 826).
//!
//! Hardware and protocol address widths are read from the header itself and
//! may each be 1 to 16 bytes long. Only the reply mutators insist on 6-byte
//! Ethernet hardware addresses.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use pnet::util::MacAddr;

use super::ethernet::EtherType;
use super::{mac_from_octets, mac_octets};
use crate::error::{BufferError, ProtocolError};
use crate::network::Buffer;

/// Bytes before the first address: types, lengths and operation.
pub const ARP_FIXED_LEN: usize = 8;
/// Length of an Ethernet/IPv4 ARP body.
pub const ARP_IPV4_LEN: usize = 28;
pub const MAX_ADDR_LEN: usize = 16;
pub const HARDWARE_TYPE_ETHERNET: u16 = 1;
/// Hardware address length of Ethernet MACs.
pub const ETHERNET_ADDR_LEN: u8 = 6;

const OPERATION_OFFSET: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArpOperation {
    Request,
    Reply,
    ReverseRequest,
    ReverseReply,
    InverseRequest,
    InverseReply,
    Nak,
    Unknown(u16),
}

impl From<u16> for ArpOperation {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::Request,
            2 => Self::Reply,
            3 => Self::ReverseRequest,
            4 => Self::ReverseReply,
            8 => Self::InverseRequest,
            9 => Self::InverseReply,
            10 => Self::Nak,
            other => Self::Unknown(other),
        }
    }
}

impl From<ArpOperation> for u16 {
    fn from(value: ArpOperation) -> Self {
        match value {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::ReverseRequest => 3,
            ArpOperation::ReverseReply => 4,
            ArpOperation::InverseRequest => 8,
            ArpOperation::InverseReply => 9,
            ArpOperation::Nak => 10,
            ArpOperation::Unknown(other) => other,
        }
    }
}

/// A hardware or protocol address of up to 16 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArpAddr {
    bytes: [u8; MAX_ADDR_LEN],
    len: u8,
}

impl ArpAddr {
    /// `None` when `bytes` is empty or longer than 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > MAX_ADDR_LEN {
            return None;
        }
        let mut out = [0u8; MAX_ADDR_LEN];
        out[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            bytes: out,
            len: bytes.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    pub const fn len(&self) -> u8 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_mac(&self) -> Option<MacAddr> {
        let octets: [u8; 6] = self.as_bytes().try_into().ok()?;
        Some(mac_from_octets(octets))
    }

    pub fn to_ipv4(&self) -> Option<Ipv4Addr> {
        let octets: [u8; 4] = self.as_bytes().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    /// IPv4 for 4-byte addresses, IPv6 for 16-byte addresses.
    pub fn to_ip(&self) -> Option<IpAddr> {
        match self.len {
            4 => self.to_ipv4().map(IpAddr::V4),
            16 => {
                let octets: [u8; 16] = self.as_bytes().try_into().ok()?;
                Some(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            _ => None,
        }
    }
}

impl From<MacAddr> for ArpAddr {
    fn from(mac: MacAddr) -> Self {
        let mut bytes = [0u8; MAX_ADDR_LEN];
        bytes[..6].copy_from_slice(&mac_octets(mac));
        Self { bytes, len: 6 }
    }
}

impl From<Ipv4Addr> for ArpAddr {
    fn from(ip: Ipv4Addr) -> Self {
        let mut bytes = [0u8; MAX_ADDR_LEN];
        bytes[..4].copy_from_slice(&ip.octets());
        Self { bytes, len: 4 }
    }
}

impl From<Ipv6Addr> for ArpAddr {
    fn from(ip: Ipv6Addr) -> Self {
        Self {
            bytes: ip.octets(),
            len: 16,
        }
    }
}

impl fmt::Display for ArpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(mac) = self.to_mac() {
            return write!(f, "{mac}");
        }
        match self.to_ip() {
            Some(ip) => write!(f, "{ip}"),
            None => f.write_str(&crate::network::to_hex(self.as_bytes())),
        }
    }
}

impl fmt::Debug for ArpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArpAddr({self})")
    }
}

/// Decoded ARP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpHeader {
    offset: usize,
    hardware_type: u16,
    protocol_type: EtherType,
    hardware_len: u8,
    protocol_len: u8,
    operation: ArpOperation,
    sender_hw: ArpAddr,
    sender_proto: ArpAddr,
    target_hw: ArpAddr,
    target_proto: ArpAddr,
}

impl ArpHeader {
    /// Ethernet/IPv4 header, ready to be written.
    pub fn ipv4(
        operation: ArpOperation,
        sender_hw: MacAddr,
        sender_ip: Ipv4Addr,
        target_hw: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            offset: 0,
            hardware_type: HARDWARE_TYPE_ETHERNET,
            protocol_type: EtherType::Ipv4,
            hardware_len: ETHERNET_ADDR_LEN,
            protocol_len: 4,
            operation,
            sender_hw: sender_hw.into(),
            sender_proto: sender_ip.into(),
            target_hw: target_hw.into(),
            target_proto: target_ip.into(),
        }
    }

    /// Decode the header at the buffer cursor, sizing address reads from
    /// the embedded length fields.
    pub fn parse(buffer: &mut Buffer<'_>) -> Result<Self, ProtocolError> {
        let offset = buffer.position();
        let hardware_type = buffer.read_u16()?;
        let protocol_type = EtherType::from(buffer.read_u16()?);
        let hardware_len = buffer.read_u8()?;
        let protocol_len = buffer.read_u8()?;
        let invalid = ProtocolError::InvalidArpAddressLength {
            hardware: hardware_len,
            protocol: protocol_len,
        };
        if !valid_addr_len(hardware_len) || !valid_addr_len(protocol_len) {
            return Err(invalid);
        }
        let operation = ArpOperation::from(buffer.read_u16()?);
        let sender_hw = read_addr(buffer, hardware_len, &invalid)?;
        let sender_proto = read_addr(buffer, protocol_len, &invalid)?;
        let target_hw = read_addr(buffer, hardware_len, &invalid)?;
        let target_proto = read_addr(buffer, protocol_len, &invalid)?;

        Ok(Self {
            offset,
            hardware_type,
            protocol_type,
            hardware_len,
            protocol_len,
            operation,
            sender_hw,
            sender_proto,
            target_hw,
            target_proto,
        })
    }

    /// Serialize at the buffer cursor. Later mutators patch this location.
    pub fn write(&mut self, buffer: &mut Buffer<'_>) -> Result<(), BufferError> {
        let offset = buffer.position();
        buffer.write_u16(self.hardware_type)?;
        buffer.write_u16(self.protocol_type.into())?;
        buffer.write_u8(self.hardware_len)?;
        buffer.write_u8(self.protocol_len)?;
        buffer.write_u16(self.operation.into())?;
        buffer.write_bytes(self.sender_hw.as_bytes())?;
        buffer.write_bytes(self.sender_proto.as_bytes())?;
        buffer.write_bytes(self.target_hw.as_bytes())?;
        buffer.write_bytes(self.target_proto.as_bytes())?;
        self.offset = offset;
        Ok(())
    }

    /// Size of this header on the wire.
    pub fn wire_len(&self) -> usize {
        ARP_FIXED_LEN + 2 * usize::from(self.hardware_len) + 2 * usize::from(self.protocol_len)
    }

    /// Whether hardware addresses are Ethernet MACs, the only kind a reply
    /// can be built for.
    pub fn has_ethernet_addrs(&self) -> bool {
        self.hardware_len == ETHERNET_ADDR_LEN
    }

    fn sender_hw_offset(&self) -> usize {
        self.offset + ARP_FIXED_LEN
    }

    fn sender_proto_offset(&self) -> usize {
        self.sender_hw_offset() + usize::from(self.hardware_len)
    }

    fn target_hw_offset(&self) -> usize {
        self.sender_proto_offset() + usize::from(self.protocol_len)
    }

    fn target_proto_offset(&self) -> usize {
        self.target_hw_offset() + usize::from(self.hardware_len)
    }

    fn check_hardware_len(&self) -> Result<(), ProtocolError> {
        if self.has_ethernet_addrs() {
            Ok(())
        } else {
            Err(ProtocolError::InvalidArpAddressLength {
                hardware: self.hardware_len,
                protocol: self.protocol_len,
            })
        }
    }

    fn check_protocol_len(&self, addr: &ArpAddr) -> Result<(), ProtocolError> {
        if addr.len() == self.protocol_len {
            Ok(())
        } else {
            Err(ProtocolError::InvalidArpAddressLength {
                hardware: self.hardware_len,
                protocol: addr.len(),
            })
        }
    }

    pub fn set_operation(
        &mut self,
        buffer: &mut Buffer<'_>,
        operation: ArpOperation,
    ) -> Result<(), BufferError> {
        buffer.write_u16_at(self.offset + OPERATION_OFFSET, operation.into())?;
        self.operation = operation;
        Ok(())
    }

    /// Overwrite the sender MAC. Fails unless hardware addresses are 6 bytes.
    pub fn set_sender_hw(&mut self, buffer: &mut Buffer<'_>, mac: MacAddr) -> Result<(), ProtocolError> {
        self.check_hardware_len()?;
        buffer.write_bytes_at(self.sender_hw_offset(), &mac_octets(mac))?;
        self.sender_hw = mac.into();
        Ok(())
    }

    /// Overwrite the sender protocol address. Its length must match the
    /// header's protocol address length.
    pub fn set_sender_proto(
        &mut self,
        buffer: &mut Buffer<'_>,
        addr: ArpAddr,
    ) -> Result<(), ProtocolError> {
        self.check_protocol_len(&addr)?;
        buffer.write_bytes_at(self.sender_proto_offset(), addr.as_bytes())?;
        self.sender_proto = addr;
        Ok(())
    }

    pub fn set_target_hw(&mut self, buffer: &mut Buffer<'_>, mac: MacAddr) -> Result<(), ProtocolError> {
        self.check_hardware_len()?;
        buffer.write_bytes_at(self.target_hw_offset(), &mac_octets(mac))?;
        self.target_hw = mac.into();
        Ok(())
    }

    pub fn set_target_proto(
        &mut self,
        buffer: &mut Buffer<'_>,
        addr: ArpAddr,
    ) -> Result<(), ProtocolError> {
        self.check_protocol_len(&addr)?;
        buffer.write_bytes_at(self.target_proto_offset(), addr.as_bytes())?;
        self.target_proto = addr;
        Ok(())
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn hardware_type(&self) -> u16 {
        self.hardware_type
    }

    pub const fn protocol_type(&self) -> EtherType {
        self.protocol_type
    }

    pub const fn hardware_len(&self) -> u8 {
        self.hardware_len
    }

    pub const fn protocol_len(&self) -> u8 {
        self.protocol_len
    }

    pub const fn operation(&self) -> ArpOperation {
        self.operation
    }

    pub const fn sender_hw(&self) -> ArpAddr {
        self.sender_hw
    }

    /// Sender hardware address as a MAC, when it is 6 bytes long.
    pub fn sender_mac(&self) -> Option<MacAddr> {
        self.sender_hw.to_mac()
    }

    pub const fn sender_proto(&self) -> ArpAddr {
        self.sender_proto
    }

    pub const fn target_hw(&self) -> ArpAddr {
        self.target_hw
    }

    pub fn target_mac(&self) -> Option<MacAddr> {
        self.target_hw.to_mac()
    }

    pub const fn target_proto(&self) -> ArpAddr {
        self.target_proto
    }
}

fn valid_addr_len(len: u8) -> bool {
    (1..=MAX_ADDR_LEN).contains(&usize::from(len))
}

fn read_addr(
    buffer: &mut Buffer<'_>,
    len: u8,
    invalid: &ProtocolError,
) -> Result<ArpAddr, ProtocolError> {
    let bytes = buffer.read_bytes(usize::from(len))?;
    ArpAddr::from_slice(bytes).ok_or_else(|| invalid.clone())
}

#[cfg(test)]
mod tests {
    use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
    use pnet::packet::ethernet::EtherTypes;

    use super::*;

    fn pnet_request() -> [u8; ARP_IPV4_LEN] {
        let mut body = [0u8; ARP_IPV4_LEN];
        {
            let mut arp = MutableArpPacket::new(&mut body).unwrap();
            arp.set_hardware_type(ArpHardwareTypes::Ethernet);
            arp.set_protocol_type(EtherTypes::Ipv4);
            arp.set_hw_addr_len(6);
            arp.set_proto_addr_len(4);
            arp.set_operation(ArpOperations::Request);
            arp.set_sender_hw_addr(MacAddr::new(1, 2, 3, 4, 5, 6));
            arp.set_sender_proto_addr(Ipv4Addr::new(10, 0, 0, 1));
            arp.set_target_hw_addr(MacAddr::zero());
            arp.set_target_proto_addr(Ipv4Addr::new(10, 0, 0, 2));
        }
        body
    }

    #[test]
    fn should_parse_request_built_by_pnet() {
        let body = pnet_request();
        let mut buffer = Buffer::from_slice(&body);
        let header = ArpHeader::parse(&mut buffer).unwrap();

        assert_eq!(header.hardware_type(), HARDWARE_TYPE_ETHERNET);
        assert_eq!(header.protocol_type(), EtherType::Ipv4);
        assert_eq!(header.operation(), ArpOperation::Request);
        assert_eq!(header.sender_mac(), Some(MacAddr::new(1, 2, 3, 4, 5, 6)));
        assert!(header.has_ethernet_addrs());
        assert_eq!(
            header.sender_proto().to_ipv4(),
            Some(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(
            header.target_proto().to_ipv4(),
            Some(Ipv4Addr::new(10, 0, 0, 2))
        );
        assert_eq!(header.wire_len(), ARP_IPV4_LEN);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn should_size_addresses_from_length_fields() {
        let mut buffer = Buffer::growable(64);
        let mut header = ArpHeader::ipv4(
            ArpOperation::Request,
            MacAddr::new(1, 1, 1, 1, 1, 1),
            Ipv4Addr::UNSPECIFIED,
            MacAddr::zero(),
            Ipv4Addr::UNSPECIFIED,
        );
        header.write(&mut buffer).unwrap();
        // Widen to 16-byte protocol addresses.
        buffer.write_bytes_at(5, &[16]).unwrap();
        buffer.seek(14).unwrap();
        let v6 = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
        buffer.write_bytes(&v6.octets()).unwrap();
        buffer.write_bytes(&[0; 6]).unwrap();
        buffer.write_bytes(&v6.octets()).unwrap();

        buffer.seek(0).unwrap();
        let parsed = ArpHeader::parse(&mut buffer).unwrap();
        assert_eq!(parsed.protocol_len(), 16);
        assert_eq!(parsed.sender_proto().to_ip(), Some(IpAddr::V6(v6)));
        assert_eq!(parsed.wire_len(), 52);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn should_reject_invalid_address_lengths() {
        let mut body = pnet_request();
        body[4] = 0;
        let mut buffer = Buffer::from_slice(&body);
        assert_eq!(
            ArpHeader::parse(&mut buffer),
            Err(ProtocolError::InvalidArpAddressLength {
                hardware: 0,
                protocol: 4
            })
        );

        let mut body = pnet_request();
        body[4] = 17;
        let mut buffer = Buffer::from_slice(&body);
        assert!(matches!(
            ArpHeader::parse(&mut buffer),
            Err(ProtocolError::InvalidArpAddressLength { hardware: 17, .. })
        ));

        let mut body = pnet_request();
        body[5] = 17;
        let mut buffer = Buffer::from_slice(&body);
        assert!(matches!(
            ArpHeader::parse(&mut buffer),
            Err(ProtocolError::InvalidArpAddressLength { protocol: 17, .. })
        ));
    }

    #[test]
    fn should_fail_on_truncated_addresses() {
        let body = pnet_request();
        let mut buffer = Buffer::from_slice(&body[..24]);
        assert_eq!(
            ArpHeader::parse(&mut buffer),
            Err(ProtocolError::Buffer(BufferError::Read { missing: 4 }))
        );
    }

    #[test]
    fn should_turn_request_into_reply_in_place() {
        let body = pnet_request();
        let mut buffer = Buffer::from_slice(&body);
        let mut header = ArpHeader::parse(&mut buffer).unwrap();
        let ours = MacAddr::new(0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa);

        header.set_operation(&mut buffer, ArpOperation::Reply).unwrap();
        let requester = header.sender_mac().unwrap();
        header.set_target_hw(&mut buffer, requester).unwrap();
        header
            .set_target_proto(&mut buffer, header.sender_proto())
            .unwrap();
        header.set_sender_hw(&mut buffer, ours).unwrap();
        header
            .set_sender_proto(&mut buffer, Ipv4Addr::new(10, 0, 0, 2).into())
            .unwrap();
        assert_eq!(buffer.position(), ARP_IPV4_LEN);

        let reply = ArpPacket::new(buffer.as_slice()).unwrap();
        assert_eq!(reply.get_operation(), ArpOperations::Reply);
        assert_eq!(reply.get_sender_hw_addr(), ours);
        assert_eq!(reply.get_sender_proto_addr(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(reply.get_target_hw_addr(), MacAddr::new(1, 2, 3, 4, 5, 6));
        assert_eq!(reply.get_target_proto_addr(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn should_reject_protocol_address_of_wrong_length() {
        let body = pnet_request();
        let mut buffer = Buffer::from_slice(&body);
        let mut header = ArpHeader::parse(&mut buffer).unwrap();
        let result = header.set_sender_proto(&mut buffer, Ipv6Addr::LOCALHOST.into());
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidArpAddressLength { protocol: 16, .. })
        ));
        assert_eq!(buffer.as_slice(), &body);
    }

    #[test]
    fn should_write_exact_inverse_of_parse() {
        let body = pnet_request();
        let mut input = Buffer::from_slice(&body);
        let mut header = ArpHeader::parse(&mut input).unwrap();

        let mut output = Buffer::fixed(ARP_IPV4_LEN);
        header.write(&mut output).unwrap();
        assert_eq!(output.as_slice(), &body);
    }

    #[test]
    fn should_round_trip_operation_codes() {
        for code in [1u16, 2, 3, 4, 8, 9, 10, 42] {
            assert_eq!(u16::from(ArpOperation::from(code)), code);
        }
        assert_eq!(ArpOperation::from(42), ArpOperation::Unknown(42));
    }

    fn wide_hardware_request() -> Vec<u8> {
        let mut body = vec![0x00, 0x06, 0x08, 0x00, 8, 4, 0x00, 0x01];
        body.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        body.extend_from_slice(&[10, 0, 0, 1]);
        body.extend_from_slice(&[0; 8]);
        body.extend_from_slice(&[10, 0, 0, 2]);
        body
    }

    #[test]
    fn should_size_hardware_addresses_from_length_field() {
        let body = wide_hardware_request();
        let mut buffer = Buffer::from_slice(&body);
        let mut header = ArpHeader::parse(&mut buffer).unwrap();

        assert_eq!(header.hardware_len(), 8);
        assert!(!header.has_ethernet_addrs());
        assert_eq!(header.sender_hw().as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(header.sender_mac(), None);
        assert_eq!(
            header.target_proto().to_ipv4(),
            Some(Ipv4Addr::new(10, 0, 0, 2))
        );
        assert_eq!(header.wire_len(), 32);
        assert_eq!(buffer.remaining(), 0);

        header
            .set_target_proto(&mut buffer, Ipv4Addr::new(10, 0, 0, 9).into())
            .unwrap();
        assert_eq!(&buffer.as_slice()[28..], &[10, 0, 0, 9]);

        let mut output = Buffer::fixed(32);
        header.write(&mut output).unwrap();
        assert_eq!(output.as_slice(), buffer.as_slice());
    }

    #[test]
    fn should_refuse_mac_on_non_ethernet_hardware_length() {
        let body = wide_hardware_request();
        let mut buffer = Buffer::from_slice(&body);
        let mut header = ArpHeader::parse(&mut buffer).unwrap();

        let result = header.set_sender_hw(&mut buffer, MacAddr::new(0xaa, 0, 0, 0, 0, 1));
        assert_eq!(
            result,
            Err(ProtocolError::InvalidArpAddressLength {
                hardware: 8,
                protocol: 4
            })
        );
        assert_eq!(buffer.as_slice(), body.as_slice());
    }
}
