//! Ethernet II framing.

use std::fmt;

use pnet::util::MacAddr;

use super::{mac_octets, read_mac};
use crate::error::{BufferError, ProtocolError};
use crate::network::Buffer;

/// Size of the Ethernet II header.
pub const ETHERNET_HEADER_LEN: usize = 14;
/// Largest untagged frame without FCS.
pub const ETHERNET_MAX_FRAME_LEN: usize = 1518;
/// Smallest frame without FCS; shorter payloads are zero padded up to it.
pub const ETHERNET_MIN_FRAME_LEN: usize = 60;

pub const BROADCAST_MAC: MacAddr = MacAddr(0xff, 0xff, 0xff, 0xff, 0xff, 0xff);

/// Encapsulated protocol identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtherType {
    Ipv4,
    Arp,
    WakeOnLan,
    X25,
    Vlan,
    Ipx,
    Ipv6,
    FlowControl,
    MplsUnicast,
    MplsMulticast,
    PppoeDiscovery,
    PppoeSession,
    MacSec,
    Lldp,
    Ptp,
    Unknown(u16),
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            0x0800 => Self::Ipv4,
            0x0806 => Self::Arp,
            0x0842 => Self::WakeOnLan,
            0x0805 => Self::X25,
            0x8100 => Self::Vlan,
            0x8137 => Self::Ipx,
            0x86DD => Self::Ipv6,
            0x8808 => Self::FlowControl,
            0x8847 => Self::MplsUnicast,
            0x8848 => Self::MplsMulticast,
            0x8863 => Self::PppoeDiscovery,
            0x8864 => Self::PppoeSession,
            0x88E5 => Self::MacSec,
            0x88CC => Self::Lldp,
            0x88F7 => Self::Ptp,
            other => Self::Unknown(other),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(value: EtherType) -> Self {
        match value {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::WakeOnLan => 0x0842,
            EtherType::X25 => 0x0805,
            EtherType::Vlan => 0x8100,
            EtherType::Ipx => 0x8137,
            EtherType::Ipv6 => 0x86DD,
            EtherType::FlowControl => 0x8808,
            EtherType::MplsUnicast => 0x8847,
            EtherType::MplsMulticast => 0x8848,
            EtherType::PppoeDiscovery => 0x8863,
            EtherType::PppoeSession => 0x8864,
            EtherType::MacSec => 0x88E5,
            EtherType::Lldp => 0x88CC,
            EtherType::Ptp => 0x88F7,
            EtherType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "unknown({raw:#06x})"),
            known => write!(f, "{known:?}"),
        }
    }
}

/// Decoded Ethernet II header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    offset: usize,
    destination: MacAddr,
    source: MacAddr,
    ether_type: EtherType,
}

impl EthernetHeader {
    pub const fn new(destination: MacAddr, source: MacAddr, ether_type: EtherType) -> Self {
        Self {
            offset: 0,
            destination,
            source,
            ether_type,
        }
    }

    /// Decode the header at the buffer cursor.
    pub fn parse(buffer: &mut Buffer<'_>) -> Result<Self, ProtocolError> {
        let offset = buffer.position();
        let destination = read_mac(buffer)?;
        let source = read_mac(buffer)?;
        let ether_type = EtherType::from(buffer.read_u16()?);
        Ok(Self {
            offset,
            destination,
            source,
            ether_type,
        })
    }

    /// Serialize at the buffer cursor. Later mutators patch this location.
    pub fn write(&mut self, buffer: &mut Buffer<'_>) -> Result<(), BufferError> {
        let offset = buffer.position();
        buffer.write_bytes(&mac_octets(self.destination))?;
        buffer.write_bytes(&mac_octets(self.source))?;
        buffer.write_u16(self.ether_type.into())?;
        self.offset = offset;
        Ok(())
    }

    pub fn set_destination(
        &mut self,
        buffer: &mut Buffer<'_>,
        mac: MacAddr,
    ) -> Result<(), BufferError> {
        buffer.write_bytes_at(self.offset, &mac_octets(mac))?;
        self.destination = mac;
        Ok(())
    }

    pub fn set_source(&mut self, buffer: &mut Buffer<'_>, mac: MacAddr) -> Result<(), BufferError> {
        buffer.write_bytes_at(self.offset + 6, &mac_octets(mac))?;
        self.source = mac;
        Ok(())
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn destination(&self) -> MacAddr {
        self.destination
    }

    pub const fn source(&self) -> MacAddr {
        self.source
    }

    pub const fn ether_type(&self) -> EtherType {
        self.ether_type
    }

    pub fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST_MAC
    }
}
