//! A parsed Ethernet frame.
//!
//! A [`Packet`] owns (or borrows, through its [`Buffer`]) the bytes of one
//! frame together with the decoded Ethernet header and exactly one network
//! layer header matching the EtherType.

use std::net::IpAddr;

use pnet::util::MacAddr;

use super::buffer::Buffer;
use crate::error::{BufferError, FrameError, ProtocolError};
use crate::protocol::{
    ArpAddr, ArpHeader, ArpOperation, ETHERNET_MIN_FRAME_LEN, EtherType, EthernetHeader,
    Ipv4Header, Ipv6Header,
};

/// Network layer header selected by the EtherType.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkHeader {
    Arp(ArpHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
}

#[derive(Debug)]
pub struct Packet<'a> {
    index: u64,
    ethernet: EthernetHeader,
    network: NetworkHeader,
    buffer: Buffer<'a>,
}

impl<'a> Packet<'a> {
    /// Decode a frame starting at the buffer cursor.
    ///
    /// ARP frames may only be followed by Ethernet minimum-size padding.
    /// Failures carry the frame index and the offset where decoding stopped.
    pub fn parse(index: u64, mut buffer: Buffer<'a>) -> Result<Self, FrameError> {
        match decode(&mut buffer) {
            Ok((ethernet, network)) => Ok(Self {
                index,
                ethernet,
                network,
                buffer,
            }),
            Err(source) => Err(FrameError {
                index,
                offset: buffer.position(),
                len: buffer.len(),
                source,
            }),
        }
    }

    /// Deep copy of the frame, re-parsed from offset zero.
    pub fn clone_for_reply(&self) -> Result<Packet<'static>, FrameError> {
        Packet::parse(self.index, self.buffer.deep_clone())
    }

    pub const fn index(&self) -> u64 {
        self.index
    }

    pub const fn ethernet(&self) -> &EthernetHeader {
        &self.ethernet
    }

    pub const fn network(&self) -> &NetworkHeader {
        &self.network
    }

    pub fn arp(&self) -> Option<&ArpHeader> {
        match &self.network {
            NetworkHeader::Arp(arp) => Some(arp),
            _ => None,
        }
    }

    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        match &self.network {
            NetworkHeader::Ipv4(ipv4) => Some(ipv4),
            _ => None,
        }
    }

    pub fn ipv6(&self) -> Option<&Ipv6Header> {
        match &self.network {
            NetworkHeader::Ipv6(ipv6) => Some(ipv6),
            _ => None,
        }
    }

    pub const fn buffer(&self) -> &Buffer<'a> {
        &self.buffer
    }

    pub fn into_buffer(self) -> Buffer<'a> {
        self.buffer
    }

    /// Wire bytes of the whole frame.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Sender address for IP frames, ARP sender protocol address otherwise.
    pub fn source_ip(&self) -> Option<IpAddr> {
        match &self.network {
            NetworkHeader::Arp(arp) => arp.sender_proto().to_ip(),
            NetworkHeader::Ipv4(ipv4) => Some(IpAddr::V4(ipv4.source())),
            NetworkHeader::Ipv6(ipv6) => Some(IpAddr::V6(ipv6.source())),
        }
    }

    /// Destination address for IP frames, ARP target protocol address
    /// otherwise.
    pub fn destination_ip(&self) -> Option<IpAddr> {
        match &self.network {
            NetworkHeader::Arp(arp) => arp.target_proto().to_ip(),
            NetworkHeader::Ipv4(ipv4) => Some(IpAddr::V4(ipv4.destination())),
            NetworkHeader::Ipv6(ipv6) => Some(IpAddr::V6(ipv6.destination())),
        }
    }

    pub fn set_ethernet_source(&mut self, mac: MacAddr) -> Result<(), BufferError> {
        self.ethernet.set_source(&mut self.buffer, mac)
    }

    pub fn set_ethernet_destination(&mut self, mac: MacAddr) -> Result<(), BufferError> {
        self.ethernet.set_destination(&mut self.buffer, mac)
    }

    fn arp_mut(&mut self) -> Result<(&mut ArpHeader, &mut Buffer<'a>), ProtocolError> {
        match &mut self.network {
            NetworkHeader::Arp(arp) => Ok((arp, &mut self.buffer)),
            _ => Err(ProtocolError::NotArp),
        }
    }

    pub fn set_arp_operation(&mut self, operation: ArpOperation) -> Result<(), ProtocolError> {
        let (arp, buffer) = self.arp_mut()?;
        arp.set_operation(buffer, operation)?;
        Ok(())
    }

    pub fn set_arp_sender(&mut self, mac: MacAddr, addr: ArpAddr) -> Result<(), ProtocolError> {
        let (arp, buffer) = self.arp_mut()?;
        arp.set_sender_hw(buffer, mac)?;
        arp.set_sender_proto(buffer, addr)
    }

    pub fn set_arp_target(&mut self, mac: MacAddr, addr: ArpAddr) -> Result<(), ProtocolError> {
        let (arp, buffer) = self.arp_mut()?;
        arp.set_target_hw(buffer, mac)?;
        arp.set_target_proto(buffer, addr)
    }
}

fn decode(buffer: &mut Buffer<'_>) -> Result<(EthernetHeader, NetworkHeader), ProtocolError> {
    let ethernet = EthernetHeader::parse(buffer)?;
    let network = match ethernet.ether_type() {
        EtherType::Arp => {
            let arp = ArpHeader::parse(buffer)?;
            let remaining = buffer.remaining();
            if remaining > 0 && buffer.len() > ETHERNET_MIN_FRAME_LEN {
                return Err(ProtocolError::TrailingBytes { remaining });
            }
            NetworkHeader::Arp(arp)
        }
        EtherType::Ipv4 => NetworkHeader::Ipv4(Ipv4Header::parse(buffer)?),
        EtherType::Ipv6 => NetworkHeader::Ipv6(Ipv6Header::parse(buffer)?),
        other => return Err(ProtocolError::UnsupportedEtherType(other.into())),
    };
    Ok((ethernet, network))
}
