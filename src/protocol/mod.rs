//! Wire codecs for the headers the responder understands.
//!
//! Every header is decoded from a [`Buffer`](crate::network::Buffer) at its
//! cursor and remembers the offset it was decoded from, so in-place mutators
//! can patch the live frame without a full re-serialize.

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod ipv6;

use pnet::util::MacAddr;

use crate::error::BufferError;
use crate::network::Buffer;

pub use arp::{ArpAddr, ArpHeader, ArpOperation};
pub use ethernet::{
    BROADCAST_MAC, ETHERNET_HEADER_LEN, ETHERNET_MAX_FRAME_LEN, ETHERNET_MIN_FRAME_LEN,
    EtherType, EthernetHeader,
};
pub use ipv4::{IPV4_HEADER_LEN, IpProtocol, Ipv4Header};
pub use ipv6::{IPV6_HEADER_LEN, Ipv6Header};

/// Raw octets of a MAC address.
pub const fn mac_octets(mac: MacAddr) -> [u8; 6] {
    [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]
}

/// Build a MAC address from six octets.
pub const fn mac_from_octets(octets: [u8; 6]) -> MacAddr {
    MacAddr(
        octets[0], octets[1], octets[2], octets[3], octets[4], octets[5],
    )
}

pub(crate) fn read_mac(buffer: &mut Buffer<'_>) -> Result<MacAddr, BufferError> {
    let mut octets = [0u8; 6];
    buffer.read_bytes_into(&mut octets)?;
    Ok(mac_from_octets(octets))
}

pub(crate) fn read_array<const N: usize>(buffer: &mut Buffer<'_>) -> Result<[u8; N], BufferError> {
    let mut out = [0u8; N];
    buffer.read_bytes_into(&mut out)?;
    Ok(out)
}
