//! ARP answering and broadcast loop suppression.
//!
//! Broadcast ARP requests for the local IPv4 address are answered with a
//! reply synthesized from a deep copy of the request. Every other broadcast
//! ARP frame is re-injected at most once per cooldown window per source MAC,
//! which stops a broadcast from bouncing forever between the TAP device and
//! its bridge.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use pnet::util::MacAddr;
use tracing::{debug, info};

use super::packet::Packet;
use crate::error::{FrameError, ProtocolError};
use crate::protocol::{ArpOperation, mac_octets};

pub const DEFAULT_REBROADCAST_COOLDOWN: Duration = Duration::from_millis(1000);

/// Identity and policy of the responder.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Address we answer for.
    pub local_ip: Ipv4Addr,
    /// Hardware address placed in replies.
    pub local_mac: MacAddr,
    /// Minimum spacing between two rebroadcasts from the same MAC.
    pub rebroadcast_cooldown: Duration,
}

/// Last rebroadcast instant per source MAC.
///
/// Entries are never evicted; the table is bounded by the number of
/// distinct peers seen on the segment.
#[derive(Debug, Clone)]
pub struct BroadcastTable {
    entries: HashMap<[u8; 6], Instant>,
    cooldown: Duration,
}

impl BroadcastTable {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            cooldown,
        }
    }

    /// Whether a broadcast from `mac` seen at `now` may be re-injected.
    /// A positive answer records `now` for that MAC.
    pub fn should_rebroadcast(&mut self, mac: MacAddr, now: Instant) -> bool {
        let key = mac_octets(mac);
        if let Some(&last) = self.entries.get(&key)
            && now.saturating_duration_since(last) <= self.cooldown
        {
            return false;
        }
        self.entries.insert(key, now);
        true
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What to do with a classified frame.
#[derive(Debug)]
pub enum Decision {
    /// Write this reply to the device.
    Answer(Packet<'static>),
    /// Write the original frame back unchanged.
    Rebroadcast,
    /// Broadcast seen again within the cooldown; drop it.
    Suppress,
    /// Nothing to do for this frame.
    Ignore,
}

pub struct ArpResponder {
    config: ResponderConfig,
    broadcasts: BroadcastTable,
}

impl ArpResponder {
    pub fn new(config: ResponderConfig) -> Self {
        let broadcasts = BroadcastTable::new(config.rebroadcast_cooldown);
        Self { config, broadcasts }
    }

    pub const fn config(&self) -> &ResponderConfig {
        &self.config
    }

    pub const fn broadcasts(&self) -> &BroadcastTable {
        &self.broadcasts
    }

    /// Classify `packet`, building the reply when it is ours to answer.
    pub fn decide(&mut self, packet: &Packet<'_>, now: Instant) -> Result<Decision, FrameError> {
        let Some(arp) = packet.arp() else {
            debug!(
                index = packet.index(),
                ether_type = %packet.ethernet().ether_type(),
                "ignoring non-ARP frame"
            );
            return Ok(Decision::Ignore);
        };

        if !packet.ethernet().is_broadcast() {
            debug!(
                index = packet.index(),
                destination = %packet.ethernet().destination(),
                "ignoring unicast ARP frame"
            );
            return Ok(Decision::Ignore);
        }

        if arp.operation() == ArpOperation::Request
            && arp.has_ethernet_addrs()
            && arp.target_proto().to_ipv4() == Some(self.config.local_ip)
        {
            info!(
                index = packet.index(),
                "Answering ARP request for {} from {} ({})",
                self.config.local_ip,
                arp.sender_proto(),
                arp.sender_hw()
            );
            return self.build_reply(packet).map(Decision::Answer);
        }

        let source = packet.ethernet().source();
        if self.broadcasts.should_rebroadcast(source, now) {
            debug!(index = packet.index(), %source, "rebroadcasting ARP frame");
            Ok(Decision::Rebroadcast)
        } else {
            debug!(index = packet.index(), %source, "suppressing repeated ARP broadcast");
            Ok(Decision::Suppress)
        }
    }

    /// Turn a request into a reply on an independent copy of its bytes.
    ///
    /// The reply goes from our MAC to the requester, carries our MAC with
    /// the requested address as sender and the requester as target. The
    /// frame length does not change.
    pub fn build_reply(&self, request: &Packet<'_>) -> Result<Packet<'static>, FrameError> {
        let Some(arp) = request.arp() else {
            return Err(FrameError {
                index: request.index(),
                offset: request.ethernet().offset(),
                len: request.len(),
                source: ProtocolError::NotArp,
            });
        };
        let arp_offset = arp.offset();
        let Some(requester_mac) = arp.sender_mac() else {
            return Err(FrameError {
                index: request.index(),
                offset: arp_offset,
                len: request.len(),
                source: ProtocolError::InvalidArpAddressLength {
                    hardware: arp.hardware_len(),
                    protocol: arp.protocol_len(),
                },
            });
        };
        let requester_ip = arp.sender_proto();
        let requested_ip = arp.target_proto();

        let mut reply = request.clone_for_reply()?;
        let local_mac = self.config.local_mac;
        let rewrite = |reply: &mut Packet<'static>| -> Result<(), ProtocolError> {
            reply.set_ethernet_source(local_mac)?;
            reply.set_ethernet_destination(requester_mac)?;
            reply.set_arp_operation(ArpOperation::Reply)?;
            reply.set_arp_sender(local_mac, requested_ip)?;
            reply.set_arp_target(requester_mac, requester_ip)
        };
        rewrite(&mut reply).map_err(|source| FrameError {
            index: request.index(),
            offset: arp_offset,
            len: request.len(),
            source,
        })?;
        Ok(reply)
    }
}
