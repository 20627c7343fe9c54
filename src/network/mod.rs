//! Frame buffers, parsed packets, the device seam and the ARP responder.

pub mod arp;
mod buffer;
pub mod device;
pub mod inject;
mod packet;

pub use arp::{
    ArpResponder, BroadcastTable, DEFAULT_REBROADCAST_COOLDOWN, Decision, ResponderConfig,
};
pub use buffer::{Buffer, DEFAULT_CHUNK_SIZE, Growth, VARINT_MAX, to_hex, varint_width};
pub use device::{Device, TapDevice, detect_mac};
pub use inject::{Injector, LineAssembler, MAX_LINE_LEN, decode_hex_line};
pub use packet::{NetworkHeader, Packet};
