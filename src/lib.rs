//! Taplink - an ARP responder for TAP interfaces.
//!
//! Taplink sits on an existing TAP device, answers ARP requests for a
//! configured local IPv4 address and re-injects foreign ARP broadcasts at
//! most once per cooldown window per sender, so broadcasts do not loop
//! between the device and its bridge.
//!
//! # Architecture
//!
//! The crate is organized leaf-first:
//!
//! - [`network::Buffer`]: bounds-checked byte buffer with a read cursor
//! - [`protocol`]: Ethernet, ARP, IPv4 and IPv6 header codecs
//! - [`network::Packet`]: one parsed frame
//! - [`network::ArpResponder`]: reply synthesis and broadcast dedup
//! - [`interface`]: the worker thread and its statistics
//! - [`config`], [`metrics`], [`error`]: ambient plumbing
//!
//! # Example
//!
//! ```rust
//! use taplink::network::Buffer;
//!
//! let mut buffer = Buffer::growable(16);
//! buffer.write_varint(300).unwrap();
//! buffer.seek(0).unwrap();
//! assert_eq!(buffer.read_varint().unwrap(), 300);
//! ```

pub mod config;
pub mod error;
pub mod interface;
pub mod metrics;
pub mod network;
pub mod protocol;

pub use config::Config;
pub use error::{Error, Result};
