//! Device abstraction.
//!
//! The frame loop only needs a non-blocking byte pipe, which keeps it
//! testable without a real TAP interface.

use std::io;
use std::path::PathBuf;

use pnet::util::MacAddr;
use tun_tap::{Iface, Mode};

use crate::error::{DeviceError, Result};

/// A frame-oriented handle on a network device.
pub trait Device: Send {
    /// Read one frame into `buf`. Returns `Ok(0)` when no frame is waiting.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write one frame, returning the number of bytes accepted.
    fn write(&mut self, frame: &[u8]) -> io::Result<usize>;
}

/// An existing TAP interface opened in non-blocking mode.
pub struct TapDevice {
    iface: Iface,
}

impl TapDevice {
    /// Attach to the TAP device `name`. The device itself, its bridge and
    /// addressing are set up outside this process.
    pub fn open(name: &str) -> Result<Self> {
        let open_error = |source| DeviceError::Open {
            name: name.to_owned(),
            source,
        };
        let iface = Iface::without_packet_info(name, Mode::Tap).map_err(open_error)?;
        iface.set_non_blocking().map_err(open_error)?;
        Ok(Self { iface })
    }

    pub fn name(&self) -> &str {
        self.iface.name()
    }
}

impl Device for TapDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.iface.recv(buf) {
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(0),
            other => other,
        }
    }

    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.iface.send(frame)
    }
}

/// Read the MAC address the kernel assigned to interface `name`.
pub fn detect_mac(name: &str) -> Result<MacAddr> {
    let path: PathBuf = ["/sys/class/net", name, "address"].iter().collect();
    let unavailable = |reason: String| DeviceError::MacUnavailable {
        name: name.to_owned(),
        reason,
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|err| unavailable(format!("{}: {err}", path.display())))?;
    let mac = content
        .trim()
        .parse::<MacAddr>()
        .map_err(|err| unavailable(format!("{err:?}")))?;
    Ok(mac)
}
