//! Configuration loading and validation.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use pnet::util::MacAddr;
use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Longest interface name the kernel accepts.
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Main configuration for the taplink responder.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// TAP device to attach to. It must already exist.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// IPv4 address answered for in ARP replies.
    pub local_ip: Ipv4Addr,

    /// MAC address used in replies. If None, read from the device.
    #[serde(default, deserialize_with = "deserialize_mac")]
    pub local_mac: Option<MacAddr>,

    /// Minimum spacing between two rebroadcasts from the same MAC.
    #[serde(default = "default_rebroadcast_cooldown")]
    pub rebroadcast_cooldown_ms: u64,

    /// Sleep between empty device reads.
    #[serde(default = "default_idle_backoff")]
    pub idle_backoff_ms: u64,

    /// Interval between statistics reports.
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Read hex encoded frames from stdin and write them to the device.
    #[serde(default)]
    pub manual_injection: bool,

    /// Prometheus metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Expose a Prometheus scrape endpoint.
    #[serde(default)]
    pub enabled: bool,

    /// Address of the scrape endpoint.
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

fn default_interface() -> String {
    "tap0".to_owned()
}

const fn default_rebroadcast_cooldown() -> u64 {
    1000
}

const fn default_idle_backoff() -> u64 {
    30
}

const fn default_report_interval() -> u64 {
    1
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9100))
}

fn deserialize_mac<'de, D>(deserializer: D) -> std::result::Result<Option<MacAddr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(s) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    s.parse()
        .map(Some)
        .map_err(|err| serde::de::Error::custom(format!("invalid MAC address {s:?}: {err:?}")))
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.interface.is_empty() {
            return Err(ValidationError::EmptyInterface);
        }
        if self.interface.len() > MAX_INTERFACE_NAME_LEN {
            return Err(ValidationError::InterfaceNameTooLong {
                name: self.interface.clone(),
            });
        }
        if self.local_ip.is_unspecified()
            || self.local_ip.is_broadcast()
            || self.local_ip.is_multicast()
        {
            return Err(ValidationError::UnusableLocalIp { ip: self.local_ip });
        }
        if self.rebroadcast_cooldown_ms == 0 {
            return Err(ValidationError::ZeroRebroadcastCooldown);
        }
        if self.idle_backoff_ms == 0 {
            return Err(ValidationError::ZeroIdleBackoff);
        }
        if self.report_interval_secs == 0 {
            return Err(ValidationError::ZeroReportInterval);
        }
        Ok(())
    }

    pub const fn rebroadcast_cooldown(&self) -> Duration {
        Duration::from_millis(self.rebroadcast_cooldown_ms)
    }

    pub const fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub const fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}
