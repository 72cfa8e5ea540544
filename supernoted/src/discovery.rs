use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use thiserror::Error;
use tracing::{debug, info};

use crate::sync::reader::DirectoryReader;

/// Port the device's browse-and-access server listens on.
pub const DEFAULT_DISCOVERY_PORT: u16 = 8089;
pub const DEFAULT_SUBNET: &str = "192.168.1.0/24";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_PROBE_CONCURRENCY: usize = 32;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid subnet {0:?}: expected a.b.c.d/prefix with a prefix between 16 and 30")]
    InvalidSubnet(String),
    #[error("no listing endpoint answered among {probed} probed hosts")]
    NoEndpoint { probed: usize },
}

/// An IPv4 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

impl Subnet {
    /// Usable host addresses, in ascending order; network and broadcast
    /// addresses are left out.
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        let base = u32::from(self.network);
        let size = 1u32 << (32 - u32::from(self.prefix));
        (1..size - 1).map(|offset| Ipv4Addr::from(base + offset)).collect()
    }
}

impl FromStr for Subnet {
    type Err = DiscoveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DiscoveryError::InvalidSubnet(value.to_string());
        let (addr, prefix) = value.trim().split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        if !(16..=30).contains(&prefix) {
            return Err(invalid());
        }
        let mask = u32::MAX << (32 - u32::from(prefix));
        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask),
            prefix,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub probe_timeout: Duration,
    pub concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }
}

/// Probes `hosts` for a listing endpoint and returns the root URL of the
/// first one, in probe order, whose root page parses as a listing.
///
/// Probes overlap up to `config.concurrency`, but results are consumed in
/// input order, so a later host answering sooner never wins over an earlier
/// host that also answers.
pub async fn discover(
    reader: &dyn DirectoryReader,
    hosts: &[Ipv4Addr],
    config: &DiscoveryConfig,
) -> Result<String, DiscoveryError> {
    let probes = stream::iter(hosts.iter().copied())
        .map(move |host| async move {
            let url = format!("http://{host}:{}", config.port);
            match tokio::time::timeout(config.probe_timeout, reader.read_directory(&url)).await {
                Ok(Ok(_)) => Some(url),
                Ok(Err(err)) => {
                    debug!(%url, error = %err, "probe failed");
                    None
                }
                Err(_) => {
                    debug!(%url, "probe timed out");
                    None
                }
            }
        })
        .buffered(config.concurrency.max(1));
    tokio::pin!(probes);

    while let Some(found) = probes.next().await {
        if let Some(url) = found {
            info!(%url, "discovered supernote");
            return Ok(url);
        }
    }
    Err(DiscoveryError::NoEndpoint {
        probed: hosts.len(),
    })
}
