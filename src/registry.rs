use std::collections::HashSet;
use std::path::Path;

use ipnet::IpNet;
use tracing::{info, warn};

use crate::error::MonitorError;
use crate::models::Host;

/// Shortest IPv4 prefix expanded into hosts (/16 is 65,534 addresses).
const MIN_V4_PREFIX: u8 = 16;
/// Shortest IPv6 prefix expanded into hosts.
const MIN_V6_PREFIX: u8 = 112;

/// Expands a CIDR line, or `None` when the block is too large to poll.
fn expand_block(net: &IpNet) -> Option<Vec<String>> {
    let min_prefix = match net {
        IpNet::V4(_) => MIN_V4_PREFIX,
        IpNet::V6(_) => MIN_V6_PREFIX,
    };
    if net.prefix_len() < min_prefix {
        return None;
    }
    Some(net.hosts().map(|ip| ip.to_string()).collect())
}

/// Ordered, duplicate-free list of hosts to monitor. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    hosts: Vec<Host>,
}

impl HostRegistry {
    /// Builds a registry from host-list lines.
    ///
    /// Lines are trimmed; blank lines and `#` comments are skipped. A CIDR
    /// block expands into its usable host addresses; blocks wider than /16
    /// (IPv4) or /112 (IPv6) are skipped with a warning. Repeated hosts keep
    /// their first position.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut hosts = Vec::new();

        for line in lines {
            let entry = line.as_ref().trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }

            let expanded = match entry.parse::<IpNet>() {
                Ok(net) => match expand_block(&net) {
                    Some(addresses) => addresses,
                    None => {
                        warn!(block = %net, "Address block too large to poll, entry skipped");
                        continue;
                    }
                },
                Err(_) => vec![entry.to_string()],
            };

            for address in expanded {
                if seen.insert(address.clone()) {
                    hosts.push(Host::new(address));
                } else {
                    warn!(host = %address, "Duplicate host entry ignored");
                }
            }
        }

        Self { hosts }
    }

    /// Reads a newline-delimited host file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| MonitorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_lines(content.lines());
        info!(path = %path.display(), hosts = registry.len(), "Host list loaded");
        Ok(registry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
