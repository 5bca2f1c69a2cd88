//! Static CIDR allow-list.

use std::net::IpAddr;

use ipnetwork::{IpNetwork, IpNetworkError};

/// Immutable set of trusted network prefixes covering both address families.
#[derive(Debug, Clone)]
pub struct RangeAllowList {
    networks: Vec<IpNetwork>,
}

impl RangeAllowList {
    /// Compile the allow-list. Any malformed range is a startup error.
    pub fn new<S: AsRef<str>>(ranges: &[S]) -> Result<Self, IpNetworkError> {
        let networks = ranges
            .iter()
            .map(|r| r.as_ref().trim().parse::<IpNetwork>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = normalize(addr);
        self.networks.iter().any(|network| network.contains(addr))
    }

    /// Parse `candidate` and check membership; unparseable input is untrusted.
    pub fn is_trusted(&self, candidate: &str) -> bool {
        match candidate.trim().parse::<IpAddr>() {
            Ok(addr) => self.contains(addr),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

/// Treat IPv4-mapped IPv6 addresses as the IPv4 address they carry.
pub(crate) fn normalize(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
        v4 => v4,
    }
}
