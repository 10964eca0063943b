//! Which observed addresses are worth tracking
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Networks treated as local when none are configured
pub const DEFAULT_LOCAL_NETS: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostTracking {
    /// Only addresses inside the local networks
    #[default]
    Local,
    /// Only addresses outside the local networks
    Remote,
    All,
    None,
}

impl std::fmt::Display for HostTracking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostTracking::Local => write!(f, "local"),
            HostTracking::Remote => write!(f, "remote"),
            HostTracking::All => write!(f, "all"),
            HostTracking::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for HostTracking {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(HostTracking::Local),
            "remote" => Ok(HostTracking::Remote),
            "all" => Ok(HostTracking::All),
            "none" => Ok(HostTracking::None),
            _ => Err(format!("Invalid host-tracking policy: {}", s)),
        }
    }
}

/// Tracking policy plus the networks that define "local"
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostFilter {
    tracking: HostTracking,
    local_nets: Vec<IpNet>,
}

impl HostFilter {
    pub fn new(tracking: HostTracking, local_nets: Vec<IpNet>) -> Self {
        Self {
            tracking,
            local_nets,
        }
    }

    pub fn with_default_nets(tracking: HostTracking) -> Self {
        Self::new(tracking, default_local_nets())
    }

    pub fn tracking(&self) -> HostTracking {
        self.tracking
    }

    pub fn is_local(&self, addr: &IpAddr) -> bool {
        self.local_nets.iter().any(|net| net.contains(addr))
    }

    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self.tracking {
            HostTracking::Local => self.is_local(addr),
            HostTracking::Remote => !self.is_local(addr),
            HostTracking::All => true,
            HostTracking::None => false,
        }
    }
}

pub fn default_local_nets() -> Vec<IpNet> {
    DEFAULT_LOCAL_NETS
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
}

pub fn parse_local_nets(nets: &[String]) -> Result<Vec<IpNet>> {
    nets.iter()
        .map(|net| {
            net.trim()
                .parse::<IpNet>()
                .map_err(|e| crate::config_error!("Invalid local network '{}': {}", net, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn local_policy_uses_private_space_by_default() {
        let filter = HostFilter::with_default_nets(HostTracking::Local);
        assert!(filter.matches(&addr("10.0.0.5")));
        assert!(filter.matches(&addr("192.168.1.2")));
        assert!(filter.matches(&addr("fd00::1")));
        assert!(!filter.matches(&addr("8.8.8.8")));
    }

    #[test]
    fn remote_all_and_none_policies() {
        let remote = HostFilter::with_default_nets(HostTracking::Remote);
        assert!(remote.matches(&addr("1.1.1.1")));
        assert!(!remote.matches(&addr("10.1.2.3")));

        let all = HostFilter::with_default_nets(HostTracking::All);
        assert!(all.matches(&addr("1.1.1.1")) && all.matches(&addr("10.1.2.3")));

        let none = HostFilter::with_default_nets(HostTracking::None);
        assert!(!none.matches(&addr("10.1.2.3")));
    }

    #[test]
    fn custom_local_nets() {
        let nets = parse_local_nets(&["203.0.113.0/24".to_string()]).unwrap();
        let filter = HostFilter::new(HostTracking::Local, nets);
        assert!(filter.matches(&addr("203.0.113.7")));
        assert!(!filter.matches(&addr("10.0.0.1")));

        assert!(parse_local_nets(&["not-a-net".to_string()]).is_err());
    }

    #[test]
    fn tracking_parses_case_insensitively() {
        assert_eq!("ALL".parse::<HostTracking>().unwrap(), HostTracking::All);
        assert!("sometimes".parse::<HostTracking>().is_err());
    }
}
