//! Hostwatch application settings
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use ipnet::IpNet;

use crate::cluster::{NodeName, NodeRole, PeerSpec, RoutingKey, Topology};
use crate::error::Result;
use crate::filter::{default_local_nets, HostFilter, HostTracking};
use crate::store::DEFAULT_STORE_NAME;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 8510;
pub const DEFAULT_PORT_HTTP: &str = "8510";
pub const STANDARD_PORT_STORE: u16 = 8511;
pub const DEFAULT_PORT_STORE: &str = "8511";
pub const STANDARD_PORT_UDP: u16 = 8512;
pub const DEFAULT_PORT_UDP: &str = "8512";

pub const DEFAULT_HOST_TTL_SECS: u64 = 86_400;
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BOOTSTRAP_DELAY_SECS: u64 = 30;

const ONE_HOUR_SECS: u64 = 60 * 60;
const ONE_DAY_SECS: u64 = 24 * ONE_HOUR_SECS;
pub const MAX_HOST_TTL_SECS: u64 = 365 * ONE_DAY_SECS;

#[derive(Clone, Debug)]
pub struct Settings {
    pub node_name: NodeName,
    pub role: NodeRole,

    // Server listen address
    pub listen_address: IpAddr,
    pub listen_port_api: u16,
    // Cluster packets
    pub listen_port_udp: u16,
    // Store service, only bound by the store-hosting node
    pub listen_port_store: u16,

    pub peers: Vec<PeerSpec>,

    // Known-hosts store
    pub use_host_store: bool,
    pub store_name: String,
    pub store_address: Option<SocketAddr>,

    // Which addresses to track
    pub host_tracking: HostTracking,
    pub local_nets: Vec<IpNet>,
    pub routing_key: RoutingKey,

    pub host_ttl_secs: u64,
    pub store_timeout_secs: u64,
    pub resolver_timeout_secs: u64,
    pub bootstrap_delay_secs: u64,

    // Cluster liveness
    pub heartbeat_interval_ms: u64,
    pub failure_timeout_secs: u64,
    pub expire_interval_secs: u64,

    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_name: NodeName::from("hostwatch"),
            role: NodeRole::Standalone,
            listen_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port_api: STANDARD_PORT_HTTP,
            listen_port_udp: STANDARD_PORT_UDP,
            listen_port_store: STANDARD_PORT_STORE,
            peers: Vec::new(),
            use_host_store: false,
            store_name: DEFAULT_STORE_NAME.to_string(),
            store_address: None,
            host_tracking: HostTracking::default(),
            local_nets: default_local_nets(),
            routing_key: RoutingKey::default(),
            host_ttl_secs: DEFAULT_HOST_TTL_SECS,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            resolver_timeout_secs: DEFAULT_RESOLVER_TIMEOUT_SECS,
            bootstrap_delay_secs: DEFAULT_BOOTSTRAP_DELAY_SECS,
            heartbeat_interval_ms: 1000,
            failure_timeout_secs: 30,
            expire_interval_secs: 60,
            log_json: false,
        }
    }
}

impl Settings {
    pub fn host_ttl(&self) -> Duration {
        Duration::from_secs(self.host_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }

    pub fn bootstrap_delay(&self) -> Duration {
        Duration::from_secs(self.bootstrap_delay_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn failure_timeout(&self) -> Duration {
        Duration::from_secs(self.failure_timeout_secs)
    }

    pub fn expire_interval(&self) -> Duration {
        Duration::from_secs(self.expire_interval_secs)
    }

    pub fn api_address(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port_api)
    }

    pub fn udp_address(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port_udp)
    }

    pub fn store_bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port_store)
    }

    /// The manager (or a standalone node) owns the authoritative store
    pub fn hosts_store(&self) -> bool {
        matches!(self.role, NodeRole::Manager | NodeRole::Standalone)
    }

    pub fn host_filter(&self) -> HostFilter {
        HostFilter::new(self.host_tracking, self.local_nets.clone())
    }

    /// Peers this node talks to; a standalone node has none
    pub fn topology(&self) -> Result<Topology> {
        if self.role.is_clustered() {
            Topology::new(&self.node_name, &self.peers)
        } else {
            Ok(Topology::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_name.as_str().is_empty() {
            return Err(crate::config_error!("Node name must not be empty"));
        }
        let topology = self.topology()?;
        if matches!(self.role, NodeRole::Worker | NodeRole::Proxy) && topology.manager().is_none()
        {
            return Err(crate::config_error!(
                "A {} node needs a manager peer",
                self.role
            ));
        }
        if self.role == NodeRole::Manager && topology.manager().is_some() {
            return Err(crate::config_error!(
                "A manager node must not list another manager peer"
            ));
        }
        if self.use_host_store && !self.hosts_store() && self.store_address.is_none() {
            return Err(crate::config_error!(
                "A {} node using the host store needs --store-address",
                self.role
            ));
        }
        if self.use_host_store && self.store_name.trim().is_empty() {
            return Err(crate::config_error!("Store name must not be empty"));
        }

        // (name, value, upper bound)
        let durations = [
            ("host-ttl-secs", self.host_ttl_secs, MAX_HOST_TTL_SECS),
            ("store-timeout-secs", self.store_timeout_secs, ONE_HOUR_SECS),
            ("resolver-timeout-secs", self.resolver_timeout_secs, ONE_HOUR_SECS),
            ("heartbeat-interval-ms", self.heartbeat_interval_ms, ONE_HOUR_SECS * 1000),
            ("failure-timeout-secs", self.failure_timeout_secs, ONE_DAY_SECS),
            ("expire-interval-secs", self.expire_interval_secs, ONE_DAY_SECS),
        ];
        for (name, value, max) in durations {
            if value == 0 {
                return Err(crate::config_error!("{} must be non-zero", name));
            }
            if value > max {
                return Err(crate::config_error!("{} must be at most {}", name, max));
            }
        }
        if self.bootstrap_delay_secs > ONE_DAY_SECS {
            return Err(crate::config_error!(
                "bootstrap-delay-secs must be at most {}",
                ONE_DAY_SECS
            ));
        }
        Ok(())
    }
}
