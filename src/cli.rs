//! CLI for this application
//!
use std::net::{IpAddr, SocketAddr};

use crate::cluster::{NodeName, NodeRole, PeerSpec, RoutingKey};
use crate::error::Result;
use crate::filter::{parse_local_nets, HostTracking, DEFAULT_LOCAL_NETS};
use crate::settings;
use crate::store::DEFAULT_STORE_NAME;

#[derive(Clone, Debug, clap::Parser)]
#[clap(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    #[clap(
        long,
        default_value = "hostwatch",
        env("HOSTWATCH_NODE_NAME"),
        help = "Unique name of this node within the cluster"
    )]
    pub node_name: String,

    #[clap(
        long,
        default_value = "standalone",
        env("HOSTWATCH_ROLE"),
        help = "role: 'manager', 'worker', 'proxy', or 'standalone'"
    )]
    pub role: NodeRole,

    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("HOSTWATCH_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: IpAddr,

    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("HOSTWATCH_HTTP_LISTEN_PORT"),
        help = "Port to bind the HTTP API server to"
    )]
    pub listen_port: u16,

    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_UDP,
        env("HOSTWATCH_UDP_LISTEN_PORT"),
        help = "Port to bind the cluster UDP socket to"
    )]
    pub listen_port_udp: u16,

    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_STORE,
        env("HOSTWATCH_STORE_LISTEN_PORT"),
        help = "Port the manager serves the host store on"
    )]
    pub listen_port_store: u16,

    #[clap(
        long,
        env("HOSTWATCH_PEERS"),
        value_delimiter = ',',
        help = "Cluster peers as role:name@ip:port (e.g., manager:mgr@10.0.0.1:8512,proxy:proxy-1@10.0.0.2:8512)"
    )]
    pub peers: Vec<PeerSpec>,

    #[clap(
        long,
        env("HOSTWATCH_USE_HOST_STORE"),
        help = "Deduplicate through the shared host store instead of in-memory tables"
    )]
    pub use_host_store: bool,

    #[clap(
        long,
        default_value = DEFAULT_STORE_NAME,
        env("HOSTWATCH_STORE_NAME"),
        help = "Name of the host store"
    )]
    pub store_name: String,

    #[clap(
        long,
        env("HOSTWATCH_STORE_ADDRESS"),
        help = "Address of the manager's store service (required on workers and proxies using the store)"
    )]
    pub store_address: Option<SocketAddr>,

    #[clap(
        long,
        default_value = "local",
        env("HOSTWATCH_HOST_TRACKING"),
        help = "Which hosts to track: 'local', 'remote', 'all', or 'none'"
    )]
    pub host_tracking: HostTracking,

    #[clap(
        long,
        env("HOSTWATCH_LOCAL_NETS"),
        value_delimiter = ',',
        help = "CIDR networks considered local (defaults to private, loopback and link-local space)"
    )]
    pub local_nets: Vec<String>,

    #[clap(
        long,
        default_value = "fixed:known-hosts",
        env("HOSTWATCH_ROUTING_KEY"),
        help = "Proxy selection key: 'fixed:<key>' or 'host'"
    )]
    pub routing_key: RoutingKey,

    #[clap(
        long,
        default_value = "86400",
        env("HOSTWATCH_HOST_TTL_SECS"),
        help = "Window in seconds during which a host is logged at most once"
    )]
    pub host_ttl_secs: u64,

    #[clap(
        long,
        default_value = "15",
        env("HOSTWATCH_STORE_TIMEOUT_SECS"),
        help = "Timeout in seconds for each host store call"
    )]
    pub store_timeout_secs: u64,

    #[clap(
        long,
        default_value = "10",
        env("HOSTWATCH_RESOLVER_TIMEOUT_SECS"),
        help = "Timeout in seconds for reverse DNS lookups"
    )]
    pub resolver_timeout_secs: u64,

    #[clap(
        long,
        default_value = "30",
        env("HOSTWATCH_BOOTSTRAP_DELAY_SECS"),
        help = "Seconds the manager waits for store values before seeding workers"
    )]
    pub bootstrap_delay_secs: u64,

    #[clap(
        long,
        default_value = "1000",
        env("HOSTWATCH_HEARTBEAT_INTERVAL_MS"),
        help = "Heartbeat interval in milliseconds"
    )]
    pub heartbeat_interval_ms: u64,

    #[clap(
        long,
        default_value = "30",
        env("HOSTWATCH_FAILURE_TIMEOUT_SECS"),
        help = "Seconds without a heartbeat before a peer is considered failed"
    )]
    pub failure_timeout_secs: u64,

    #[clap(
        long,
        default_value = "60",
        env("HOSTWATCH_EXPIRE_INTERVAL_SECS"),
        help = "Seconds between sweeps of expired hosts"
    )]
    pub expire_interval_secs: u64,

    #[clap(long, env("HOSTWATCH_LOG_JSON"), help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn into_settings(self) -> Result<settings::Settings> {
        let local_nets = if self.local_nets.is_empty() {
            let defaults: Vec<String> = DEFAULT_LOCAL_NETS.iter().map(|n| n.to_string()).collect();
            parse_local_nets(&defaults)?
        } else {
            parse_local_nets(&self.local_nets)?
        };

        let settings = settings::Settings {
            node_name: NodeName::new(self.node_name),
            role: self.role,
            listen_address: self.listen_address,
            listen_port_api: self.listen_port,
            listen_port_udp: self.listen_port_udp,
            listen_port_store: self.listen_port_store,
            peers: self.peers,
            use_host_store: self.use_host_store,
            store_name: self.store_name,
            store_address: self.store_address,
            host_tracking: self.host_tracking,
            local_nets,
            routing_key: self.routing_key,
            host_ttl_secs: self.host_ttl_secs,
            store_timeout_secs: self.store_timeout_secs,
            resolver_timeout_secs: self.resolver_timeout_secs,
            bootstrap_delay_secs: self.bootstrap_delay_secs,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            failure_timeout_secs: self.failure_timeout_secs,
            expire_interval_secs: self.expire_interval_secs,
            log_json: self.log_json,
        };
        settings.validate()?;
        Ok(settings)
    }
}
