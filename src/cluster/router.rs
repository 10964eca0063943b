//! Role-aware destination selection.
//!
//! Traffic only ever flows up the tiers (worker -> proxy -> manager) or from
//! the manager down to workers. A proxy never addresses a worker and a worker
//! never addresses another worker, which keeps relays from echoing back to
//! the node that observed the host.
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use super::consistent_hashing::jump_consistent_hash;
use super::{Membership, NodeName, NodeRole, Topology};
use crate::error::Result;

pub const DEFAULT_ROUTING_KEY: &str = "known-hosts";

/// String fed to the consistent hash when choosing a proxy
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingKey {
    /// Same key for every host: one proxy owns the whole set
    Fixed(String),
    /// Shard by host address
    HostAddress,
}

impl Default for RoutingKey {
    fn default() -> Self {
        RoutingKey::Fixed(DEFAULT_ROUTING_KEY.to_string())
    }
}

impl RoutingKey {
    pub fn key_for(&self, host: &IpAddr) -> String {
        match self {
            RoutingKey::Fixed(key) => key.clone(),
            RoutingKey::HostAddress => host.to_string(),
        }
    }
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingKey::Fixed(key) => write!(f, "fixed:{}", key),
            RoutingKey::HostAddress => write!(f, "host"),
        }
    }
}

impl std::str::FromStr for RoutingKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("fixed", key)) if !key.is_empty() => Ok(RoutingKey::Fixed(key.to_string())),
            None if s.eq_ignore_ascii_case("host") => Ok(RoutingKey::HostAddress),
            _ => Err(format!(
                "Invalid routing key '{}': expected 'fixed:<key>' or 'host'",
                s
            )),
        }
    }
}

/// Where a message should go
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Handle on this node; nothing leaves the process
    Local,
    Node(NodeName),
    Manager,
    Workers,
}

#[derive(Clone, Debug)]
pub struct Router {
    local: NodeName,
    role: NodeRole,
    topology: Arc<Topology>,
    membership: Arc<RwLock<Membership>>,
    routing_key: RoutingKey,
}

impl Router {
    pub fn new(
        local: NodeName,
        role: NodeRole,
        topology: Arc<Topology>,
        membership: Arc<RwLock<Membership>>,
        routing_key: RoutingKey,
    ) -> Self {
        Self {
            local,
            role,
            topology,
            membership,
            routing_key,
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn routing_key(&self) -> &RoutingKey {
        &self.routing_key
    }

    /// Active proxies in stable name order
    pub fn live_proxies(&self) -> Result<Vec<NodeName>> {
        self.membership
            .read()
            .map_err(|e| crate::concurrency_error!("RwLock read fail {}", e))
            .map(|members| members.active_with_role(NodeRole::Proxy))
    }

    /// Pick a proxy for `host`, or `Manager` when the pool is empty.
    pub fn select_proxy(&self, host: &IpAddr) -> Result<Destination> {
        let pool = self.live_proxies()?;
        if pool.is_empty() {
            return Ok(Destination::Manager);
        }
        let key = self.routing_key.key_for(host);
        let bucket = jump_consistent_hash(&key, pool.len() as u32) as usize;
        Ok(pool
            .get(bucket)
            .cloned()
            .map(Destination::Node)
            .unwrap_or(Destination::Manager))
    }

    /// Destination for a freshly observed host that still needs a commit decision
    pub fn route_discovery(&self, host: &IpAddr) -> Result<Destination> {
        match self.role {
            NodeRole::Worker => self.select_proxy(host),
            NodeRole::Proxy | NodeRole::Manager | NodeRole::Standalone => Ok(Destination::Local),
        }
    }

    /// Destination for news that a host was committed
    pub fn route_commit(&self, host: &IpAddr) -> Result<Destination> {
        match self.role {
            NodeRole::Worker => self.select_proxy(host),
            NodeRole::Proxy => Ok(Destination::Manager),
            NodeRole::Manager => Ok(Destination::Workers),
            NodeRole::Standalone => Ok(Destination::Local),
        }
    }

    /// Expand a destination into concrete peers, never including this node
    pub fn targets(&self, destination: &Destination) -> Vec<NodeName> {
        let mut targets: Vec<NodeName> = match destination {
            Destination::Local => Vec::new(),
            Destination::Node(name) => vec![name.clone()],
            Destination::Manager => self
                .topology
                .manager()
                .map(|peer| vec![peer.name.clone()])
                .unwrap_or_default(),
            Destination::Workers => self
                .topology
                .with_role(NodeRole::Worker)
                .map(|peer| peer.name.clone())
                .collect(),
        };
        targets.retain(|name| name != &self.local);
        targets
    }

    /// Every configured peer, used for heartbeats
    pub fn all_peers(&self) -> Vec<NodeName> {
        self.topology.peers().map(|peer| peer.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::PeerSpec;

    fn router(local: &str, role: NodeRole, peers: &[&str], key: RoutingKey) -> Router {
        let peers: Vec<PeerSpec> = peers.iter().map(|p| p.parse().unwrap()).collect();
        let local = NodeName::from(local);
        let topology = Arc::new(Topology::new(&local, &peers).unwrap());
        let membership = Arc::new(RwLock::new(Membership::from_topology(&topology)));
        Router::new(local, role, topology, membership, key)
    }

    const PEERS: [&str; 5] = [
        "manager:mgr@10.0.0.1:8512",
        "proxy:p1@10.0.0.2:8512",
        "proxy:p2@10.0.0.3:8512",
        "worker:w1@10.0.0.4:8512",
        "worker:w2@10.0.0.5:8512",
    ];

    #[test]
    fn test_worker_routes_to_a_live_proxy() {
        let r = router("w1", NodeRole::Worker, &PEERS, RoutingKey::HostAddress);
        let host: IpAddr = "10.0.0.5".parse().unwrap();
        let dest = r.route_discovery(&host).unwrap();
        assert!(matches!(dest, Destination::Node(ref n) if n.as_str().starts_with('p')));
        assert_eq!(dest, r.route_discovery(&host).unwrap());
        assert_eq!(r.route_commit(&host).unwrap(), dest);
    }

    #[test]
    fn test_fixed_key_sends_every_host_to_one_proxy() {
        let r = router("w1", NodeRole::Worker, &PEERS, RoutingKey::default());
        let first = r.route_discovery(&"10.0.0.5".parse().unwrap()).unwrap();
        for i in 0..50u8 {
            let host = IpAddr::from([192, 168, 1, i]);
            assert_eq!(r.route_discovery(&host).unwrap(), first);
        }
    }

    #[test]
    fn test_empty_pool_falls_back_to_manager() {
        let r = router(
            "w1",
            NodeRole::Worker,
            &["manager:mgr@10.0.0.1:8512", "worker:w2@10.0.0.5:8512"],
            RoutingKey::default(),
        );
        let host: IpAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(r.route_discovery(&host).unwrap(), Destination::Manager);
        assert_eq!(r.targets(&Destination::Manager), vec![NodeName::from("mgr")]);
    }

    #[test]
    fn test_failed_proxies_fall_back_to_manager() {
        let r = router("w1", NodeRole::Worker, &PEERS, RoutingKey::default());
        {
            let mut members = r.membership.write().unwrap();
            members.mark_failed(&NodeName::from("p1"));
            members.mark_failed(&NodeName::from("p2"));
        }
        let host: IpAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(r.route_discovery(&host).unwrap(), Destination::Manager);
    }

    #[test]
    fn test_only_live_proxies_are_chosen() {
        let r = router("w1", NodeRole::Worker, &PEERS, RoutingKey::HostAddress);
        r.membership
            .write()
            .unwrap()
            .mark_failed(&NodeName::from("p1"));
        for i in 0..50u8 {
            let host = IpAddr::from([10, 9, 0, i]);
            assert_eq!(
                r.route_discovery(&host).unwrap(),
                Destination::Node(NodeName::from("p2"))
            );
        }
    }

    #[test]
    fn test_proxies_never_address_workers() {
        let r = router("p1", NodeRole::Proxy, &PEERS, RoutingKey::default());
        let host: IpAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(r.route_discovery(&host).unwrap(), Destination::Local);
        let dest = r.route_commit(&host).unwrap();
        assert_eq!(dest, Destination::Manager);
        assert_eq!(r.targets(&dest), vec![NodeName::from("mgr")]);
    }

    #[test]
    fn test_manager_fans_out_to_workers_only() {
        let r = router("mgr", NodeRole::Manager, &PEERS, RoutingKey::default());
        let host: IpAddr = "10.0.0.5".parse().unwrap();
        let dest = r.route_commit(&host).unwrap();
        assert_eq!(dest, Destination::Workers);
        assert_eq!(
            r.targets(&dest),
            vec![NodeName::from("w1"), NodeName::from("w2")]
        );
    }

    #[test]
    fn test_standalone_routes_locally() {
        let r = router("solo", NodeRole::Standalone, &[], RoutingKey::default());
        let host: IpAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(r.route_discovery(&host).unwrap(), Destination::Local);
        assert_eq!(r.route_commit(&host).unwrap(), Destination::Local);
        assert!(r.targets(&Destination::Workers).is_empty());
    }

    #[test]
    fn test_routing_key_parsing() {
        assert_eq!(
            "fixed:hosts".parse::<RoutingKey>().unwrap(),
            RoutingKey::Fixed("hosts".to_string())
        );
        assert_eq!("host".parse::<RoutingKey>().unwrap(), RoutingKey::HostAddress);
        assert!("fixed:".parse::<RoutingKey>().is_err());
        assert!("shard".parse::<RoutingKey>().is_err());
        assert_eq!(RoutingKey::default().to_string(), "fixed:known-hosts");
    }
}
