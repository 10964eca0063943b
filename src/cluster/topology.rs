use std::collections::BTreeMap;
use std::net::SocketAddr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use super::NodeName;
use crate::error::Result;

/// Role a node plays in the cluster, fixed for the process lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum NodeRole {
    Manager,
    Worker,
    Proxy,
    Standalone,
}

impl NodeRole {
    pub fn is_clustered(&self) -> bool {
        !matches!(self, NodeRole::Standalone)
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Manager => write!(f, "manager"),
            NodeRole::Worker => write!(f, "worker"),
            NodeRole::Proxy => write!(f, "proxy"),
            NodeRole::Standalone => write!(f, "standalone"),
        }
    }
}

impl std::str::FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manager" => Ok(NodeRole::Manager),
            "worker" => Ok(NodeRole::Worker),
            "proxy" => Ok(NodeRole::Proxy),
            "standalone" => Ok(NodeRole::Standalone),
            _ => Err(format!("Invalid node role: {}", s)),
        }
    }
}

/// A peer given on the command line as `role:name@ip:port`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSpec {
    pub name: NodeName,
    pub role: NodeRole,
    pub address: SocketAddr,
}

impl std::str::FromStr for PeerSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (role, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("Peer '{}' must look like role:name@ip:port", s))?;
        let (name, address) = rest
            .split_once('@')
            .ok_or_else(|| format!("Peer '{}' must look like role:name@ip:port", s))?;
        if name.is_empty() {
            return Err(format!("Peer '{}' has an empty name", s));
        }
        Ok(PeerSpec {
            name: NodeName::from(name),
            role: role.parse()?,
            address: address
                .parse()
                .map_err(|e| format!("Peer '{}' has a bad address: {}", s, e))?,
        })
    }
}

impl std::fmt::Display for PeerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}@{}", self.role, self.name, self.address)
    }
}

/// Static view of the cluster: who exists, in which role, at which address
#[derive(Clone, Debug, Default)]
pub struct Topology {
    peers: BTreeMap<NodeName, PeerSpec>,
}

impl Topology {
    /// Build from peer specs, dropping any entry for the local node
    pub fn new(local: &NodeName, peers: &[PeerSpec]) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for peer in peers.iter().filter(|p| &p.name != local) {
            if by_name.insert(peer.name.clone(), peer.clone()).is_some() {
                return Err(crate::config_error!(
                    "Peer '{}' listed more than once",
                    peer.name
                ));
            }
        }
        let managers = by_name
            .values()
            .filter(|p| p.role == NodeRole::Manager)
            .count();
        if managers > 1 {
            return Err(crate::config_error!(
                "Expected at most one manager peer, found {}",
                managers
            ));
        }
        Ok(Self { peers: by_name })
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerSpec> {
        self.peers.values()
    }

    pub fn manager(&self) -> Option<&PeerSpec> {
        self.peers.values().find(|p| p.role == NodeRole::Manager)
    }

    pub fn with_role(&self, role: NodeRole) -> impl Iterator<Item = &PeerSpec> {
        self.peers.values().filter(move |p| p.role == role)
    }

    pub fn name_for_address(&self, address: &SocketAddr) -> Option<&NodeName> {
        self.peers
            .values()
            .find(|p| &p.address == address)
            .map(|p| &p.name)
    }
}
