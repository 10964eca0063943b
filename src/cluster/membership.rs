use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use super::{NodeName, NodeRole, Topology};

/// Liveness of a peer as seen from this node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Active,
    Failed,
}

#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub name: NodeName,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub last_seen: Instant,
}

/// Peer liveness table fed by heartbeats.
/// Peers start out Active: a freshly started node assumes the configured
/// topology is reachable until heartbeats say otherwise.
#[derive(Clone, Debug, Default)]
pub struct Membership {
    nodes: BTreeMap<NodeName, NodeInfo>,
    membership_version: u64,
}

impl Membership {
    pub fn from_topology(topology: &Topology) -> Self {
        let now = Instant::now();
        let nodes = topology
            .peers()
            .map(|peer| {
                (
                    peer.name.clone(),
                    NodeInfo {
                        name: peer.name.clone(),
                        role: peer.role,
                        status: NodeStatus::Active,
                        last_seen: now,
                    },
                )
            })
            .collect();
        Self {
            nodes,
            membership_version: 1,
        }
    }

    pub fn version(&self) -> u64 {
        self.membership_version
    }

    /// Record a heartbeat (or any packet) from `name`.
    /// Returns true if the peer came back from Failed.
    pub fn record_seen(&mut self, name: &NodeName) -> bool {
        match self.nodes.get_mut(name) {
            Some(node) => {
                node.last_seen = Instant::now();
                if node.status == NodeStatus::Failed {
                    node.status = NodeStatus::Active;
                    self.membership_version += 1;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub fn mark_failed(&mut self, name: &NodeName) -> bool {
        match self.nodes.get_mut(name) {
            Some(node) if node.status == NodeStatus::Active => {
                node.status = NodeStatus::Failed;
                self.membership_version += 1;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, name: &NodeName) -> Option<NodeStatus> {
        self.nodes.get(name).map(|node| node.status)
    }

    pub fn is_active(&self, name: &NodeName) -> bool {
        self.status(name) == Some(NodeStatus::Active)
    }

    /// Active peers with `role`, in stable name order
    pub fn active_with_role(&self, role: NodeRole) -> Vec<NodeName> {
        self.nodes
            .values()
            .filter(|node| node.role == role && node.status == NodeStatus::Active)
            .map(|node| node.name.clone())
            .collect()
    }

    /// Mark peers silent for longer than `failure_timeout` as Failed.
    /// Returns the newly failed peers.
    pub fn detect_failed_nodes(&mut self, failure_timeout: Duration) -> Vec<NodeName> {
        let now = Instant::now();
        let mut failed_nodes = Vec::new();

        for (name, node) in &mut self.nodes {
            if node.status == NodeStatus::Active
                && now.saturating_duration_since(node.last_seen) > failure_timeout
            {
                node.status = NodeStatus::Failed;
                failed_nodes.push(name.clone());
            }
        }

        if !failed_nodes.is_empty() {
            self.membership_version += 1;
        }
        failed_nodes
    }
}
