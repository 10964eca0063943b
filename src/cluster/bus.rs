//! Delivery of cluster messages to named peers.
//!
//! [`UdpBus`] is the deployed transport. [`LocalHub`] wires several nodes
//! living in one process together; packets still go through the wire
//! codec so both paths decode the same way on arrival.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{ClusterMessage, ClusterPacket, NodeName, Topology};
use crate::error::Result;
use crate::node::NodeCommand;
use crate::transport::{FrozenSocketPoolStats, UdpSocketPool};

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn send_to(&self, target: &NodeName, message: &ClusterMessage) -> Result<()>;
}

#[derive(Debug)]
pub struct UdpBus {
    node_name: NodeName,
    pool: UdpSocketPool,
}

impl UdpBus {
    pub async fn new(node_name: NodeName, topology: &Topology) -> Result<Self> {
        let pool = UdpSocketPool::new(node_name.clone(), topology.peers()).await?;
        Ok(Self { node_name, pool })
    }

    pub fn get_stats(&self) -> FrozenSocketPoolStats {
        self.pool.get_stats()
    }
}

#[async_trait]
impl MessageBus for UdpBus {
    async fn send_to(&self, target: &NodeName, message: &ClusterMessage) -> Result<()> {
        let packet = ClusterPacket::new(self.node_name.clone(), message.clone());
        let data = packet.serialize()?;
        self.pool.send_to(target, &data).await.map(|_| ())
    }
}

/// In-process switchboard between node command channels
#[derive(Clone, Debug, Default)]
pub struct LocalHub {
    nodes: Arc<Mutex<HashMap<NodeName, mpsc::Sender<NodeCommand>>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: NodeName, command_tx: mpsc::Sender<NodeCommand>) -> Result<()> {
        self.nodes
            .lock()
            .map_err(|e| crate::concurrency_error!("Mutex lock fail {}", e))?
            .insert(name, command_tx);
        Ok(())
    }

    pub fn bus(&self, node_name: NodeName) -> LocalBus {
        LocalBus {
            node_name,
            hub: self.clone(),
        }
    }

    fn sender_for(&self, name: &NodeName) -> Result<mpsc::Sender<NodeCommand>> {
        self.nodes
            .lock()
            .map_err(|e| crate::concurrency_error!("Mutex lock fail {}", e))?
            .get(name)
            .cloned()
            .ok_or_else(|| crate::transport_error!("Peer not found: {}", name))
    }
}

#[derive(Clone, Debug)]
pub struct LocalBus {
    node_name: NodeName,
    hub: LocalHub,
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn send_to(&self, target: &NodeName, message: &ClusterMessage) -> Result<()> {
        let command_tx = self.hub.sender_for(target)?;
        let packet = ClusterPacket::new(self.node_name.clone(), message.clone());
        let data = Bytes::from(packet.serialize()?);
        command_tx
            .send(NodeCommand::PacketReceived { data })
            .await
            .map_err(|_| crate::transport_error!("Peer {} has shut down", target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostwatchError;
    use crate::host_record::HostRecord;

    #[tokio::test]
    async fn test_local_bus_delivers_encoded_packets() {
        let hub = LocalHub::new();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(NodeName::from("mgr"), tx).unwrap();

        let bus = hub.bus(NodeName::from("p1"));
        let message = ClusterMessage::HostCommitted {
            record: HostRecord::new("10.0.0.5".parse().unwrap(), "host5.example.com"),
        };
        bus.send_to(&NodeName::from("mgr"), &message).await.unwrap();

        match rx.recv().await {
            Some(NodeCommand::PacketReceived { data }) => {
                let packet = ClusterPacket::deserialize(&data).unwrap();
                assert_eq!(packet.sender, NodeName::from("p1"));
                assert_eq!(packet.message, message);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_peer_is_a_transport_error() {
        let hub = LocalHub::new();
        let bus = hub.bus(NodeName::from("p1"));
        let result = bus
            .send_to(
                &NodeName::from("nobody"),
                &ClusterMessage::Heartbeat { timestamp: 0 },
            )
            .await;
        assert!(matches!(result, Err(HostwatchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_udp_bus_sends_packets() {
        let listener = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = super::super::PeerSpec {
            name: NodeName::from("mgr"),
            role: super::super::NodeRole::Manager,
            address: listener.local_addr().unwrap(),
        };
        let topology = Topology::new(&NodeName::from("w1"), &[peer]).unwrap();
        let bus = UdpBus::new(NodeName::from("w1"), &topology).await.unwrap();

        bus.send_to(
            &NodeName::from("mgr"),
            &ClusterMessage::Heartbeat { timestamp: 42 },
        )
        .await
        .unwrap();

        let mut buf = vec![0u8; 1024];
        let (len, _) = listener.recv_from(&mut buf).await.unwrap();
        let packet = ClusterPacket::deserialize(&buf[..len]).unwrap();
        assert_eq!(packet.sender, NodeName::from("w1"));
        assert_eq!(packet.message, ClusterMessage::Heartbeat { timestamp: 42 });
        assert_eq!(bus.get_stats().messages_sent, 1);
    }
}
