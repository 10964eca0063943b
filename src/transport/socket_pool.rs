//! UDP Socket Pool
//!
//! One outbound UDP socket per named peer.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::net::UdpSocket;
use tracing::error;

use crate::cluster::{NodeName, PeerSpec};
use crate::error::{HostwatchError, Result};

struct PeerSocket {
    address: SocketAddr,
    socket: UdpSocket,
}

/// Pool of UDP sockets for peer communication
pub struct UdpSocketPool {
    peers: IndexMap<NodeName, Arc<PeerSocket>>,
    // for debugging, identifying the node
    node_name: NodeName,
    stats: Arc<SocketPoolStats>,
}

impl std::fmt::Debug for UdpSocketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSocketPool")
            .field("node_name", &self.node_name)
            .field("peers", &self.peers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Statistics for the socket pool
#[derive(Debug, Default)]
pub struct SocketPoolStats {
    pub peer_count: AtomicUsize,
    pub messages_sent: AtomicU64,
    pub send_errors: AtomicU64,
}

/// Point-in-time copy of [`SocketPoolStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrozenSocketPoolStats {
    pub peer_count: usize,
    pub messages_sent: u64,
    pub send_errors: u64,
}

async fn bind_for(address: &SocketAddr) -> Result<UdpSocket> {
    let bind_address = if address.is_ipv6() {
        "[::]:0"
    } else {
        "0.0.0.0:0"
    };
    UdpSocket::bind(bind_address)
        .await
        .map_err(|e| crate::transport_error!("Socket creation failed: {}", e))
}

impl UdpSocketPool {
    pub async fn new<'a>(
        node_name: NodeName,
        peers: impl IntoIterator<Item = &'a PeerSpec>,
    ) -> Result<Self> {
        let mut pool = Self {
            peers: IndexMap::new(),
            node_name,
            stats: Arc::new(SocketPoolStats::default()),
        };
        for peer in peers {
            pool.add_peer(peer).await?;
        }
        Ok(pool)
    }

    /// Send one datagram to the named peer
    pub async fn send_to(&self, target: &NodeName, data: &[u8]) -> Result<SocketAddr> {
        let peer = self
            .peers
            .get(target)
            .ok_or_else(|| crate::transport_error!("Peer not found: {}", target))?;

        match peer.socket.send_to(data, peer.address).await {
            Ok(_write_size) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(peer.address)
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                error!(
                    "[{}] Failed to send UDP data to {} ({}): {}",
                    self.node_name, target, peer.address, e
                );
                Err(HostwatchError::Io(e))
            }
        }
    }

    async fn add_peer(&mut self, peer: &PeerSpec) -> Result<()> {
        let socket = bind_for(&peer.address).await?;
        self.peers.insert(
            peer.name.clone(),
            Arc::new(PeerSocket {
                address: peer.address,
                socket,
            }),
        );
        self.stats
            .peer_count
            .store(self.peers.len(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get_stats(&self) -> FrozenSocketPoolStats {
        FrozenSocketPoolStats {
            peer_count: self.stats.peer_count.load(Ordering::Relaxed),
            messages_sent: self.stats.messages_sent.load(Ordering::Relaxed),
            send_errors: self.stats.send_errors.load(Ordering::Relaxed),
        }
    }
}
