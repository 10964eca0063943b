//! UDP Receiver
//!
//! Binds the cluster port and hands every datagram to a callback.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::Result;

/// Largest possible UDP payload
const RECV_BUFFER_SIZE: usize = 65536;

pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    stats: Arc<ReceiverStats>,
}

#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub messages_received: AtomicU64,
    pub receive_errors: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrozenReceiverStats {
    pub messages_received: u64,
    pub receive_errors: u64,
}

impl ReceiverStats {
    pub fn freeze(&self) -> FrozenReceiverStats {
        FrozenReceiverStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

impl UdpReceiver {
    pub async fn new(bind_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| crate::transport_error!("Socket creation failed: {}", e))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| crate::transport_error!("Socket creation failed: {}", e))?;

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            stats: Arc::new(ReceiverStats::default()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawn the receive loop. The loop ends when `callback` returns false.
    pub fn start_receiving<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(Bytes, SocketAddr) -> bool + Send + 'static,
    {
        let socket = Arc::clone(&self.socket);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUFFER_SIZE];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, addr)) => {
                        stats.messages_received.fetch_add(1, Ordering::Relaxed);
                        if !callback(Bytes::copy_from_slice(&buf[..len]), addr) {
                            break;
                        }
                    }
                    Err(e) => {
                        stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("UDP receive error on {:?}: {}", socket.local_addr(), e);
                    }
                }
            }
        })
    }

    pub fn get_stats(&self) -> FrozenReceiverStats {
        self.stats.freeze()
    }
}
