//! TCP Receiver
//!
//! Accepts length-prefixed request frames and forwards each one, with a
//! reply channel, to a handler task. Connections stay open for further
//! requests until the client hangs up.
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::receiver::{FrozenReceiverStats, ReceiverStats};
use super::socket_pool_tcp::MAX_FRAME_LEN;
use crate::error::Result;

/// A request with a channel to send the response back
#[derive(Debug)]
pub struct TcpRequest {
    pub data: Bytes,
    pub peer_addr: SocketAddr,
    pub response_tx: oneshot::Sender<Vec<u8>>,
}

pub struct TcpReceiver {
    pub local_addr: SocketAddr,
    socket: Arc<TcpListener>,
    stats: Arc<ReceiverStats>,
    message_tx: mpsc::Sender<TcpRequest>,
}

impl TcpReceiver {
    pub async fn new(bind_addr: SocketAddr, message_tx: mpsc::Sender<TcpRequest>) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| crate::transport_error!("Socket creation failed: {}", e))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| crate::transport_error!("Socket creation failed: {}", e))?;

        Ok(Self {
            message_tx,
            local_addr,
            socket: Arc::new(socket),
            stats: Arc::new(ReceiverStats::default()),
        })
    }

    /// Spawn the accept loop
    pub fn start(&self) -> JoinHandle<()> {
        let socket = self.socket.clone();
        let stats = self.stats.clone();
        let tx = self.message_tx.clone();

        tokio::spawn(async move {
            loop {
                let (stream, peer_addr) = match socket.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("TCP accept failed: {}", e);
                        continue;
                    }
                };
                tokio::spawn(serve_connection(stream, peer_addr, tx.clone(), stats.clone()));
            }
        })
    }

    pub fn get_stats(&self) -> FrozenReceiverStats {
        self.stats.freeze()
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    tx: mpsc::Sender<TcpRequest>,
    stats: Arc<ReceiverStats>,
) {
    loop {
        let mut len_bytes = [0u8; 4];
        if stream.read_exact(&mut len_bytes).await.is_err() {
            // client closed the connection
            return;
        }

        let msg_len = u32::from_be_bytes(len_bytes) as usize;
        if msg_len > MAX_FRAME_LEN {
            stats.receive_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Message from {} too large: {} bytes", peer_addr, msg_len);
            return;
        }

        let mut buf = vec![0u8; msg_len];
        if let Err(e) = stream.read_exact(&mut buf).await {
            stats.receive_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to read message data from {}: {}", peer_addr, e);
            return;
        }
        stats.messages_received.fetch_add(1, Ordering::Relaxed);

        let (response_tx, response_rx) = oneshot::channel();
        let request = TcpRequest {
            data: Bytes::from(buf),
            peer_addr,
            response_tx,
        };
        if tx.send(request).await.is_err() {
            debug!("Request handler is gone, closing {}", peer_addr);
            return;
        }

        let response_data = match response_rx.await {
            Ok(response_data) => response_data,
            Err(_) => {
                warn!("Handler dropped response channel for {}", peer_addr);
                return;
            }
        };

        let len = response_data.len() as u32;
        let written = async {
            stream.write_all(&len.to_be_bytes()).await?;
            stream.write_all(&response_data).await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = written {
            debug!("Failed to write response to {}: {}", peer_addr, e);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_receiver_creation() {
        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 0);
        let (tx, _rx) = mpsc::channel(16);
        let receiver = TcpReceiver::new(bind_addr, tx).await.unwrap();

        assert!(receiver.local_addr.port() > 0);
        assert_eq!(receiver.get_stats().messages_received, 0);
    }

    #[tokio::test]
    async fn test_receiver_round_trip() {
        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 0);
        let (tx, mut rx) = mpsc::channel(16);
        let receiver = TcpReceiver::new(bind_addr, tx).await.unwrap();
        receiver.start();

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let mut reply = b"re:".to_vec();
                reply.extend_from_slice(&request.data);
                let _ = request.response_tx.send(reply);
            }
        });

        let mut client = TcpStream::connect(receiver.local_addr).await.unwrap();
        for message in [&b"one"[..], &b"two"[..]] {
            client
                .write_all(&(message.len() as u32).to_be_bytes())
                .await
                .unwrap();
            client.write_all(message).await.unwrap();

            let mut len = [0u8; 4];
            timeout(Duration::from_secs(1), client.read_exact(&mut len))
                .await
                .unwrap()
                .unwrap();
            let mut reply = vec![0u8; u32::from_be_bytes(len) as usize];
            client.read_exact(&mut reply).await.unwrap();
            assert_eq!(&reply[..3], b"re:");
            assert_eq!(&reply[3..], message);
        }
        assert_eq!(receiver.get_stats().messages_received, 2);
    }
}
