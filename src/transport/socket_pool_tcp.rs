//! TCP Socket Pool for Request-Response Communication
//!
//! Frames are a 4-byte big-endian length followed by the payload. A
//! connection goes back to the pool only after a full request/response
//! exchange; a caller that gives up mid-exchange drops the connection
//! along with any reply still in flight.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::cluster::NodeName;
use crate::error::{HostwatchError, Result};

pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

#[derive(Debug)]
struct TcpConnection {
    stream: TcpStream,
    last_used: Instant,
}

impl TcpConnection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            last_used: Instant::now(),
        }
    }

    fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_used.elapsed() > idle_timeout
    }
}

#[derive(Debug)]
pub struct TcpSocketPool {
    // idle connections per peer
    peer_connections: IndexMap<SocketAddr, Arc<Mutex<Vec<TcpConnection>>>>,
    node_name: NodeName,
    max_connections_per_peer: usize,
    io_timeout: Duration,
    idle_timeout: Duration,
    stats: Arc<TcpSocketPoolStats>,
}

#[derive(Debug, Default)]
pub struct TcpSocketPoolStats {
    pub peer_count: AtomicUsize,
    pub requests_sent: AtomicU64,
    pub responses_received: AtomicU64,
    pub connection_errors: AtomicU64,
    pub timeout_errors: AtomicU64,
}

impl TcpSocketPool {
    pub fn new(
        node_name: NodeName,
        peer_addrs: Vec<SocketAddr>,
        max_connections_per_peer: usize,
    ) -> Self {
        let mut peer_connections = IndexMap::new();
        for peer_addr in peer_addrs.iter() {
            peer_connections.insert(*peer_addr, Arc::new(Mutex::new(Vec::new())));
        }
        let stats = TcpSocketPoolStats::default();
        stats
            .peer_count
            .store(peer_connections.len(), Ordering::Relaxed);

        Self {
            peer_connections,
            node_name,
            max_connections_per_peer,
            io_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            stats: Arc::new(stats),
        }
    }

    /// Bound on each connect/read/write step
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Send a request and wait for the response from a specific peer
    pub async fn send_request_response(
        &self,
        target: SocketAddr,
        request_data: &[u8],
    ) -> Result<Vec<u8>> {
        self.stats.requests_sent.fetch_add(1, Ordering::Relaxed);
        let mut connection = self.get_or_create_connection(target).await?;

        let request_len = u32::try_from(request_data.len())
            .map_err(|_| crate::transport_error!("Request too large"))?;
        timeout(self.io_timeout, async {
            connection
                .stream
                .write_all(&request_len.to_be_bytes())
                .await?;
            connection.stream.write_all(request_data).await?;
            connection.stream.flush().await
        })
        .await
        .map_err(|_| self.timed_out("Request send timeout"))??;

        let mut len_bytes = [0u8; 4];
        timeout(self.io_timeout, connection.stream.read_exact(&mut len_bytes))
            .await
            .map_err(|_| self.timed_out("Response length read timeout"))?
            .map_err(|e| {
                crate::transport_error!("Failed to read response length: {}", e)
            })?;

        let response_len = u32::from_be_bytes(len_bytes) as usize;
        if response_len > MAX_FRAME_LEN {
            return Err(crate::transport_error!("Response too large"));
        }

        let mut response_data = vec![0u8; response_len];
        timeout(
            self.io_timeout,
            connection.stream.read_exact(&mut response_data),
        )
        .await
        .map_err(|_| self.timed_out("Response data read timeout"))?
        .map_err(|e| crate::transport_error!("Failed to read response data: {}", e))?;

        self.stats
            .responses_received
            .fetch_add(1, Ordering::Relaxed);
        self.return_connection(target, connection).await?;

        Ok(response_data)
    }

    fn timed_out(&self, what: &str) -> HostwatchError {
        self.stats.timeout_errors.fetch_add(1, Ordering::Relaxed);
        HostwatchError::Timeout(what.to_string())
    }

    async fn get_or_create_connection(&self, target: SocketAddr) -> Result<TcpConnection> {
        let connections_arc = self
            .peer_connections
            .get(&target)
            .ok_or_else(|| crate::transport_error!("Peer not found: {}", target))?;

        {
            let mut connections = connections_arc.lock().await;
            connections.retain(|conn| !conn.is_expired(self.idle_timeout));
            if let Some(mut conn) = connections.pop() {
                conn.last_used = Instant::now();
                return Ok(conn);
            }
        }

        match timeout(self.io_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                debug!(
                    "[{}] Created new TCP connection to {}",
                    self.node_name, target
                );
                Ok(TcpConnection::new(stream))
            }
            Ok(Err(e)) => {
                self.stats.connection_errors.fetch_add(1, Ordering::Relaxed);
                Err(crate::transport_error!(
                    "Failed to connect to {}: {}",
                    target, e
                ))
            }
            Err(_) => Err(self.timed_out(&format!("Connection timeout to {}", target))),
        }
    }

    async fn return_connection(
        &self,
        target: SocketAddr,
        mut connection: TcpConnection,
    ) -> Result<()> {
        let connections_arc = self
            .peer_connections
            .get(&target)
            .ok_or_else(|| crate::transport_error!("Peer not found: {}", target))?;

        connection.last_used = Instant::now();
        let mut connections = connections_arc.lock().await;
        if connections.len() < self.max_connections_per_peer {
            connections.push(connection);
        }
        Ok(())
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.peer_connections.keys().cloned().collect()
    }

    pub fn get_stats(&self) -> &TcpSocketPoolStats {
        &self.stats
    }

    /// Number of idle pooled connections to `target`
    pub async fn idle_connections(&self, target: SocketAddr) -> usize {
        match self.peer_connections.get(&target) {
            Some(connections) => connections.lock().await.len(),
            None => 0,
        }
    }
}
