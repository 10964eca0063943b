use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::context::NodeContext;
use super::pipeline::DiscoveryPipeline;
use super::roles::RoleStrategy;
use crate::cluster::{ClusterMessage, ClusterPacket, Destination, NodeName, NodeRole};
use crate::connection::ConnectionEvent;
use crate::error::{HostwatchError, Result};
use crate::host_record::HostRecord;
use crate::settings::Settings;
use crate::store::MemoryStore;

/// Commands handled by a node's event loop
#[derive(Debug)]
pub enum NodeCommand {
    /// A tracked TCP connection completed its handshake
    ConnectionEstablished { event: ConnectionEvent },
    /// Encoded [`ClusterPacket`] from a peer
    PacketReceived { data: Bytes },
    /// Drop expired entries; replies with how many went
    ExpireKeys {
        resp_chan: oneshot::Sender<Result<usize>>,
    },
    ListKnownHosts {
        resp_chan: oneshot::Sender<Result<Vec<HostRecord>>>,
    },
    Status {
        resp_chan: oneshot::Sender<Result<NodeStatusReport>>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusReport {
    pub node_name: NodeName,
    pub role: NodeRole,
    /// Store name when the host store is in use
    pub store: Option<String>,
    pub known_hosts: usize,
    pub live_proxies: Vec<NodeName>,
    pub membership_version: u64,
}

pub struct NodeController {
    ctx: Arc<NodeContext>,
    strategy: Arc<dyn RoleStrategy>,
    pipeline: DiscoveryPipeline,
    // set when this node hosts the store in memory
    local_store: Option<Arc<MemoryStore>>,
    heartbeat_interval: Duration,
    failure_timeout: Duration,
    expire_interval: Duration,
}

impl std::fmt::Debug for NodeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeController")
            .field("name", &self.ctx.name)
            .field("role", &self.ctx.role)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("failure_timeout", &self.failure_timeout)
            .field("expire_interval", &self.expire_interval)
            .finish()
    }
}

impl NodeController {
    pub fn new(
        ctx: Arc<NodeContext>,
        strategy: Arc<dyn RoleStrategy>,
        local_store: Option<Arc<MemoryStore>>,
        settings: &Settings,
    ) -> Self {
        let pipeline = DiscoveryPipeline::new(ctx.clone(), strategy.clone());
        Self {
            ctx,
            strategy,
            pipeline,
            local_store,
            heartbeat_interval: settings.heartbeat_interval(),
            failure_timeout: settings.failure_timeout(),
            expire_interval: settings.expire_interval(),
        }
    }

    /// Run the node's event loop until every command sender is gone
    pub async fn start(self, mut command_rx: mpsc::Receiver<NodeCommand>) {
        let name = self.ctx.name.clone();
        info!(
            "[{}] Starting {} event loop ({} peers, store: {})",
            name,
            self.ctx.role,
            self.ctx.router.topology().len(),
            self.ctx
                .store
                .as_ref()
                .map(|store| store.name().to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );

        let startup_ctx = self.ctx.clone();
        let strategy = self.strategy.clone();
        tokio::spawn(async move {
            if let Err(e) = strategy.on_startup(&startup_ctx).await {
                error!("[{}] Startup hook failed: {}", startup_ctx.name, e);
            }
        });

        let mut heartbeat_timer = time::interval(self.heartbeat_interval);
        let mut expire_timer = time::interval(self.expire_interval);
        // first tick of an interval fires immediately
        expire_timer.tick().await;

        loop {
            tokio::select! {
                Some(cmd) = command_rx.recv() => {
                    if let Err(e) = self.handle_command(cmd) {
                        debug!("[{}] Error processing command: {}", name, e);
                    }
                }
                _ = heartbeat_timer.tick() => {
                    self.handle_heartbeat_tick().await;
                }
                _ = expire_timer.tick() => {
                    if let Err(e) = self.expire_keys() {
                        warn!("[{}] Error expiring keys: {}", name, e);
                    }
                }
                else => {
                    info!("[{}] Command channel closed, exiting", name);
                    break;
                }
            }
        }
    }

    fn handle_command(&self, cmd: NodeCommand) -> Result<()> {
        match cmd {
            NodeCommand::ConnectionEstablished { event } => {
                // evaluations run detached; the loop never waits on a lookup
                self.pipeline.on_connection(&event);
                Ok(())
            }
            NodeCommand::PacketReceived { data } => self.process_packet(data),
            NodeCommand::ExpireKeys { resp_chan } => {
                let result = self.expire_keys();
                resp_chan
                    .send(result)
                    .map_err(|_| HostwatchError::Node("Expire reply dropped".to_string()))
            }
            NodeCommand::ListKnownHosts { resp_chan } => resp_chan
                .send(self.ctx.known_hosts())
                .map_err(|_| HostwatchError::Node("Known hosts reply dropped".to_string())),
            NodeCommand::Status { resp_chan } => resp_chan
                .send(self.status())
                .map_err(|_| HostwatchError::Node("Status reply dropped".to_string())),
        }
    }

    fn process_packet(&self, data: Bytes) -> Result<()> {
        let packet = ClusterPacket::deserialize(&data)?;
        // Don't process our own messages
        if packet.sender == self.ctx.name {
            return Ok(());
        }

        let revived = self
            .ctx
            .membership
            .write()
            .map_err(|e| crate::concurrency_error!("RwLock write fail {}", e))?
            .record_seen(&packet.sender);
        if revived {
            info!("[{}] Peer {} is back", self.ctx.name, packet.sender);
        }

        if let ClusterMessage::Heartbeat { .. } = packet.message {
            return Ok(());
        }

        let ctx = self.ctx.clone();
        let strategy = self.strategy.clone();
        tokio::spawn(async move {
            let kind = packet.message.kind();
            if let Err(e) = strategy
                .handle_message(&ctx, &packet.sender, packet.message)
                .await
            {
                warn!(
                    "[{}] Failed handling {} from {}: {}",
                    ctx.name, kind, packet.sender, e
                );
            }
        });
        Ok(())
    }

    async fn handle_heartbeat_tick(&self) {
        let peers = self.ctx.router.all_peers();
        if peers.is_empty() {
            return;
        }

        let message = ClusterMessage::Heartbeat {
            timestamp: Utc::now().timestamp_millis(),
        };
        for peer in peers {
            self.ctx
                .publish(&Destination::Node(peer), &message)
                .await;
        }

        match self.ctx.membership.write() {
            Ok(mut members) => {
                for failed in members.detect_failed_nodes(self.failure_timeout) {
                    warn!(
                        "[{}] No heartbeat from {} for {:?}, marking failed",
                        self.ctx.name, failed, self.failure_timeout
                    );
                }
            }
            Err(e) => error!("[{}] Membership lock poisoned: {}", self.ctx.name, e),
        }
    }

    fn expire_keys(&self) -> Result<usize> {
        let mut expired = self.ctx.expire_view()?;
        if let Some(store) = &self.local_store {
            expired += store.expire_keys()?;
        }
        if expired > 0 {
            debug!("[{}] Expired {} entries", self.ctx.name, expired);
        }
        Ok(expired)
    }

    fn status(&self) -> Result<NodeStatusReport> {
        let membership_version = self
            .ctx
            .membership
            .read()
            .map_err(|e| crate::concurrency_error!("RwLock read fail {}", e))?
            .version();
        Ok(NodeStatusReport {
            node_name: self.ctx.name.clone(),
            role: self.ctx.role,
            store: self.ctx.store.as_ref().map(|store| store.name().to_string()),
            known_hosts: self.ctx.view_len()?,
            live_proxies: self.ctx.router.live_proxies()?,
            membership_version,
        })
    }
}
