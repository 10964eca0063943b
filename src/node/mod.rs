//! A running hostwatch node and the pieces its event loop drives
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

pub mod bootstrap;
pub mod context;
pub mod controller;
pub mod pipeline;
pub mod roles;

pub use bootstrap::{BootstrapCoordinator, BootstrapReport};
pub use context::{Evaluation, NodeContext};
pub use controller::{NodeCommand, NodeController, NodeStatusReport};
pub use pipeline::DiscoveryPipeline;
pub use roles::{strategy_for, RoleStrategy};

use crate::cluster::{
    LocalHub, Membership, MessageBus, NodeName, NodeRole, Router, Topology, UdpBus,
};
use crate::connection::ConnectionEvent;
use crate::error::{HostwatchError, Result};
use crate::host_record::HostRecord;
use crate::resolver::{ReverseLookup, Resolver, SystemLookup};
use crate::settings::Settings;
use crate::sink::{HostSink, TracingSink};
use crate::store::{HostStore, MemoryStore, RemoteStore, StoreHandle, StoreServer};
use crate::transport::UdpReceiver;

const COMMAND_CHANNEL_SIZE: usize = 10_000;

/// Handle to a running node's event loop
#[derive(Clone, Debug)]
pub struct Node {
    name: NodeName,
    role: NodeRole,
    command_tx: mpsc::Sender<NodeCommand>,
}

impl Node {
    pub async fn start(settings: Settings) -> Result<Self> {
        NodeBuilder::new(settings).start().await
    }

    pub fn name(&self) -> &NodeName {
        &self.name
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    async fn send(&self, command: NodeCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|e| HostwatchError::Node(format!("Node event loop is gone: {}", e)))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> NodeCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await
            .map_err(|e| HostwatchError::Node(format!("Node dropped the reply: {}", e)))?
    }

    pub async fn connection_established(&self, event: ConnectionEvent) -> Result<()> {
        self.send(NodeCommand::ConnectionEstablished { event }).await
    }

    pub async fn known_hosts(&self) -> Result<Vec<HostRecord>> {
        self.request(|resp_chan| NodeCommand::ListKnownHosts { resp_chan })
            .await
    }

    pub async fn status(&self) -> Result<NodeStatusReport> {
        self.request(|resp_chan| NodeCommand::Status { resp_chan })
            .await
    }

    pub async fn expire_keys(&self) -> Result<usize> {
        self.request(|resp_chan| NodeCommand::ExpireKeys { resp_chan })
            .await
    }
}

/// Assembles a node; every collaborator defaults to the deployed one
pub struct NodeBuilder {
    settings: Settings,
    lookup: Option<Arc<dyn ReverseLookup>>,
    sink: Option<Arc<dyn HostSink>>,
    store: Option<Arc<dyn HostStore>>,
    hub: Option<LocalHub>,
}

impl NodeBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            lookup: None,
            sink: None,
            store: None,
            hub: None,
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn ReverseLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn HostSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use this backend instead of the one the role would build
    pub fn with_store(mut self, store: Arc<dyn HostStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Talk to peers through an in-process hub instead of UDP
    pub fn with_local_hub(mut self, hub: LocalHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub async fn start(self) -> Result<Node> {
        let settings = self.settings;
        settings.validate()?;

        let name = settings.node_name.clone();
        let role = settings.role;
        if role == NodeRole::Standalone && !settings.peers.is_empty() {
            info!(
                "[{}] Starting in standalone mode (ignoring {} peers)",
                name,
                settings.peers.len()
            );
        }

        let topology = Arc::new(settings.topology()?);
        let membership = Arc::new(RwLock::new(Membership::from_topology(&topology)));
        let router = Router::new(
            name.clone(),
            role,
            topology.clone(),
            membership.clone(),
            settings.routing_key.clone(),
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let bus = build_bus(&settings, &topology, self.hub, command_tx.clone()).await?;

        let mut local_store = None;
        let store = if settings.use_host_store {
            let backend: Arc<dyn HostStore> = match self.store {
                Some(store) => store,
                None if settings.hosts_store() => {
                    let memory = Arc::new(MemoryStore::new(
                        settings.store_name.clone(),
                        settings.host_ttl(),
                    ));
                    if role == NodeRole::Manager {
                        StoreServer::bind(
                            name.clone(),
                            memory.clone(),
                            settings.store_bind_address(),
                        )
                        .await?
                        .start();
                    }
                    local_store = Some(memory.clone());
                    memory
                }
                None => {
                    let address = settings.store_address.ok_or_else(|| {
                        crate::config_error!("Missing --store-address")
                    })?;
                    Arc::new(
                        RemoteStore::new(name.clone(), settings.store_name.clone(), address)
                            .with_io_timeout(settings.store_timeout()),
                    )
                }
            };
            Some(StoreHandle::new(backend, settings.store_timeout()))
        } else {
            None
        };

        let lookup = self
            .lookup
            .unwrap_or_else(|| Arc::new(SystemLookup) as Arc<dyn ReverseLookup>);
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn HostSink>);

        let ctx = Arc::new(NodeContext::new(
            name.clone(),
            role,
            settings.host_ttl(),
            settings.bootstrap_delay(),
            settings.host_filter(),
            Resolver::new(lookup, settings.resolver_timeout()),
            store,
            router,
            membership,
            bus,
            sink,
        ));
        let controller = NodeController::new(ctx, strategy_for(role), local_store, &settings);
        tokio::spawn(controller.start(command_rx));

        Ok(Node {
            name,
            role,
            command_tx,
        })
    }
}

async fn build_bus(
    settings: &Settings,
    topology: &Topology,
    hub: Option<LocalHub>,
    command_tx: mpsc::Sender<NodeCommand>,
) -> Result<Arc<dyn MessageBus>> {
    let name = settings.node_name.clone();
    if let Some(hub) = hub {
        hub.register(name.clone(), command_tx)?;
        return Ok(Arc::new(hub.bus(name)));
    }

    if !topology.is_empty() {
        let receiver = UdpReceiver::new(settings.udp_address()).await?;
        info!("[{}] Listening for cluster packets on {}", name, receiver.local_addr());
        let log_name = name.clone();
        receiver.start_receiving(move |data, peer_addr| {
            match command_tx.try_send(NodeCommand::PacketReceived { data }) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("[{}] Command queue full, dropping packet from {}", log_name, peer_addr);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
    Ok(Arc::new(UdpBus::new(name, topology).await?))
}
