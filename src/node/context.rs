//! State shared by every evaluation and message handler on one node
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::cluster::{ClusterMessage, Destination, Membership, MessageBus, NodeName, NodeRole, Router};
use crate::error::Result;
use crate::expiring_map::ExpiringMap;
use crate::filter::HostFilter;
use crate::host_record::HostRecord;
use crate::resolver::Resolver;
use crate::sink::HostSink;
use crate::store::{StoreHandle, StoreOutcome};

/// How one pipeline evaluation ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Evaluation {
    /// Outside the tracking policy
    Filtered,
    /// Already in this node's view
    AlreadyKnown,
    /// This node won the commit and logged the record
    Emitted(HostRecord),
    /// Someone else already committed the host
    Suppressed,
    /// Handed to another tier for the commit decision
    Relayed(Destination),
    /// Store error or no reachable committer; nothing logged, nothing kept
    Abandoned,
}

impl Evaluation {
    pub fn is_emitted(&self) -> bool {
        matches!(self, Evaluation::Emitted(_))
    }
}

pub struct NodeContext {
    pub name: NodeName,
    pub role: NodeRole,
    pub host_ttl: Duration,
    pub bootstrap_delay: Duration,
    pub filter: HostFilter,
    pub resolver: Resolver,
    pub store: Option<StoreHandle>,
    pub router: Router,
    pub membership: Arc<RwLock<Membership>>,
    pub bus: Arc<dyn MessageBus>,
    pub sink: Arc<dyn HostSink>,
    // hosts this node knows were logged in the current window
    view: Mutex<ExpiringMap<IpAddr, HostRecord>>,
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("host_ttl", &self.host_ttl)
            .field("store", &self.store)
            .finish()
    }
}

impl NodeContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: NodeName,
        role: NodeRole,
        host_ttl: Duration,
        bootstrap_delay: Duration,
        filter: HostFilter,
        resolver: Resolver,
        store: Option<StoreHandle>,
        router: Router,
        membership: Arc<RwLock<Membership>>,
        bus: Arc<dyn MessageBus>,
        sink: Arc<dyn HostSink>,
    ) -> Self {
        Self {
            name,
            role,
            host_ttl,
            bootstrap_delay,
            filter,
            resolver,
            store,
            router,
            membership,
            bus,
            sink,
            view: Mutex::new(ExpiringMap::new(host_ttl)),
        }
    }

    fn view(&self) -> Result<MutexGuard<'_, ExpiringMap<IpAddr, HostRecord>>> {
        self.view
            .lock()
            .map_err(|e| crate::concurrency_error!("Mutex lock fail {}", e))
    }

    pub fn uses_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_known(&self, host: &IpAddr) -> Result<bool> {
        self.view().map(|view| view.contains(host))
    }

    /// Record a host committed elsewhere. Last write wins.
    /// Returns true if the host was not yet in the view.
    pub fn merge(&self, record: HostRecord) -> Result<bool> {
        let mut view = self.view()?;
        let is_new = !view.contains(&record.host);
        view.put(record.host, record, self.host_ttl);
        Ok(is_new)
    }

    /// Atomically claim a host in the view; true if this call inserted it
    pub fn claim_locally(&self, record: HostRecord) -> Result<bool> {
        self.view()
            .map(|mut view| view.insert_if_absent(record.host, record, self.host_ttl))
    }

    /// Live view, ordered by address
    pub fn known_hosts(&self) -> Result<Vec<HostRecord>> {
        let mut records: Vec<HostRecord> =
            self.view()?.iter().map(|(_, record)| record.clone()).collect();
        records.sort_by_key(|record| record.host);
        Ok(records)
    }

    pub fn view_len(&self) -> Result<usize> {
        self.view().map(|view| view.len())
    }

    pub fn expire_view(&self) -> Result<usize> {
        self.view().map(|mut view| view.expire_keys())
    }

    pub fn emit(&self, record: HostRecord) {
        self.sink.emit(record);
    }

    /// Send `message` to every peer behind `destination`.
    /// Delivery is best-effort; failures are logged and skipped.
    /// Returns how many peers accepted the message.
    pub async fn publish(&self, destination: &Destination, message: &ClusterMessage) -> usize {
        let mut delivered = 0;
        for target in self.router.targets(destination) {
            match self.bus.send_to(&target, message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "[{}] Failed to send {} to {}: {}",
                    self.name,
                    message.kind(),
                    target,
                    e
                ),
            }
        }
        delivered
    }

    /// Publish toward the committing tier. A proxy that cannot be reached is
    /// marked failed and the manager takes the message instead.
    /// Returns where the message was delivered, if anywhere.
    pub async fn relay(
        &self,
        destination: Destination,
        message: &ClusterMessage,
    ) -> Result<Option<Destination>> {
        if self.publish(&destination, message).await > 0 {
            return Ok(Some(destination));
        }
        let proxy = match &destination {
            Destination::Node(proxy) => proxy,
            _ => return Ok(None),
        };

        let newly_failed = self
            .membership
            .write()
            .map_err(|e| crate::concurrency_error!("RwLock write fail {}", e))?
            .mark_failed(proxy);
        if newly_failed {
            warn!(
                "[{}] Proxy {} unreachable, marking failed and falling back to manager",
                self.name, proxy
            );
        }

        if self.publish(&Destination::Manager, message).await > 0 {
            Ok(Some(Destination::Manager))
        } else {
            Ok(None)
        }
    }

    /// Decide whether `record` is new in this window, acting as the committing tier.
    ///
    /// With a store the decision is the store's insert-if-absent; a timed-out
    /// insert counts as a win. Without one this node's own view decides.
    pub async fn commit_as_authority(&self, record: HostRecord) -> Result<Evaluation> {
        let store = match &self.store {
            Some(store) => store,
            None => {
                return if self.claim_locally(record.clone())? {
                    self.emit(record.clone());
                    Ok(Evaluation::Emitted(record))
                } else {
                    Ok(Evaluation::Suppressed)
                };
            }
        };

        match store
            .insert_if_absent(record.host, record.hostname.clone(), self.host_ttl)
            .await
        {
            StoreOutcome::Done(true) => {
                self.merge(record.clone())?;
                self.emit(record.clone());
                Ok(Evaluation::Emitted(record))
            }
            StoreOutcome::TimedOut => {
                warn!(
                    "[{}] Store insert for {} timed out after {:?}, logging anyway",
                    self.name,
                    record.host,
                    store.timeout()
                );
                self.merge(record.clone())?;
                self.emit(record.clone());
                Ok(Evaluation::Emitted(record))
            }
            StoreOutcome::Done(false) => {
                debug!("[{}] {} already in store", self.name, record.host);
                self.merge(record)?;
                Ok(Evaluation::Suppressed)
            }
            StoreOutcome::Failed(e) => {
                error!(
                    host = %record.host,
                    error = %e,
                    "[{}] Store insert failed, dropping discovery",
                    self.name
                );
                Ok(Evaluation::Abandoned)
            }
        }
    }
}
