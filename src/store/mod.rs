//! Known-hosts store.
//!
//! [`HostStore`] is the raw backend contract: an expiring set of host
//! addresses with an atomic insert-if-absent. [`StoreHandle`] is what the
//! rest of the node talks to: it bounds every call by a timeout and reports
//! the three possible outcomes separately, since a timeout says nothing
//! about whether the operation took effect.
use std::collections::HashSet;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

pub mod memory;
pub mod messages;
pub mod remote;
pub mod server;

pub use memory::MemoryStore;
pub use messages::{StoreOp, StoreRequest, StoreResponse};
pub use remote::RemoteStore;
pub use server::StoreServer;

use crate::error::{HostwatchError, Result};

pub const DEFAULT_STORE_NAME: &str = "hostwatch/known/hosts";

#[async_trait]
pub trait HostStore: Send + Sync {
    fn name(&self) -> &str;

    async fn keys(&self) -> Result<HashSet<IpAddr>>;

    async fn get(&self, key: IpAddr) -> Result<Option<String>>;

    /// Returns true iff this call created the entry
    async fn insert_if_absent(&self, key: IpAddr, value: String, ttl: Duration) -> Result<bool>;
}

/// Result of one timeout-bound store call
#[derive(Debug)]
pub enum StoreOutcome<T> {
    Done(T),
    TimedOut,
    Failed(HostwatchError),
}

impl<T> StoreOutcome<T> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreOutcome::TimedOut)
    }

    pub fn done(self) -> Option<T> {
        match self {
            StoreOutcome::Done(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn HostStore>,
    timeout: Duration,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("store", &self.store.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StoreHandle {
    pub fn new(store: Arc<dyn HostStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, call: F) -> StoreOutcome<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.timeout, call).await {
            Ok(Ok(value)) => StoreOutcome::Done(value),
            // a backend that gave up waiting on the network is indeterminate too
            Ok(Err(HostwatchError::Timeout(_))) => StoreOutcome::TimedOut,
            Ok(Err(e)) => StoreOutcome::Failed(e),
            Err(_) => StoreOutcome::TimedOut,
        }
    }

    pub async fn keys(&self) -> StoreOutcome<HashSet<IpAddr>> {
        self.bounded(self.store.keys()).await
    }

    pub async fn get(&self, key: IpAddr) -> StoreOutcome<Option<String>> {
        self.bounded(self.store.get(key)).await
    }

    pub async fn insert_if_absent(
        &self,
        key: IpAddr,
        value: String,
        ttl: Duration,
    ) -> StoreOutcome<bool> {
        self.bounded(self.store.insert_if_absent(key, value, ttl))
            .await
    }
}
