//! Reverse DNS resolution bound by a timeout.
//!
//! [`Resolver::resolve`] never fails: a lookup error or a timeout both yield
//! [`UNKNOWN_HOSTNAME`]. A lookup that outlives its timeout keeps running on the
//! blocking pool, but its answer has nowhere to go and is dropped.
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{HostwatchError, Result};
use crate::host_record::{normalize_hostname, UNKNOWN_HOSTNAME};

/// Source of reverse-lookup answers
#[async_trait]
pub trait ReverseLookup: Send + Sync {
    async fn lookup(&self, addr: IpAddr) -> Result<String>;
}

/// PTR lookups through the system resolver
#[derive(Clone, Debug, Default)]
pub struct SystemLookup;

#[async_trait]
impl ReverseLookup for SystemLookup {
    async fn lookup(&self, addr: IpAddr) -> Result<String> {
        tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr))
            .await
            .map_err(|e| HostwatchError::Resolver(format!("lookup task failed: {}", e)))?
            .map_err(|e| HostwatchError::Resolver(format!("{}: {}", addr, e)))
    }
}

/// Fixed answers, with an optional artificial delay.
/// Addresses without an entry fail to resolve.
#[derive(Clone, Debug, Default)]
pub struct StaticLookup {
    names: HashMap<IpAddr, String>,
    delay: Option<Duration>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, addr: IpAddr, name: impl Into<String>) -> Self {
        self.names.insert(addr, name.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ReverseLookup for StaticLookup {
    async fn lookup(&self, addr: IpAddr) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.names
            .get(&addr)
            .cloned()
            .ok_or_else(|| HostwatchError::Resolver(format!("no PTR record for {}", addr)))
    }
}

#[derive(Clone)]
pub struct Resolver {
    lookup: Arc<dyn ReverseLookup>,
    timeout: Duration,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Resolver {
    pub fn new(lookup: Arc<dyn ReverseLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `addr` to a hostname, or the sentinel on failure/timeout.
    pub async fn resolve(&self, addr: IpAddr) -> String {
        match timeout(self.timeout, self.lookup.lookup(addr)).await {
            Ok(Ok(name)) => normalize_hostname(name),
            Ok(Err(e)) => {
                debug!("Reverse lookup failed for {}: {}", addr, e);
                UNKNOWN_HOSTNAME.to_string()
            }
            Err(_) => {
                debug!(
                    "Reverse lookup for {} timed out after {:?}",
                    addr, self.timeout
                );
                UNKNOWN_HOSTNAME.to_string()
            }
        }
    }
}
