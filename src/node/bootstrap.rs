//! Seeding workers from an existing store.
//!
//! The manager lists the store's keys, fires one `get` per key, waits a fixed
//! settling delay, then pushes whatever arrived to every worker. Keys whose
//! fetch fails or lands after the delay are simply left out.
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::context::NodeContext;
use crate::cluster::{ClusterMessage, Destination};
use crate::error::{HostwatchError, Result};
use crate::host_record::HostRecord;
use crate::store::StoreOutcome;

/// `None` once the settling delay has passed and the set was taken
type Staging = Arc<Mutex<Option<HashMap<IpAddr, String>>>>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub keys: usize,
    pub fetched: usize,
    pub batches: usize,
}

pub struct BootstrapCoordinator {
    ctx: Arc<NodeContext>,
    settling_delay: Duration,
}

impl BootstrapCoordinator {
    pub fn new(ctx: Arc<NodeContext>, settling_delay: Duration) -> Self {
        Self {
            ctx,
            settling_delay,
        }
    }

    pub async fn run(&self) -> Result<BootstrapReport> {
        let store = self
            .ctx
            .store
            .clone()
            .ok_or_else(|| HostwatchError::Node("Bootstrap needs a host store".to_string()))?;
        let name = &self.ctx.name;

        let keys = match store.keys().await {
            StoreOutcome::Done(keys) => keys,
            StoreOutcome::TimedOut => {
                warn!("[{}] Listing store keys timed out, skipping bootstrap", name);
                return Ok(BootstrapReport::default());
            }
            StoreOutcome::Failed(e) => {
                error!(error = %e, "[{}] Listing store keys failed, skipping bootstrap", name);
                return Ok(BootstrapReport::default());
            }
        };
        info!(
            "[{}] Bootstrapping from {} stored hosts, settling for {:?}",
            name,
            keys.len(),
            self.settling_delay
        );

        let staging: Staging = Arc::new(Mutex::new(Some(HashMap::new())));
        for key in keys.iter().copied() {
            let store = store.clone();
            let staging = staging.clone();
            let name = name.clone();
            tokio::spawn(async move {
                match store.get(key).await {
                    StoreOutcome::Done(Some(hostname)) => match staging.lock() {
                        Ok(mut guard) => match guard.as_mut() {
                            Some(staged) => {
                                staged.insert(key, hostname);
                            }
                            None => debug!("[{}] Late bootstrap value for {} dropped", name, key),
                        },
                        Err(e) => error!("[{}] Bootstrap staging lock poisoned: {}", name, e),
                    },
                    StoreOutcome::Done(None) => {
                        debug!("[{}] {} expired before it could be fetched", name, key)
                    }
                    StoreOutcome::TimedOut => debug!("[{}] Fetching {} timed out", name, key),
                    StoreOutcome::Failed(e) => debug!("[{}] Fetching {} failed: {}", name, key, e),
                }
            });
        }

        tokio::time::sleep(self.settling_delay).await;

        let staged = staging
            .lock()
            .map_err(|e| crate::concurrency_error!("Mutex lock fail {}", e))?
            .take()
            .unwrap_or_default();

        let mut records: Vec<HostRecord> = staged
            .into_iter()
            .map(|(host, hostname)| HostRecord::new(host, hostname))
            .collect();
        records.sort_by_key(|record| record.host);
        let fetched = records.len();

        for record in records.iter().cloned() {
            self.ctx.merge(record)?;
        }

        let batches = ClusterMessage::sync_batches(records);
        let batch_count = batches.len();
        for batch in batches {
            self.ctx.publish(&Destination::Workers, &batch).await;
        }

        Ok(BootstrapReport {
            keys: keys.len(),
            fetched,
            batches: batch_count,
        })
    }
}
