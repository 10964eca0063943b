//! Per-connection discovery: filter, dedup check, resolve, commit.
use std::net::IpAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::context::{Evaluation, NodeContext};
use super::roles::RoleStrategy;
use crate::connection::ConnectionEvent;
use crate::error::Result;
use crate::host_record::HostRecord;

#[derive(Clone)]
pub struct DiscoveryPipeline {
    ctx: Arc<NodeContext>,
    strategy: Arc<dyn RoleStrategy>,
}

impl DiscoveryPipeline {
    pub fn new(ctx: Arc<NodeContext>, strategy: Arc<dyn RoleStrategy>) -> Self {
        Self { ctx, strategy }
    }

    /// Spawn one evaluation per endpoint of an established connection
    pub fn on_connection(&self, event: &ConnectionEvent) -> Vec<JoinHandle<Evaluation>> {
        if !event.is_established() {
            return Vec::new();
        }
        event
            .endpoints()
            .into_iter()
            .map(|host| {
                let pipeline = self.clone();
                tokio::spawn(async move { pipeline.evaluate(host).await })
            })
            .collect()
    }

    pub async fn evaluate(&self, host: IpAddr) -> Evaluation {
        match self.try_evaluate(host).await {
            Ok(evaluation) => {
                debug!("[{}] {} -> {:?}", self.ctx.name, host, evaluation);
                evaluation
            }
            Err(e) => {
                error!(host = %host, error = %e, "[{}] Discovery failed", self.ctx.name);
                Evaluation::Abandoned
            }
        }
    }

    async fn try_evaluate(&self, host: IpAddr) -> Result<Evaluation> {
        if !self.ctx.filter.matches(&host) {
            return Ok(Evaluation::Filtered);
        }
        if self.ctx.is_known(&host)? {
            return Ok(Evaluation::AlreadyKnown);
        }

        let hostname = self.ctx.resolver.resolve(host).await;
        let record = HostRecord::new(host, hostname);
        self.strategy.commit_observed(&self.ctx, record).await
    }
}
