//! Per-role behavior, chosen once when the node starts.
//!
//! | role       | observed host                  | HostDiscovered      | HostCommitted              |
//! |------------|--------------------------------|---------------------|----------------------------|
//! | worker     | store commit, or relay to proxy| ignored             | merge                      |
//! | proxy      | commit, forward to manager     | commit, forward     | merge, forward if new      |
//! | manager    | commit, fan out to workers     | commit, fan out     | merge, fan out if new      |
//! | standalone | commit                         | ignored             | ignored                    |
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::bootstrap::BootstrapCoordinator;
use super::context::{Evaluation, NodeContext};
use crate::cluster::{ClusterMessage, NodeName, NodeRole};
use crate::error::Result;
use crate::host_record::HostRecord;

#[async_trait]
pub trait RoleStrategy: Send + Sync {
    fn role(&self) -> NodeRole;

    /// Runs once after the node's event loop is up
    async fn on_startup(&self, _ctx: &Arc<NodeContext>) -> Result<()> {
        Ok(())
    }

    /// Commit decision and propagation for a host this node resolved itself
    async fn commit_observed(&self, ctx: &NodeContext, record: HostRecord) -> Result<Evaluation>;

    async fn handle_message(
        &self,
        ctx: &NodeContext,
        sender: &NodeName,
        message: ClusterMessage,
    ) -> Result<()>;
}

pub fn strategy_for(role: NodeRole) -> Arc<dyn RoleStrategy> {
    match role {
        NodeRole::Worker => Arc::new(WorkerRole),
        NodeRole::Proxy => Arc::new(ProxyRole),
        NodeRole::Manager => Arc::new(ManagerRole),
        NodeRole::Standalone => Arc::new(StandaloneRole),
    }
}

/// Commit as the authority, then pass a win along the commit route
async fn commit_and_forward(ctx: &NodeContext, record: HostRecord) -> Result<Evaluation> {
    let evaluation = ctx.commit_as_authority(record).await?;
    if let Evaluation::Emitted(record) = &evaluation {
        let destination = ctx.router.route_commit(&record.host)?;
        let message = ClusterMessage::HostCommitted {
            record: record.clone(),
        };
        ctx.relay(destination, &message).await?;
    }
    Ok(evaluation)
}

/// Merge a commit from downstream and pass it on only the first time
async fn merge_and_forward(ctx: &NodeContext, record: HostRecord) -> Result<()> {
    if ctx.merge(record.clone())? {
        let destination = ctx.router.route_commit(&record.host)?;
        ctx.relay(destination, &ClusterMessage::HostCommitted { record })
            .await?;
    }
    Ok(())
}

fn merge_all(ctx: &NodeContext, records: Vec<HostRecord>) -> Result<usize> {
    let count = records.len();
    for record in records {
        ctx.merge(record)?;
    }
    Ok(count)
}

#[derive(Debug)]
pub struct WorkerRole;

#[async_trait]
impl RoleStrategy for WorkerRole {
    fn role(&self) -> NodeRole {
        NodeRole::Worker
    }

    async fn commit_observed(&self, ctx: &NodeContext, record: HostRecord) -> Result<Evaluation> {
        if ctx.uses_store() {
            return commit_and_forward(ctx, record).await;
        }

        let destination = ctx.router.route_discovery(&record.host)?;
        let message = ClusterMessage::HostDiscovered {
            record: record.clone(),
        };
        match ctx.relay(destination, &message).await? {
            Some(destination) => {
                // Keep it in view so the next sighting is not relayed again
                ctx.merge(record)?;
                Ok(Evaluation::Relayed(destination))
            }
            None => {
                warn!(
                    host = %record.host,
                    "[{}] No committing node reachable, sighting dropped",
                    ctx.name
                );
                Ok(Evaluation::Abandoned)
            }
        }
    }

    async fn handle_message(
        &self,
        ctx: &NodeContext,
        sender: &NodeName,
        message: ClusterMessage,
    ) -> Result<()> {
        match message {
            ClusterMessage::HostCommitted { record } => {
                ctx.merge(record)?;
            }
            ClusterMessage::KnownHostsSync { records } => {
                let count = merge_all(ctx, records)?;
                debug!("[{}] Merged {} known hosts from {}", ctx.name, count, sender);
            }
            ClusterMessage::HostDiscovered { record } => {
                debug!(
                    "[{}] Ignoring discovery of {} from {}",
                    ctx.name, record.host, sender
                );
            }
            ClusterMessage::Heartbeat { .. } => {}
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ProxyRole;

#[async_trait]
impl RoleStrategy for ProxyRole {
    fn role(&self) -> NodeRole {
        NodeRole::Proxy
    }

    async fn commit_observed(&self, ctx: &NodeContext, record: HostRecord) -> Result<Evaluation> {
        commit_and_forward(ctx, record).await
    }

    async fn handle_message(
        &self,
        ctx: &NodeContext,
        sender: &NodeName,
        message: ClusterMessage,
    ) -> Result<()> {
        match message {
            ClusterMessage::HostDiscovered { record } => {
                let evaluation = commit_and_forward(ctx, record).await?;
                debug!(
                    "[{}] Discovery from {}: {:?}",
                    ctx.name, sender, evaluation
                );
            }
            ClusterMessage::HostCommitted { record } => merge_and_forward(ctx, record).await?,
            ClusterMessage::KnownHostsSync { records } => {
                merge_all(ctx, records)?;
            }
            ClusterMessage::Heartbeat { .. } => {}
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ManagerRole;

#[async_trait]
impl RoleStrategy for ManagerRole {
    fn role(&self) -> NodeRole {
        NodeRole::Manager
    }

    async fn on_startup(&self, ctx: &Arc<NodeContext>) -> Result<()> {
        if !ctx.uses_store() {
            return Ok(());
        }
        let report = BootstrapCoordinator::new(ctx.clone(), ctx.bootstrap_delay)
            .run()
            .await?;
        info!(
            "[{}] Bootstrap pushed {} of {} stored hosts in {} batches",
            ctx.name, report.fetched, report.keys, report.batches
        );
        Ok(())
    }

    async fn commit_observed(&self, ctx: &NodeContext, record: HostRecord) -> Result<Evaluation> {
        commit_and_forward(ctx, record).await
    }

    async fn handle_message(
        &self,
        ctx: &NodeContext,
        sender: &NodeName,
        message: ClusterMessage,
    ) -> Result<()> {
        match message {
            ClusterMessage::HostDiscovered { record } => {
                let evaluation = commit_and_forward(ctx, record).await?;
                debug!(
                    "[{}] Discovery from {}: {:?}",
                    ctx.name, sender, evaluation
                );
            }
            ClusterMessage::HostCommitted { record } => merge_and_forward(ctx, record).await?,
            ClusterMessage::KnownHostsSync { records } => {
                merge_all(ctx, records)?;
            }
            ClusterMessage::Heartbeat { .. } => {}
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct StandaloneRole;

#[async_trait]
impl RoleStrategy for StandaloneRole {
    fn role(&self) -> NodeRole {
        NodeRole::Standalone
    }

    async fn commit_observed(&self, ctx: &NodeContext, record: HostRecord) -> Result<Evaluation> {
        ctx.commit_as_authority(record).await
    }

    async fn handle_message(
        &self,
        ctx: &NodeContext,
        sender: &NodeName,
        message: ClusterMessage,
    ) -> Result<()> {
        debug!(
            "[{}] Standalone node ignoring {} from {}",
            ctx.name,
            message.kind(),
            sender
        );
        Ok(())
    }
}
