//! Destinations for confirmed-unique host records
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::host_record::HostRecord;

/// Receives each host record that won deduplication. Fire-and-forget.
pub trait HostSink: Send + Sync {
    fn emit(&self, record: HostRecord);
}

/// Writes records as structured events on the `hostwatch::known_hosts` target
#[derive(Clone, Debug, Default)]
pub struct TracingSink;

impl HostSink for TracingSink {
    fn emit(&self, record: HostRecord) {
        info!(
            target: "hostwatch::known_hosts",
            ts = %record.seen_at().to_rfc3339(),
            host = %record.host,
            hostname = %record.hostname,
            "known host"
        );
    }
}

/// Forwards records to a channel for an external writer
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<HostRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HostSink for ChannelSink {
    fn emit(&self, record: HostRecord) {
        if let Err(e) = self.tx.send(record) {
            warn!("Known-hosts writer is gone, dropping record for {}", e.0.host);
        }
    }
}
