//! Cluster wire protocol.
//!
//! Packets travel between nodes as bincode (big-endian standard config) UDP
//! datagrams. Every packet names its sender so receivers can drop their own
//! traffic and feed the heartbeat table.
use bincode::{Decode, Encode};

use super::NodeName;
use crate::host_record::HostRecord;

/// Most records per `KnownHostsSync` datagram
pub const SYNC_BATCH_SIZE: usize = 256;

/// Encoded record bytes per `KnownHostsSync`, leaving room for the packet
/// header under the 65,507 byte UDP payload limit
pub const MAX_SYNC_BYTES: usize = 60_000;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum ClusterMessage {
    /// A worker saw a new host and wants the committing tier to decide
    HostDiscovered { record: HostRecord },
    /// The committing tier accepted a host; receivers merge it into their view
    HostCommitted { record: HostRecord },
    /// Known-host snapshot pushed to workers (bootstrap or fan-out)
    KnownHostsSync { records: Vec<HostRecord> },
    Heartbeat { timestamp: i64 },
}

impl ClusterMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterMessage::HostDiscovered { .. } => "host_discovered",
            ClusterMessage::HostCommitted { .. } => "host_committed",
            ClusterMessage::KnownHostsSync { .. } => "known_hosts_sync",
            ClusterMessage::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Split a record set into sync messages that each fit a datagram.
    /// A batch closes at `SYNC_BATCH_SIZE` records or `MAX_SYNC_BYTES` encoded bytes.
    pub fn sync_batches(records: Vec<HostRecord>) -> Vec<ClusterMessage> {
        let config = bincode::config::standard().with_big_endian();
        let mut batches = Vec::new();
        let mut batch: Vec<HostRecord> = Vec::new();
        let mut batch_bytes = 0;

        for record in records {
            let size = bincode::encode_to_vec(&record, config)
                .map(|encoded| encoded.len())
                .unwrap_or(MAX_SYNC_BYTES);
            if !batch.is_empty()
                && (batch.len() == SYNC_BATCH_SIZE || batch_bytes + size > MAX_SYNC_BYTES)
            {
                batches.push(ClusterMessage::KnownHostsSync {
                    records: std::mem::take(&mut batch),
                });
                batch_bytes = 0;
            }
            batch_bytes += size;
            batch.push(record);
        }
        if !batch.is_empty() {
            batches.push(ClusterMessage::KnownHostsSync { records: batch });
        }
        batches
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ClusterPacket {
    pub sender: NodeName,
    pub message: ClusterMessage,
}

impl ClusterPacket {
    pub fn new(sender: NodeName, message: ClusterMessage) -> Self {
        Self { sender, message }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        let config = bincode::config::standard().with_big_endian();
        bincode::encode_to_vec(self, config)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let config = bincode::config::standard().with_big_endian();
        let (result, _) = bincode::decode_from_slice(data, config)?;
        Ok(result)
    }
}
