#![allow(dead_code)]
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use hostwatch::cluster::{LocalHub, NodeName, NodeRole, PeerSpec};
use hostwatch::host_record::HostRecord;
use hostwatch::node::{Node, NodeBuilder};
use hostwatch::resolver::{ReverseLookup, StaticLookup};
use hostwatch::settings::Settings;
use hostwatch::sink::{ChannelSink, HostSink};
use hostwatch::store::HostStore;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn peers(specs: &[&str]) -> Vec<PeerSpec> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

pub fn settings(name: &str, role: NodeRole, peer_specs: &[&str]) -> Settings {
    Settings {
        node_name: NodeName::from(name),
        role,
        peers: peers(peer_specs),
        store_timeout_secs: 1,
        resolver_timeout_secs: 1,
        bootstrap_delay_secs: 1,
        ..Settings::default()
    }
}

/// Store-backed settings for a node that does not host the store itself
pub fn store_client_settings(name: &str, role: NodeRole, peer_specs: &[&str]) -> Settings {
    Settings {
        use_host_store: true,
        store_address: Some("127.0.0.1:8511".parse().unwrap()),
        ..settings(name, role, peer_specs)
    }
}

pub fn sink() -> (Arc<dyn HostSink>, mpsc::UnboundedReceiver<HostRecord>) {
    let (sink, rx) = ChannelSink::new();
    (Arc::new(sink), rx)
}

pub fn lookup(names: &[(&str, &str)]) -> Arc<dyn ReverseLookup> {
    let lookup = names
        .iter()
        .fold(StaticLookup::new(), |lookup, (addr, name)| {
            lookup.with_name(ip(addr), *name)
        });
    Arc::new(lookup)
}

pub async fn start_node(
    settings: Settings,
    hub: &LocalHub,
    lookup: Arc<dyn ReverseLookup>,
    sink: Arc<dyn HostSink>,
    store: Option<Arc<dyn HostStore>>,
) -> Node {
    let mut builder = NodeBuilder::new(settings)
        .with_local_hub(hub.clone())
        .with_lookup(lookup)
        .with_sink(sink);
    if let Some(store) = store {
        builder = builder.with_store(store);
    }
    builder.start().await.unwrap()
}

/// Poll a node's view until it holds `host` or the deadline passes
pub async fn wait_until_known(node: &Node, host: IpAddr, deadline: Duration) -> bool {
    let poll = async {
        loop {
            let hosts = node.known_hosts().await.unwrap();
            if hosts.iter().any(|record| record.host == host) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(deadline, poll).await.is_ok()
}

/// Everything emitted until the sink has been quiet for `quiet`
pub async fn drain(rx: &mut mpsc::UnboundedReceiver<HostRecord>, quiet: Duration) -> Vec<HostRecord> {
    let mut records = Vec::new();
    while let Ok(Some(record)) = tokio::time::timeout(quiet, rx.recv()).await {
        records.push(record);
    }
    records
}
