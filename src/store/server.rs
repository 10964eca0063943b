//! TCP front for a [`HostStore`] hosted on this node
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{StoreOp, StoreRequest, StoreResponse};
use super::HostStore;
use crate::cluster::NodeName;
use crate::error::Result;
use crate::transport::{TcpReceiver, TcpRequest};

pub struct StoreServer {
    node_name: NodeName,
    store: Arc<dyn HostStore>,
    receiver: TcpReceiver,
    request_rx: mpsc::Receiver<TcpRequest>,
}

impl StoreServer {
    pub async fn bind(
        node_name: NodeName,
        store: Arc<dyn HostStore>,
        bind_addr: SocketAddr,
    ) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel(1000);
        let receiver = TcpReceiver::new(bind_addr, request_tx).await?;
        Ok(Self {
            node_name,
            store,
            receiver,
            request_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.receiver.local_addr
    }

    /// Accept connections and answer requests until the process exits
    pub fn start(self) -> JoinHandle<()> {
        let Self {
            node_name,
            store,
            receiver,
            mut request_rx,
        } = self;
        info!(
            "[{}] Serving store '{}' on {}",
            node_name,
            store.name(),
            receiver.local_addr
        );
        let accept_loop = receiver.start();

        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let store = store.clone();
                let node_name = node_name.clone();
                tokio::spawn(async move {
                    let reply = handle_frame(store.as_ref(), &request.data).await;
                    match reply.serialize() {
                        Ok(bytes) => {
                            if request.response_tx.send(bytes).is_err() {
                                debug!(
                                    "[{}] Store client {} left before its reply",
                                    node_name, request.peer_addr
                                );
                            }
                        }
                        Err(e) => warn!("[{}] Failed to encode store reply: {}", node_name, e),
                    }
                });
            }
            accept_loop.abort();
        })
    }
}

/// Decode one request frame and run it against `store`
pub async fn handle_frame(store: &dyn HostStore, data: &[u8]) -> StoreResponse {
    let request = match StoreRequest::deserialize(data) {
        Ok(request) => request,
        Err(e) => return StoreResponse::Error(format!("Malformed store request: {}", e)),
    };
    if request.store != store.name() {
        return StoreResponse::Error(format!("Unknown store '{}'", request.store));
    }

    let result = match request.op {
        StoreOp::Keys => store
            .keys()
            .await
            .map(|keys| StoreResponse::Keys(keys.into_iter().collect())),
        StoreOp::Get { key } => store.get(key).await.map(|value| match value {
            Some(value) => StoreResponse::Value(value),
            None => StoreResponse::NotFound,
        }),
        StoreOp::InsertIfAbsent { key, value, ttl_ms } => store
            .insert_if_absent(key, value, Duration::from_millis(ttl_ms))
            .await
            .map(StoreResponse::Inserted),
    };
    result.unwrap_or_else(|e| StoreResponse::Error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::new("known", Duration::from_secs(60))
    }

    async fn run(store: &MemoryStore, request: StoreRequest) -> StoreResponse {
        handle_frame(store, &request.serialize().unwrap()).await
    }

    #[tokio::test]
    async fn test_frames_map_to_store_calls() {
        let store = store();
        let key = "10.0.0.5".parse().unwrap();
        let insert = StoreRequest::new(
            "known",
            StoreOp::InsertIfAbsent {
                key,
                value: "host5.example.com".to_string(),
                ttl_ms: 60_000,
            },
        );

        assert_eq!(run(&store, insert.clone()).await, StoreResponse::Inserted(true));
        assert_eq!(run(&store, insert).await, StoreResponse::Inserted(false));
        assert_eq!(
            run(&store, StoreRequest::new("known", StoreOp::Get { key })).await,
            StoreResponse::Value("host5.example.com".to_string())
        );
        assert_eq!(
            run(&store, StoreRequest::new("known", StoreOp::Keys)).await,
            StoreResponse::Keys(vec![key])
        );
        assert_eq!(
            run(
                &store,
                StoreRequest::new(
                    "known",
                    StoreOp::Get {
                        key: "10.0.0.6".parse().unwrap()
                    }
                )
            )
            .await,
            StoreResponse::NotFound
        );
    }

    #[tokio::test]
    async fn test_unknown_store_name_is_rejected() {
        let response = run(&store(), StoreRequest::new("other", StoreOp::Keys)).await;
        assert!(matches!(response, StoreResponse::Error(msg) if msg.contains("other")));
    }

    #[tokio::test]
    async fn test_garbage_frame_is_rejected() {
        let response = handle_frame(&store(), &[0xff, 0x00, 0x13]).await;
        assert!(matches!(response, StoreResponse::Error(_)));
    }
}
