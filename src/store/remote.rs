use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;

use super::messages::{StoreOp, StoreRequest, StoreResponse};
use super::HostStore;
use crate::cluster::NodeName;
use crate::error::{HostwatchError, Result};
use crate::transport::TcpSocketPool;

const MAX_CONNECTIONS: usize = 8;

/// Client for a store served by another node's [`super::StoreServer`]
#[derive(Debug)]
pub struct RemoteStore {
    name: String,
    address: SocketAddr,
    pool: TcpSocketPool,
}

impl RemoteStore {
    pub fn new(node_name: NodeName, name: impl Into<String>, address: SocketAddr) -> Self {
        Self {
            name: name.into(),
            address,
            pool: TcpSocketPool::new(node_name, vec![address], MAX_CONNECTIONS),
        }
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.pool = self.pool.with_io_timeout(io_timeout);
        self
    }

    async fn call(&self, op: StoreOp) -> Result<StoreResponse> {
        let request = StoreRequest::new(self.name.clone(), op).serialize()?;
        let reply = self
            .pool
            .send_request_response(self.address, &request)
            .await?;
        match StoreResponse::deserialize(&reply)? {
            StoreResponse::Error(msg) => Err(crate::store_error!(msg)),
            response => Ok(response),
        }
    }
}

fn unexpected(op: &str, response: StoreResponse) -> HostwatchError {
    crate::store_error!("Unexpected reply to {}: {:?}", op, response)
}

#[async_trait]
impl HostStore for RemoteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn keys(&self) -> Result<HashSet<IpAddr>> {
        match self.call(StoreOp::Keys).await? {
            StoreResponse::Keys(keys) => Ok(keys.into_iter().collect()),
            other => Err(unexpected("keys", other)),
        }
    }

    async fn get(&self, key: IpAddr) -> Result<Option<String>> {
        match self.call(StoreOp::Get { key }).await? {
            StoreResponse::Value(value) => Ok(Some(value)),
            StoreResponse::NotFound => Ok(None),
            other => Err(unexpected("get", other)),
        }
    }

    async fn insert_if_absent(&self, key: IpAddr, value: String, ttl: Duration) -> Result<bool> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        match self
            .call(StoreOp::InsertIfAbsent { key, value, ttl_ms })
            .await?
        {
            StoreResponse::Inserted(inserted) => Ok(inserted),
            other => Err(unexpected("insert_if_absent", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::{MemoryStore, StoreHandle, StoreOutcome, StoreServer};

    async fn served_store(name: &str) -> SocketAddr {
        let store = Arc::new(MemoryStore::new(name, Duration::from_secs(60)));
        let server = StoreServer::bind(
            NodeName::from("manager"),
            store,
            "127.0.0.1:0".parse().unwrap(),
        )
        .await
        .unwrap();
        let address = server.local_addr();
        server.start();
        address
    }

    #[tokio::test]
    async fn test_remote_store_round_trip() {
        let address = served_store("known").await;
        let remote = RemoteStore::new(NodeName::from("worker"), "known", address);
        let key: IpAddr = "10.0.0.5".parse().unwrap();
        let ttl = Duration::from_secs(60);

        assert!(remote
            .insert_if_absent(key, "host5.example.com".to_string(), ttl)
            .await
            .unwrap());
        assert!(!remote
            .insert_if_absent(key, "other".to_string(), ttl)
            .await
            .unwrap());
        assert_eq!(
            remote.get(key).await.unwrap(),
            Some("host5.example.com".to_string())
        );
        assert_eq!(remote.get("10.0.0.6".parse().unwrap()).await.unwrap(), None);
        assert_eq!(remote.keys().await.unwrap(), HashSet::from([key]));
    }

    #[tokio::test]
    async fn test_wrong_store_name_fails() {
        let address = served_store("known").await;
        let remote = RemoteStore::new(NodeName::from("worker"), "unknown-store", address);
        let handle = StoreHandle::new(Arc::new(remote), Duration::from_secs(5));
        assert!(matches!(
            handle.keys().await,
            StoreOutcome::Failed(HostwatchError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_store_fails() {
        // bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let remote = RemoteStore::new(NodeName::from("worker"), "known", address);
        let handle = StoreHandle::new(Arc::new(remote), Duration::from_secs(5));
        assert!(matches!(
            handle.get("10.0.0.5".parse().unwrap()).await,
            StoreOutcome::Failed(HostwatchError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_store_is_a_timeout_not_a_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        // the connection step gives up well before the caller's deadline
        let remote = RemoteStore::new(NodeName::from("worker"), "known", address)
            .with_io_timeout(Duration::from_millis(200));
        let handle = StoreHandle::new(Arc::new(remote), Duration::from_secs(15));
        let outcome = handle
            .insert_if_absent(
                "10.0.0.5".parse().unwrap(),
                "host5.example.com".to_string(),
                Duration::from_secs(60),
            )
            .await;
        assert!(outcome.is_timeout(), "{:?}", outcome);
    }
}
