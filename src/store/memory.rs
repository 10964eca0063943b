use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::HostStore;
use crate::error::Result;
use crate::expiring_map::ExpiringMap;

/// Authoritative in-process store
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    entries: Mutex<ExpiringMap<IpAddr, String>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(ExpiringMap::new(default_ttl)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ExpiringMap<IpAddr, String>>> {
        self.entries
            .lock()
            .map_err(|e| crate::concurrency_error!("Mutex lock fail {}", e))
    }

    pub fn len(&self) -> Result<usize> {
        self.lock().map(|entries| entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Physically drop expired entries
    pub fn expire_keys(&self) -> Result<usize> {
        self.lock().map(|mut entries| entries.expire_keys())
    }
}

#[async_trait]
impl HostStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn keys(&self) -> Result<HashSet<IpAddr>> {
        self.lock().map(|entries| entries.keys().copied().collect())
    }

    async fn get(&self, key: IpAddr) -> Result<Option<String>> {
        self.lock().map(|entries| entries.get(&key).cloned())
    }

    async fn insert_if_absent(&self, key: IpAddr, value: String, ttl: Duration) -> Result<bool> {
        self.lock()
            .map(|mut entries| entries.insert_if_absent(key, value, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_inserts_have_one_winner() {
        let store = Arc::new(MemoryStore::new("test", Duration::from_secs(60)));
        let host: IpAddr = "10.0.0.5".parse().unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_if_absent(host, format!("name-{}", i), Duration::from_secs(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new("test", Duration::from_secs(60));
        let host: IpAddr = "10.0.0.5".parse().unwrap();
        assert!(store
            .insert_if_absent(host, "a".to_string(), Duration::from_secs(10))
            .await
            .unwrap());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.get(host).await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
        assert_eq!(store.expire_keys().unwrap(), 1);
        assert!(store
            .insert_if_absent(host, "b".to_string(), Duration::from_secs(10))
            .await
            .unwrap());
    }
}
