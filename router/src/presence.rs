//! Presence lookups and the generic read-only cache contract
//!
//! Presence is owned by the edge layer: when a recipient holds a live
//! connection, the cache maps their URN to the server instance carrying
//! it. The router only reads. The same `Fetcher` contract serves the
//! device-token lookup, so both dependencies can be backed by whatever
//! cache the deployment uses.

use crate::error::ContractError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Real-time presence record for a connected recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Server instance holding the persistent connection (e.g. a pod name)
    pub server_instance_id: String,

    /// Connection protocol on that instance
    pub protocol: Protocol,
}

/// Transport protocol of a live edge connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Websocket,
    Mqtt,
}

/// Read-only lookup contract for externally owned key/value state
///
/// `ContractError::NotFound` is the miss signal the routing decision
/// branches on; any other error is an infrastructure failure.
#[async_trait]
pub trait Fetcher<K, V>: Send + Sync {
    async fn fetch(&self, key: &K) -> Result<V, ContractError>;
}

/// In-memory cache backend
///
/// The edge layer (or a test) populates it through `insert`/`remove`;
/// the router only calls `fetch`.
pub struct MemoryCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    pub fn remove(&self, key: &K) {
        self.entries.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Fetcher<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn fetch(&self, key: &K) -> Result<V, ContractError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(ContractError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::urn::Urn;

    #[tokio::test]
    async fn test_fetch_hit() {
        let cache = MemoryCache::new();
        let bob = Urn::user("bob").unwrap();
        cache.insert(
            bob.clone(),
            ConnectionInfo {
                server_instance_id: "pod-123".into(),
                protocol: Protocol::Websocket,
            },
        );

        let info = cache.fetch(&bob).await.unwrap();
        assert_eq!(info.server_instance_id, "pod-123");
    }

    #[tokio::test]
    async fn test_fetch_miss_is_not_found() {
        let cache: MemoryCache<Urn, ConnectionInfo> = MemoryCache::new();
        let err = cache.fetch(&Urn::user("ghost").unwrap()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = MemoryCache::new();
        let bob = Urn::user("bob").unwrap();
        cache.insert(bob.clone(), 7_u32);
        cache.remove(&bob);
        assert!(cache.fetch(&bob).await.is_err());
    }

    #[test]
    fn test_connection_info_wire_form() {
        let info = ConnectionInfo {
            server_instance_id: "pod-9".into(),
            protocol: Protocol::Mqtt,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["server_instance_id"], "pod-9");
        assert_eq!(json["protocol"], "mqtt");
    }
}
