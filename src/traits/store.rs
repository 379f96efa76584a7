use super::interfaces::{KeyValueStore, ValueSource};
use crate::utils::{SourceError, StoreError};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredBytes {
    bytes: Vec<u8>,
    expires_at: Instant,
}

impl StoredBytes {
    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// In-process `KeyValueStore` that honors the expiration hint.
///
/// Expired entries are hidden on read and dropped by `purge_expired`.
/// Expiry follows tokio's clock, so paused-time tests can drive it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredBytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Time until the store itself drops `key`, if it holds it.
    pub async fn time_to_live(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.expires_at.saturating_duration_since(Instant::now()))
    }

    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before_count = entries.len();
        entries.retain(|_, e| !e.is_expired());
        let purged = before_count - entries.len();
        debug!("MemoryStore: purged {} expired entries", purged);
        purged
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.bytes.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now()
            .checked_add(expiration)
            .ok_or_else(|| StoreError::Unavailable(format!("expiration {:?} out of range", expiration)))?;
        self.entries.write().await.insert(
            key.to_string(),
            StoredBytes {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }
}

/// Adapts a synchronous closure into a `ValueSource`.
pub struct FnSource<F, I, V> {
    read_fn: F,
    _phantom: PhantomData<fn(&I) -> V>,
}

impl<F, I, V> FnSource<F, I, V>
where
    F: Fn(&I) -> Result<V, SourceError> + Send + Sync,
{
    pub fn new(read_fn: F) -> Self {
        Self {
            read_fn,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, I, V> ValueSource<I, V> for FnSource<F, I, V>
where
    F: Fn(&I) -> Result<V, SourceError> + Send + Sync,
    I: Sync,
    V: Send,
{
    async fn read(&self, id: &I) -> Result<V, SourceError> {
        (self.read_fn)(id)
    }
}
