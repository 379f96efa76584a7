#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use xfetch_cache::cache::{CacheRecord, RecordCodec};
use xfetch_cache::traits::{KeyValueStore, ValueSource};
use xfetch_cache::utils::{from_epoch_millis, SourceError, StoreError};

pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

pub fn start() -> SystemTime {
    from_epoch_millis(1_700_000_000_000)
}

/// Always returns the same record and drops writes, so every fetch sees
/// identical state.
pub struct FrozenStore {
    bytes: Vec<u8>,
    pub writes: AtomicUsize,
}

impl FrozenStore {
    pub fn holding(record: &CacheRecord<String>) -> Self {
        Self {
            bytes: RecordCodec::Bincode.encode(record).unwrap(),
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl KeyValueStore for FrozenStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(Some(self.bytes.clone()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _expiration: Duration) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Plain map behind a std mutex. Never returns `Pending`, so a batch of
/// fetches polled together all see the store in the same state.
#[derive(Default)]
pub struct SharedMapStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl KeyValueStore for SharedMapStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>, _expiration: Duration) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// Counts reads and yields to the scheduler before answering, so
/// concurrently polled fetches all reach the source before any writes back.
#[derive(Default)]
pub struct YieldingSource {
    pub calls: AtomicUsize,
}

impl YieldingSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValueSource<u32, String> for YieldingSource {
    async fn read(&self, id: &u32) -> Result<String, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        Ok(format!("value-{}-v{}", id, call))
    }
}

/// Sleeps on the tokio clock to simulate an expensive origin.
pub struct SlowSource {
    pub calls: AtomicUsize,
    pub latency: Duration,
}

impl SlowSource {
    pub fn new(latency: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            latency,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValueSource<u32, String> for SlowSource {
    async fn read(&self, id: &u32) -> Result<String, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(format!("computed-{}", id))
    }
}
