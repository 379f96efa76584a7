use crate::utils::{SourceError, StoreError};
use async_trait::async_trait;
use rand::distributions::OpenClosed01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Byte-oriented key-value store with per-write expiration.
///
/// Implementations are shared between concurrent fetches and must be
/// safe for concurrent use.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<(), StoreError>;
}

/// The expensive producer behind the cache.
#[async_trait]
pub trait ValueSource<I: Sync, V>: Send + Sync {
    async fn read(&self, id: &I) -> Result<V, SourceError>;
}

pub trait TimeProvider: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, time: SystemTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl TimeProvider for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Source of the uniform draw used by the early-expiration test.
///
/// Every call must return an independent sample in (0, 1].
pub trait UniformSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Draws from the calling thread's generator, so concurrent fetches never
/// contend on (or share) generator state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSource;

impl UniformSource for ThreadRngSource {
    fn sample(&self) -> f64 {
        rand::thread_rng().sample(OpenClosed01)
    }
}

/// Reproducible draws from a seeded generator behind a mutex.
#[derive(Debug)]
pub struct SeededUniform {
    rng: Mutex<StdRng>,
}

impl SeededUniform {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl UniformSource for SeededUniform {
    fn sample(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sample(OpenClosed01)
    }
}

/// Always returns the same draw. Values outside (0, 1] are clamped.
#[derive(Debug, Clone, Copy)]
pub struct FixedUniform(f64);

impl FixedUniform {
    pub fn new(u: f64) -> Self {
        FixedUniform(u.clamp(f64::MIN_POSITIVE, 1.0))
    }
}

impl UniformSource for FixedUniform {
    fn sample(&self) -> f64 {
        self.0
    }
}
