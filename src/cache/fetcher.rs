use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::entry::CacheRecord;
use super::policy::{self, Staleness};
use crate::traits::interfaces::{
    KeyValueStore, SystemClock, ThreadRngSource, TimeProvider, UniformSource, ValueSource,
};
use crate::utils::{Config, FetchError};

/// Read-through cache accessor with probabilistic early expiration.
///
/// Each `fetch` reads the record for a key, serves it while the XFetch test
/// says it is still good, and otherwise recomputes it from the value source
/// and writes it back. Nothing is locked while awaiting the store or the
/// source, so several readers may refresh the same key concurrently near
/// expiry; the jitter only makes that unlikely.
///
/// Store failures never fail a fetch: a failed read is a miss, a failed
/// write-back is logged and the fresh value is still returned.
pub struct ProbabilisticFetcher<S, Src> {
    store: Arc<S>,
    source: Arc<Src>,
    config: Config,
    clock: Arc<dyn TimeProvider>,
    uniform: Arc<dyn UniformSource>,
    metrics: Arc<FetchMetrics>,
}

impl<S, Src> ProbabilisticFetcher<S, Src>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>, source: Arc<Src>) -> Self {
        Self {
            store,
            source,
            config: Config::default(),
            clock: Arc::new(SystemClock),
            uniform: Arc::new(ThreadRngSource),
            metrics: Arc::new(FetchMetrics::new()),
        }
    }

    pub fn with_config(store: Arc<S>, source: Arc<Src>, config: Config) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(store, source)
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_uniform_source(mut self, uniform: Arc<dyn UniformSource>) -> Self {
        self.uniform = uniform;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn report(&self) -> String {
        self.metrics.snapshot().to_string()
    }

    /// Returns the value for `cache_key`, recomputing it via `id` when the
    /// cached record is missing or the early-expiration test fires.
    ///
    /// `ttl` is the freshness window of a newly computed value. `beta`
    /// weighs early recomputation: above 1 refreshes earlier, 0 disables
    /// early refresh so only hard expiry triggers recomputation.
    pub async fn fetch<I, V>(
        &self,
        id: &I,
        cache_key: &str,
        ttl: Duration,
        beta: f64,
    ) -> Result<V, FetchError>
    where
        I: Sync,
        Src: ValueSource<I, V>,
        V: Serialize + DeserializeOwned + Send,
    {
        validate_args(cache_key, ttl, beta)?;

        let staleness = match self.read_record::<V>(cache_key).await {
            Some(record) => {
                let now = self.clock.now();
                let u = self.uniform.sample();
                if !policy::should_refresh(now, &record, beta, u) {
                    self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Cache hit for key {:?}, {:?} before expiry",
                        cache_key,
                        record.remaining_at(now)
                    );
                    return Ok(record.into_value());
                }
                policy::classify(now, &record)
            }
            None => Staleness::Missing,
        };

        match staleness {
            Staleness::Missing => self.metrics.misses.fetch_add(1, Ordering::Relaxed),
            Staleness::Early => self.metrics.early_refreshes.fetch_add(1, Ordering::Relaxed),
            Staleness::Expired => self.metrics.expired_refreshes.fetch_add(1, Ordering::Relaxed),
        };
        debug!("Recomputing key {:?} ({:?})", cache_key, staleness);

        self.recompute(id, cache_key, ttl).await
    }

    /// `fetch` with the configured default ttl and beta.
    pub async fn fetch_with_defaults<I, V>(&self, id: &I, cache_key: &str) -> Result<V, FetchError>
    where
        I: Sync,
        Src: ValueSource<I, V>,
        V: Serialize + DeserializeOwned + Send,
    {
        self.fetch(id, cache_key, self.config.default_ttl, self.config.default_beta)
            .await
    }

    // Any failure here is a miss.
    async fn read_record<V: DeserializeOwned>(&self, cache_key: &str) -> Option<CacheRecord<V>> {
        let bytes = match self.store.get(cache_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.metrics.store_read_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Store read failed for key {:?}, recomputing: {}", cache_key, e);
                return None;
            }
        };

        match self.config.codec.decode(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                self.metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Discarding undecodable record for key {:?}: {}", cache_key, e);
                None
            }
        }
    }

    async fn recompute<I, V>(&self, id: &I, cache_key: &str, ttl: Duration) -> Result<V, FetchError>
    where
        I: Sync,
        Src: ValueSource<I, V>,
        V: Serialize + Send,
    {
        let started = self.clock.now();
        let value = self.source.read(id).await.map_err(|e| {
            self.metrics.source_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Value source failed for key {:?}: {:#}", cache_key, e);
            FetchError::Source(e)
        })?;
        let finished = self.clock.now();
        let compute_delta = finished.duration_since(started).unwrap_or(Duration::ZERO);

        let record = CacheRecord::new(value, compute_delta, finished, ttl);
        let encoded = self.config.codec.encode(&record);
        match encoded {
            Ok(bytes) => self.write_back(cache_key, bytes, ttl).await,
            Err(e) => {
                self.metrics.store_write_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to encode record for key {:?}: {}", cache_key, e);
            }
        }

        Ok(record.into_value())
    }

    // Best effort: the caller gets the fresh value either way.
    async fn write_back(&self, cache_key: &str, bytes: Vec<u8>, ttl: Duration) {
        let expiration = self.config.expiration_hint.store_expiration(ttl);
        match self.store.set(cache_key, bytes, expiration).await {
            Ok(()) => debug!(
                "Stored key {:?} with store expiration {:?}",
                cache_key, expiration
            ),
            Err(e) => {
                self.metrics.store_write_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Store write failed for key {:?}: {}", cache_key, e);
            }
        }
    }
}

fn validate_args(cache_key: &str, ttl: Duration, beta: f64) -> Result<(), FetchError> {
    if cache_key.is_empty() {
        return Err(FetchError::EmptyKey);
    }
    if ttl.is_zero() {
        return Err(FetchError::InvalidTtl);
    }
    if !beta.is_finite() || beta < 0.0 {
        return Err(FetchError::InvalidBeta(beta));
    }
    Ok(())
}

// Counters shared by every fetch on one fetcher.
#[derive(Debug, Default)]
pub struct FetchMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    early_refreshes: AtomicU64,
    expired_refreshes: AtomicU64,
    decode_failures: AtomicU64,
    store_read_errors: AtomicU64,
    store_write_errors: AtomicU64,
    source_errors: AtomicU64,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            early_refreshes: self.early_refreshes.load(Ordering::Relaxed),
            expired_refreshes: self.expired_refreshes.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            store_read_errors: self.store_read_errors.load(Ordering::Relaxed),
            store_write_errors: self.store_write_errors.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the fetcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    /// No usable record: absent, undecodable or unreadable.
    pub misses: u64,
    pub early_refreshes: u64,
    pub expired_refreshes: u64,
    pub decode_failures: u64,
    pub store_read_errors: u64,
    pub store_write_errors: u64,
    pub source_errors: u64,
}

impl MetricsSnapshot {
    /// Number of times the value source was called.
    pub fn recomputations(&self) -> u64 {
        self.misses + self.early_refreshes + self.expired_refreshes
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hits: {}, Misses: {}, Early refreshes: {}, Expired refreshes: {}, \
             Decode failures: {}, Store read errors: {}, Store write errors: {}, Source errors: {}",
            self.hits,
            self.misses,
            self.early_refreshes,
            self.expired_refreshes,
            self.decode_failures,
            self.store_read_errors,
            self.store_write_errors,
            self.source_errors
        )
    }
}
