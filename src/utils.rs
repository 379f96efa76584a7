use crate::cache::codec::RecordCodec;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_BETA: f64 = 1.0; // Optimal for most workloads; > 1 refreshes earlier
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Failure reported by a value source. Opaque to the fetcher.
pub type SourceError = anyhow::Error;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced to callers of `ProbabilisticFetcher::fetch`.
///
/// Store and codec failures never show up here: they are logged, counted
/// and treated as a cache miss (on read) or ignored (on write-back).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Value source failed: {0}")]
    Source(SourceError),
    #[error("Cache key must not be empty")]
    EmptyKey,
    #[error("Time-to-live must be greater than zero")]
    InvalidTtl,
    #[error("Beta must be finite and non-negative, got {0}")]
    InvalidBeta(f64),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// How long the backing store is asked to keep a freshly written record.
///
/// The hint is never shorter than the ttl, otherwise the store could
/// evict a record before its own `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpirationHint {
    /// Exactly the ttl of the write.
    #[default]
    Ttl,
    /// The ttl plus a fixed amount of extra residency.
    Padded(Duration),
}

impl ExpirationHint {
    pub fn store_expiration(&self, ttl: Duration) -> Duration {
        match self {
            ExpirationHint::Ttl => ttl,
            ExpirationHint::Padded(extra) => ttl.saturating_add(*extra),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub default_ttl: Duration,
    pub default_beta: f64,
    pub codec: RecordCodec,
    pub expiration_hint: ExpirationHint,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            default_beta: DEFAULT_BETA,
            codec: RecordCodec::default(),
            expiration_hint: ExpirationHint::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.default_beta = beta;
        self
    }

    pub fn with_codec(mut self, codec: RecordCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_expiration_hint(mut self, hint: ExpirationHint) -> Self {
        self.expiration_hint = hint;
        self
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.default_ttl.is_zero() {
            return Err(FetchError::InvalidConfig(
                "default_ttl must be greater than zero".to_string(),
            ));
        }
        if !self.default_beta.is_finite() || self.default_beta < 0.0 {
            return Err(FetchError::InvalidConfig(format!(
                "default_beta must be finite and non-negative, got {}",
                self.default_beta
            )));
        }
        Ok(())
    }
}

/// Milliseconds since the Unix epoch. Instants before the epoch clamp to 0.
pub fn to_epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn from_epoch_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

/// Drops the sub-millisecond part of a duration.
pub fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
