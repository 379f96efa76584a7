//! Read-through caching with probabilistic early expiration (XFetch).
//!
//! A hot key that expires under load sends every concurrent reader to the
//! backing computation at once. [`ProbabilisticFetcher`] spreads those
//! recomputations out: each read may volunteer to refresh a record before
//! it expires, with a probability that grows as expiry nears and as the
//! recomputation gets more expensive.

pub mod cache;
pub mod traits;
pub mod utils;

pub use cache::{CacheRecord, MetricsSnapshot, ProbabilisticFetcher, RecordCodec, Staleness};
pub use traits::{KeyValueStore, MemoryStore, TimeProvider, UniformSource, ValueSource};
pub use utils::{Config, ExpirationHint, FetchError, SourceError, StoreError};
