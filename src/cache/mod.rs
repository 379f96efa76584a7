pub mod codec;
pub mod entry;
pub mod fetcher;
pub mod policy;

pub use codec::RecordCodec;
pub use entry::CacheRecord;
pub use fetcher::{FetchMetrics, MetricsSnapshot, ProbabilisticFetcher};
pub use policy::Staleness;
