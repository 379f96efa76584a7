use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use xfetch_cache::traits::{FnSource, MemoryStore, ValueSource};
use xfetch_cache::{Config, ProbabilisticFetcher, SourceError};

const READERS_PER_WAVE: usize = 50;
const WAVES: usize = 40;
const WAVE_INTERVAL: Duration = Duration::from_millis(100);
const ORIGIN_LATENCY: Duration = Duration::from_millis(150);
const HOT_TTL: Duration = Duration::from_secs(1);

/// Stand-in for an expensive origin read.
struct SlowOrigin {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl SlowOrigin {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ValueSource<u32, String> for SlowOrigin {
    async fn read(&self, id: &u32) -> Result<String, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(ORIGIN_LATENCY).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("report #{} for id {}", call, id))
    }
}

/// Runs waves of concurrent readers against one hot key and returns
/// (origin calls, peak concurrent origin calls).
async fn simulate(beta: f64) -> Result<(usize, usize)> {
    let store = Arc::new(MemoryStore::new());
    let origin = Arc::new(SlowOrigin::new());
    let fetcher = Arc::new(ProbabilisticFetcher::new(store, origin.clone()));

    for wave in 0..WAVES {
        let readers = (0..READERS_PER_WAVE).map(|_| {
            let fetcher = fetcher.clone();
            tokio::spawn(async move {
                fetcher
                    .fetch::<u32, String>(&7, "dashboard:7", HOT_TTL, beta)
                    .await
            })
        });
        for result in join_all(readers).await {
            if let Err(e) = result.context("reader task panicked")? {
                warn!("wave {}: fetch failed: {}", wave, e);
            }
        }
        tokio::time::sleep(WAVE_INTERVAL).await;
    }

    info!("beta={}: {}", beta, fetcher.report());
    Ok((
        origin.calls.load(Ordering::SeqCst),
        origin.peak_in_flight.load(Ordering::SeqCst),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // A page handler reading a cached greeting with a one-day window.
    let page_fetcher = ProbabilisticFetcher::with_config(
        Arc::new(MemoryStore::new()),
        Arc::new(FnSource::new(|id: &u32| Ok(format!("Hello from the origin, id {}", id)))),
        Config::new().with_ttl(Duration::from_secs(24 * 60 * 60)),
    )?;
    for _ in 0..2 {
        let greeting: String = page_fetcher
            .fetch_with_defaults(&1, "Test Cache Key 1")
            .await?;
        info!("page: {}", greeting);
    }
    info!("page: {}", page_fetcher.report());

    // Hot key under steady load: hard expiry only vs. early expiration.
    for beta in [0.0, 1.0, 2.0] {
        let (calls, peak) = simulate(beta).await?;
        info!(
            "beta={}: {} origin calls for {} reads, at most {} in flight",
            beta,
            calls,
            READERS_PER_WAVE * WAVES,
            peak
        );
    }

    Ok(())
}
