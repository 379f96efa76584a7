mod common;

use common::{init_logger, start, FrozenStore, YieldingSource};
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use xfetch_cache::cache::policy::refresh_probability;
use xfetch_cache::cache::{CacheRecord, ProbabilisticFetcher};
use xfetch_cache::traits::{ManualClock, SeededUniform};

// $ RUST_LOG=debug cargo test --test refresh_rate_tests -- --nocapture

const TRIALS: usize = 10_000;
const TTL: Duration = Duration::from_secs(10);

/// Empirical early-refresh rate for a record `remaining` before expiry.
async fn refresh_rate(compute_delta: Duration, beta: f64, remaining: Duration, seed: u64) -> f64 {
    let record = CacheRecord::new("cached".to_string(), compute_delta, start(), TTL);
    let store = Arc::new(FrozenStore::holding(&record));
    let source = Arc::new(YieldingSource::default());
    let clock = Arc::new(ManualClock::new(record.expires_at() - remaining));
    let fetcher = ProbabilisticFetcher::new(store.clone(), source.clone())
        .with_clock(clock)
        .with_uniform_source(Arc::new(SeededUniform::new(seed)));

    for _ in 0..TRIALS {
        let _: String = fetcher.fetch(&1, "hot", TTL, beta).await.unwrap();
    }

    let metrics = fetcher.metrics();
    assert_eq!(metrics.recomputations() as usize, source.calls());
    assert_eq!(metrics.hits as usize + source.calls(), TRIALS);
    source.calls() as f64 / TRIALS as f64
}

#[tokio::test]
async fn test_empirical_rate_matches_closed_form() {
    init_logger();
    let cases = [
        (Duration::from_millis(100), 1.0, Duration::from_millis(100)),
        (Duration::from_millis(100), 1.0, Duration::from_millis(300)),
        (Duration::from_millis(100), 2.0, Duration::from_millis(50)),
        (Duration::from_millis(40), 3.0, Duration::from_millis(100)),
        (Duration::from_secs(2), 0.5, Duration::from_millis(700)),
    ];

    for (i, (delta, beta, remaining)) in cases.into_iter().enumerate() {
        let expected = refresh_probability(remaining, delta, beta);
        let observed = refresh_rate(delta, beta, remaining, 1_000 + i as u64).await;
        debug!(
            "delta={:?} beta={} remaining={:?}: expected {:.4}, observed {:.4}",
            delta, beta, remaining, expected, observed
        );
        assert!(expected > 0.0 && expected < 1.0);
        assert!(
            (observed - expected).abs() < 0.05,
            "delta={:?} beta={} remaining={:?}: expected {:.4}, observed {:.4}",
            delta,
            beta,
            remaining,
            expected,
            observed
        );
    }
}

#[tokio::test]
async fn test_hit_rate_falls_as_expiry_nears() {
    init_logger();
    let delta = Duration::from_millis(100);
    let mut last_refresh_rate = 0.0;

    for (i, remaining_ms) in [500u64, 300, 200, 100, 50, 10].into_iter().enumerate() {
        let rate = refresh_rate(delta, 1.0, Duration::from_millis(remaining_ms), 7 + i as u64).await;
        debug!("remaining={}ms refresh rate {:.4}", remaining_ms, rate);
        assert!(rate >= last_refresh_rate, "refresh rate dropped at {}ms", remaining_ms);
        last_refresh_rate = rate;
    }
}

#[tokio::test]
async fn test_every_read_refreshes_at_expiry() {
    init_logger();
    let rate = refresh_rate(Duration::from_millis(100), 1.0, Duration::ZERO, 99).await;
    assert_eq!(rate, 1.0);
}

#[tokio::test]
async fn test_zero_beta_never_refreshes_early() {
    init_logger();
    let rate = refresh_rate(Duration::from_secs(5), 0.0, Duration::from_millis(1), 3).await;
    assert_eq!(rate, 0.0);
}

#[tokio::test]
async fn test_frozen_store_sees_one_write_per_refresh() {
    init_logger();
    let record = CacheRecord::new("cached".to_string(), Duration::from_millis(100), start(), TTL);
    let store = Arc::new(FrozenStore::holding(&record));
    let source = Arc::new(YieldingSource::default());
    let clock = Arc::new(ManualClock::new(record.expires_at()));
    let fetcher = ProbabilisticFetcher::new(store.clone(), source.clone()).with_clock(clock);

    for _ in 0..5 {
        let _: String = fetcher.fetch(&1, "hot", TTL, 1.0).await.unwrap();
    }
    assert_eq!(source.calls(), 5);
    assert_eq!(store.writes.load(std::sync::atomic::Ordering::SeqCst), 5);
}
