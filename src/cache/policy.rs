use super::entry::CacheRecord;
use std::time::{Duration, SystemTime};

// Probabilistic early expiration (XFetch, Vattani et al., VLDB 2015).
//
// A reader refreshes when  now - delta * beta * ln(u) >= expires_at,
// u drawn uniformly from (0, 1]. Since ln(u) <= 0 the jitter only ever
// pushes the score forward, so the closer we are to expiry, and the more
// expensive the recomputation, the likelier an early refresh becomes.

/// Why a fetch fell through to the value source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// No usable record: absent, undecodable, or the store read failed.
    Missing,
    /// Still before `expires_at`, but the jitter draw said refresh now.
    Early,
    /// At or past `expires_at`.
    Expired,
}

// Caps the score shift for draws vanishingly close to zero.
const MAX_JITTER: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// The jitter added to `now`, in seconds. Never negative.
pub fn jitter(compute_delta: Duration, beta: f64, u: f64) -> f64 {
    if compute_delta.is_zero() || beta == 0.0 {
        return 0.0;
    }
    (-(compute_delta.as_secs_f64() * beta * u.ln())).max(0.0)
}

/// `now` shifted forward by the jitter for this draw.
pub fn freshness_score(now: SystemTime, compute_delta: Duration, beta: f64, u: f64) -> SystemTime {
    let shift = Duration::try_from_secs_f64(jitter(compute_delta, beta, u))
        .unwrap_or(MAX_JITTER)
        .min(MAX_JITTER);
    now.checked_add(shift).unwrap_or(now)
}

/// True when the record should be recomputed on this read.
///
/// Compares the jitter against the time remaining rather than building the
/// score as a `SystemTime`, so it is exact for every `u` and never overflows.
pub fn should_refresh<T>(now: SystemTime, record: &CacheRecord<T>, beta: f64, u: f64) -> bool {
    let remaining = match record.expires_at().duration_since(now) {
        Ok(remaining) if !remaining.is_zero() => remaining,
        _ => return true,
    };
    jitter(record.compute_delta(), beta, u) >= remaining.as_secs_f64()
}

/// Classifies a refresh decision that has already been taken.
pub fn classify<T>(now: SystemTime, record: &CacheRecord<T>) -> Staleness {
    if record.is_expired_at(now) {
        Staleness::Expired
    } else {
        Staleness::Early
    }
}

/// Probability that a single read `remaining` before expiry refreshes.
///
/// `P(-delta * beta * ln(U) >= remaining) = exp(-remaining / (delta * beta))`,
/// which is 1 at expiry and decays towards 0 right after a write.
pub fn refresh_probability(remaining: Duration, compute_delta: Duration, beta: f64) -> f64 {
    if remaining.is_zero() {
        return 1.0;
    }
    let scale = compute_delta.as_secs_f64() * beta;
    if scale <= 0.0 {
        return 0.0;
    }
    (-remaining.as_secs_f64() / scale).exp()
}
