use crate::utils::{from_epoch_millis, to_epoch_millis, truncate_to_millis};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// The unit persisted in the key-value store: a value, what it cost to
/// compute, and when it hard-expires.
///
/// Records are never mutated. A refresh always builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord<T> {
    value: T,
    #[serde(
        serialize_with = "serialize_duration_millis",
        deserialize_with = "deserialize_duration_millis"
    )]
    compute_delta: Duration,
    #[serde(
        serialize_with = "serialize_epoch_millis",
        deserialize_with = "deserialize_epoch_millis"
    )]
    expires_at: SystemTime,
}

impl<T> CacheRecord<T> {
    /// Builds a record written at `created_at` that stays valid for `ttl`.
    ///
    /// Both times are kept at millisecond precision, the resolution of the
    /// wire format, so decoding an encoded record gives back an equal one.
    pub fn new(value: T, compute_delta: Duration, created_at: SystemTime, ttl: Duration) -> Self {
        let expires_at =
            from_epoch_millis(to_epoch_millis(created_at).saturating_add(ttl.as_millis() as u64));
        Self {
            value,
            compute_delta: truncate_to_millis(compute_delta),
            expires_at,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn compute_delta(&self) -> Duration {
        self.compute_delta
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Hard expiry, ignoring any early-refresh jitter.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Time left until hard expiry, zero once expired.
    pub fn remaining_at(&self, now: SystemTime) -> Duration {
        self.expires_at.duration_since(now).unwrap_or(Duration::ZERO)
    }
}

/// Serializes a `Duration` as whole milliseconds.
fn serialize_duration_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_duration_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Serializes a `SystemTime` as milliseconds since the Unix epoch (UTC).
fn serialize_epoch_millis<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(to_epoch_millis(*time))
}

fn deserialize_epoch_millis<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(from_epoch_millis(millis))
}
