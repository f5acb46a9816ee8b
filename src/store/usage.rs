//! Hour-bucketed usage counters.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::USAGE_COUNTER_TTL_SECS;
use crate::error::AppError;
use crate::store::EphemeralStore;

/// The rate-limit window a given instant falls into, e.g. `2025-01-15T10`.
pub fn hour_bucket(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H").to_string()
}

fn counter_key(key_hash: &str, bucket: &str) -> String {
    format!("rate_limit:{}:{}", key_hash, bucket)
}

/// Typed view of the usage counters kept in an [`EphemeralStore`].
///
/// Counters are read and written as whole values: there is no increment
/// primitive, so two writers that read the same count both write `count + n`.
#[derive(Clone)]
pub struct UsageStore {
    inner: Arc<dyn EphemeralStore>,
}

impl UsageStore {
    pub fn new(inner: Arc<dyn EphemeralStore>) -> Self {
        Self { inner }
    }

    /// Admitted requests recorded for the key in `bucket`; 0 when absent.
    pub async fn current(&self, key_hash: &str, bucket: &str) -> Result<i64, AppError> {
        let raw = self.inner.get(&counter_key(key_hash, bucket)).await?;

        Ok(match raw {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(bucket, "unparsable usage counter, treating as 0");
                0
            }),
            None => 0,
        })
    }

    /// Overwrite the counter and push its expiry one hour past now.
    pub async fn store(&self, key_hash: &str, bucket: &str, count: i64) -> Result<(), AppError> {
        self.inner
            .put_with_ttl(
                &counter_key(key_hash, bucket),
                &count.to_string(),
                Duration::from_secs(USAGE_COUNTER_TTL_SECS),
            )
            .await
    }
}
