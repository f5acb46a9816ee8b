//! Per-request admission and usage accounting.
//!
//! # Admission
//!
//! 1. Parse `Authorization: Bearer ev_...`
//! 2. Resolve the key by hash; reject unknown or revoked keys
//! 3. Reject expired keys
//! 4. Read the usage counter for the current UTC hour and reject when
//!    `usage + units > rate_limit`
//!
//! # Accounting
//!
//! After the protected call has run, the counter is overwritten with
//! `usage_before + units` and the key row's lifetime counter is bumped in the
//! background. Concurrent admissions can read the same `usage_before`, so the
//! window may over-admit by the number of in-flight callers.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::error::{AppError, RateLimitDetails};
use crate::models::api_key::KeyRecord;
use crate::services::credentials::{hash_secret, parse_bearer};
use crate::store::usage::hour_bucket;
use crate::store::{KeyStore, UsageStore};

/// A call that passed the gate, carrying what accounting needs.
#[derive(Debug, Clone)]
pub struct Admission {
    pub key: KeyRecord,
    /// Hour bucket the usage was read from
    pub bucket: String,
    /// Counter value observed at admission
    pub usage_before: i64,
    /// Units this call consumes
    pub units: i64,
}

/// Decides whether a presented key may make a call.
#[derive(Clone)]
pub struct AccessGate {
    keys: Arc<dyn KeyStore>,
    usage: UsageStore,
}

impl AccessGate {
    pub fn new(keys: Arc<dyn KeyStore>, usage: UsageStore) -> Self {
        Self { keys, usage }
    }

    /// Resolve an `Authorization` header to an active, unexpired key.
    ///
    /// Activity is checked before expiry, so a revoked key reports
    /// `InvalidOrInactiveKey` whether or not it has also expired.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<KeyRecord, AppError> {
        let key_value = parse_bearer(header)?;

        let key = self
            .keys
            .find_by_hash(&hash_secret(key_value))
            .await?
            .ok_or(AppError::InvalidOrInactiveKey)?;

        if !key.is_active {
            return Err(AppError::InvalidOrInactiveKey);
        }
        if key.is_expired_at(Utc::now()) {
            return Err(AppError::KeyExpired);
        }

        Ok(key)
    }

    /// Check that `units` more calls fit in the key's current hour.
    pub async fn check_quota(&self, key: KeyRecord, units: i64) -> Result<Admission, AppError> {
        let bucket = hour_bucket(Utc::now());
        let usage_before = self.usage.current(&key.key_hash, &bucket).await?;
        let limit = i64::from(key.rate_limit);

        if usage_before + units > limit {
            tracing::info!(key_id = %key.id, %bucket, usage_before, units, "rate limit exceeded");
            return Err(AppError::RateLimitExceeded(RateLimitDetails {
                limit,
                current_usage: usage_before,
                remaining_requests: limit - usage_before,
                requested_units: units,
                bucket,
            }));
        }

        Ok(Admission {
            key,
            bucket,
            usage_before,
            units,
        })
    }

    /// Authenticate and admit a single call.
    pub async fn admit(&self, header: Option<&str>) -> Result<Admission, AppError> {
        let key = self.authenticate(header).await?;
        self.check_quota(key, 1).await
    }

    /// Record an admitted call.
    ///
    /// The counter write is awaited; the key row update runs in a spawned task
    /// whose handle is returned. Failures in either are logged, never returned.
    pub async fn account(&self, admission: &Admission) -> JoinHandle<()> {
        let key = &admission.key;

        if let Err(e) = self
            .usage
            .store(
                &key.key_hash,
                &admission.bucket,
                admission.usage_before + admission.units,
            )
            .await
        {
            tracing::warn!(key_id = %key.id, bucket = %admission.bucket, error = %e, "failed to update usage counter");
        }

        let keys = self.keys.clone();
        let id = key.id;
        let units = admission.units;
        tokio::spawn(async move {
            if let Err(e) = keys.record_use(id, units, Utc::now()).await {
                tracing::warn!(key_id = %id, error = %e, "failed to record key usage");
            }
        })
    }
}
