//! Storage seams.
//!
//! Two kinds of storage back the service:
//! - [`KeyStore`]: durable, strongly consistent rows for issued keys
//! - [`EphemeralStore`]: string values with a per-entry TTL, used for pending
//!   verifications, hourly usage counters and cached scoring results
//!
//! Neither offers transactions spanning the other. The ephemeral store has no
//! compare-and-swap or atomic increment on purpose: usage counting is a plain
//! read followed by a write.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::api_key::{KeyRecord, NewKeyRecord};

pub mod memory;
pub mod postgres;
pub mod redis_store;
pub mod usage;
pub mod verification;

pub use memory::{InMemoryKeyStore, MemoryStore};
pub use postgres::PgKeyStore;
pub use redis_store::RedisStore;
pub use usage::UsageStore;
pub use verification::VerificationStore;

/// Durable store of issued keys.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Insert a new active key.
    ///
    /// Returns `None` when a key issued from the same verification token
    /// already exists; nothing is written in that case.
    async fn insert(&self, key: NewKeyRecord) -> Result<Option<KeyRecord>, AppError>;

    /// Look up a key by the hash of its secret, active or not.
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<KeyRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<KeyRecord>, AppError>;

    async fn count_active_for_owner(&self, owner_email: &str) -> Result<i64, AppError>;

    /// Every key owned by `owner_email`, newest first.
    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<KeyRecord>, AppError>;

    /// Set `is_active = false` on a key owned by `owner_email`.
    ///
    /// Returns whether a row matched, whether or not it was already inactive.
    async fn deactivate(&self, id: Uuid, owner_email: &str) -> Result<bool, AppError>;

    /// Add `units` to `total_requests` and move `last_used_at` to `at`.
    async fn record_use(&self, id: Uuid, units: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Connectivity check used by the health check.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Key-value store with per-entry time-to-live.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Write `value`, replacing any previous value and resetting the TTL.
    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;
}
