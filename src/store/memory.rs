//! In-process store implementations.
//!
//! `MemoryStore` is the ephemeral store used when no Redis URL is configured.
//! `InMemoryKeyStore` mirrors the Postgres key store for tests and local runs.
//! Both can be switched into an unavailable state to exercise store outages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::api_key::{KeyRecord, NewKeyRecord};
use crate::store::{EphemeralStore, KeyStore};

/// Upper bound on any entry's lifetime; per-entry TTLs are checked on read.
const MAX_ENTRY_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Ephemeral store backed by moka.
#[derive(Debug)]
pub struct MemoryStore {
    cache: MokaCache<String, Entry>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(100_000)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            cache: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(MAX_ENTRY_LIFETIME)
                .build(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent operation fail with `AppError::Cache`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Cache("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.check_available()?;

        match self.cache.get(key).await {
            Some(entry) if Instant::now() >= entry.expires_at => {
                self.cache.remove(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        self.check_available()?;

        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl.min(MAX_ENTRY_LIFETIME),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.check_available()?;

        self.cache.remove(key).await;
        Ok(())
    }
}

/// Key store held in a map, with the same semantics as `PgKeyStore`.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<Uuid, KeyRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail like a lost database connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn insert(&self, key: NewKeyRecord) -> Result<Option<KeyRecord>, AppError> {
        self.check_available()?;
        let mut keys = self.keys.write().await;

        if let Some(token_hash) = &key.issued_from {
            if keys
                .values()
                .any(|k| k.issued_from.as_ref() == Some(token_hash))
            {
                return Ok(None);
            }
        }
        if keys.values().any(|k| k.key_hash == key.key_hash) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "duplicate key_hash".to_string(),
            )));
        }

        let record = key.into_record(Uuid::new_v4());
        keys.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<KeyRecord>, AppError> {
        self.check_available()?;
        let keys = self.keys.read().await;
        Ok(keys.values().find(|k| k.key_hash == key_hash).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<KeyRecord>, AppError> {
        self.check_available()?;
        Ok(self.keys.read().await.get(&id).cloned())
    }

    async fn count_active_for_owner(&self, owner_email: &str) -> Result<i64, AppError> {
        self.check_available()?;
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .filter(|k| k.owner_email == owner_email && k.is_active)
            .count() as i64)
    }

    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<KeyRecord>, AppError> {
        self.check_available()?;
        let keys = self.keys.read().await;

        let mut owned: Vec<KeyRecord> = keys
            .values()
            .filter(|k| k.owner_email == owner_email)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(owned)
    }

    async fn deactivate(&self, id: Uuid, owner_email: &str) -> Result<bool, AppError> {
        self.check_available()?;
        let mut keys = self.keys.write().await;

        match keys.get_mut(&id) {
            Some(key) if key.owner_email == owner_email => {
                key.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_use(&self, id: Uuid, units: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        self.check_available()?;
        if let Some(key) = self.keys.write().await.get_mut(&id) {
            key.total_requests += units;
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_vanish_after_their_ttl() {
        let store = MemoryStore::new();

        store
            .put_with_ttl("short", "1", Duration::from_millis(20))
            .await
            .unwrap();
        store
            .put_with_ttl("long", "2", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn put_replaces_value_and_ttl() {
        let store = MemoryStore::new();

        store
            .put_with_ttl("k", "1", Duration::from_millis(20))
            .await
            .unwrap();
        store
            .put_with_ttl("k", "2", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn unavailable_store_reports_cache_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let err = store.get("k").await.unwrap_err();
        assert!(err.is_store_unavailable());
    }

    fn new_key(email: &str, hash: &str, token: Option<&str>) -> NewKeyRecord {
        NewKeyRecord {
            key_hash: hash.to_string(),
            key_hint: "ev_1...abcd".to_string(),
            owner_email: email.to_string(),
            display_name: "test".to_string(),
            purpose: None,
            rate_limit: 10,
            created_at: Utc::now(),
            expires_at: None,
            issued_from: token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn one_token_issues_at_most_one_key() {
        let store = InMemoryKeyStore::new();

        let first = store.insert(new_key("a@x.com", "h1", Some("t"))).await.unwrap();
        let second = store.insert(new_key("a@x.com", "h2", Some("t"))).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.count_active_for_owner("a@x.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deactivate_requires_ownership_and_is_repeatable() {
        let store = InMemoryKeyStore::new();
        let key = store
            .insert(new_key("a@x.com", "h1", None))
            .await
            .unwrap()
            .unwrap();

        assert!(!store.deactivate(key.id, "b@x.com").await.unwrap());
        assert!(store.deactivate(key.id, "a@x.com").await.unwrap());
        assert!(store.deactivate(key.id, "a@x.com").await.unwrap());
        assert_eq!(store.count_active_for_owner("a@x.com").await.unwrap(), 0);
    }
}
