//! Redis-backed ephemeral store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::error::AppError;
use crate::store::EphemeralStore;

/// `EphemeralStore` over Redis `GET` / `SET EX` / `DEL`.
///
/// Every key is prefixed with the namespace given at construction, so several
/// deployments can share one Redis database.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    namespace: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("namespace", &self.namespace)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::open(url)
            .map_err(|e| AppError::Cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            namespace: namespace.into(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.connection.clone();

        conn.get(self.namespaced(key))
            .await
            .map_err(|e| AppError::Cache(format!("Failed to read ephemeral entry: {}", e)))
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(self.namespaced(key), value, ttl_secs)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to write ephemeral entry: {}", e)))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.connection.clone();

        let _: i64 = conn
            .del(self.namespaced(key))
            .await
            .map_err(|e| AppError::Cache(format!("Failed to delete ephemeral entry: {}", e)))?;

        Ok(())
    }
}
