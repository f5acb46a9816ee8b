//! PostgreSQL key store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::api_key::{KeyRecord, NewKeyRecord};
use crate::store::KeyStore;

const KEY_COLUMNS: &str = "id, key_hash, key_hint, owner_email, display_name, purpose, \
     rate_limit, total_requests, created_at, expires_at, is_active, last_used_at, issued_from";

/// `KeyStore` over the `api_keys` table.
#[derive(Debug, Clone)]
pub struct PgKeyStore {
    pool: DbPool,
}

impl PgKeyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn insert(&self, key: NewKeyRecord) -> Result<Option<KeyRecord>, AppError> {
        // A NULL issued_from never conflicts, so admin-issued keys always insert.
        let sql = format!(
            r#"
            INSERT INTO api_keys (
                key_hash,
                key_hint,
                owner_email,
                display_name,
                purpose,
                rate_limit,
                created_at,
                expires_at,
                issued_from,
                is_active,
                total_requests
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true, 0)
            ON CONFLICT (issued_from) DO NOTHING
            RETURNING {KEY_COLUMNS}
            "#
        );

        let record = sqlx::query_as::<_, KeyRecord>(&sql)
            .bind(&key.key_hash)
            .bind(&key.key_hint)
            .bind(&key.owner_email)
            .bind(&key.display_name)
            .bind(&key.purpose)
            .bind(key.rate_limit)
            .bind(key.created_at)
            .bind(key.expires_at)
            .bind(&key.issued_from)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<KeyRecord>, AppError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE key_hash = $1");

        let record = sqlx::query_as::<_, KeyRecord>(&sql)
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<KeyRecord>, AppError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE id = $1");

        let record = sqlx::query_as::<_, KeyRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn count_active_for_owner(&self, owner_email: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM api_keys WHERE owner_email = $1 AND is_active = true",
        )
        .bind(owner_email)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn list_for_owner(&self, owner_email: &str) -> Result<Vec<KeyRecord>, AppError> {
        let sql = format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE owner_email = $1 ORDER BY created_at DESC"
        );

        let records = sqlx::query_as::<_, KeyRecord>(&sql)
            .bind(owner_email)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn deactivate(&self, id: Uuid, owner_email: &str) -> Result<bool, AppError> {
        // Postgres counts matched rows, so an already inactive key still reports 1.
        let result =
            sqlx::query("UPDATE api_keys SET is_active = false WHERE id = $1 AND owner_email = $2")
                .bind(id)
                .bind(owner_email)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_use(&self, id: Uuid, units: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE api_keys
            SET total_requests = total_requests + $2,
                last_used_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(units)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
