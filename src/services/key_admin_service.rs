//! Key administration for an authenticated owner, plus operator issuance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::IssuancePolicy;
use crate::error::AppError;
use crate::models::api_key::{
    AdminCreateKeyRequest, IssuedKey, KeyRecord, KeySummary, KeyUsage, NewKeyRecord,
};
use crate::services::credentials::{generate_key_value, hash_secret, mask_key};
use crate::services::scorer::{is_valid_syntax, sanitize_email};
use crate::store::usage::hour_bucket;
use crate::store::{KeyStore, UsageStore};

type HmacSha256 = Hmac<Sha256>;

const COMPARE_KEY: &[u8] = b"email-key-gate/admin-secret";
const MAX_ADMIN_VALIDITY_DAYS: i64 = 365;

/// Compare two secrets without leaking where they differ.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let tag = |value: &str| {
        HmacSha256::new_from_slice(COMPARE_KEY).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };

    match (tag(expected), tag(provided)) {
        (Ok(expected), Ok(provided)) => provided
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

/// Operations on keys owned by the caller.
#[derive(Clone)]
pub struct KeyAdmin {
    keys: Arc<dyn KeyStore>,
    usage: UsageStore,
    policy: IssuancePolicy,
    admin_secret: Option<String>,
}

impl KeyAdmin {
    pub fn new(
        keys: Arc<dyn KeyStore>,
        usage: UsageStore,
        policy: IssuancePolicy,
        admin_secret: Option<String>,
    ) -> Self {
        Self {
            keys,
            usage,
            policy,
            admin_secret,
        }
    }

    /// All keys of `owner_email`, newest first, secrets masked.
    pub async fn list(&self, owner_email: &str) -> Result<Vec<KeySummary>, AppError> {
        let keys = self.keys.list_for_owner(owner_email).await?;
        Ok(keys.into_iter().map(KeySummary::from).collect())
    }

    /// Deactivate one of the caller's other keys.
    ///
    /// # Errors
    ///
    /// - `Forbidden`: `key_id` is the key making this call
    /// - `NotFound`: no such key, or it belongs to another owner
    ///
    /// Revoking an already inactive key succeeds again.
    pub async fn revoke(&self, caller: &KeyRecord, key_id: Uuid) -> Result<(), AppError> {
        if caller.id == key_id {
            return Err(AppError::Forbidden(
                "Cannot revoke the API key that's currently being used for authentication"
                    .to_string(),
            ));
        }

        if !self.keys.deactivate(key_id, &caller.owner_email).await? {
            return Err(AppError::NotFound);
        }

        tracing::info!(key_id = %key_id, revoked_by = %caller.id, "api key revoked");
        Ok(())
    }

    /// Usage report for the calling key.
    ///
    /// `total_requests` is re-read from the key store because the gate's copy
    /// predates this call's own accounting.
    pub async fn usage(&self, caller: &KeyRecord) -> Result<KeyUsage, AppError> {
        let total_requests = self
            .keys
            .find_by_id(caller.id)
            .await?
            .map_or(caller.total_requests, |k| k.total_requests);

        let bucket = hour_bucket(Utc::now());
        let recent_usage = self.usage.current(&caller.key_hash, &bucket).await?;

        Ok(KeyUsage {
            total_requests,
            recent_usage,
            remaining_requests: i64::from(caller.rate_limit) - recent_usage,
            rate_limit: caller.rate_limit,
            expires_at: caller.expires_at,
        })
    }

    /// Issue a key directly, bypassing email verification.
    ///
    /// # Errors
    ///
    /// - `InvalidAdminSecret`: no admin secret configured, or it does not match
    /// - `InvalidRequest`: bad name, email or expiry
    pub async fn create_admin_key(
        &self,
        request: AdminCreateKeyRequest,
    ) -> Result<IssuedKey, AppError> {
        let authorized = self
            .admin_secret
            .as_deref()
            .is_some_and(|expected| secrets_match(expected, &request.secret_key));
        if !authorized {
            tracing::warn!("admin key creation rejected");
            return Err(AppError::InvalidAdminSecret);
        }

        let name = request.name.trim().to_string();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::InvalidRequest(
                "Name must be between 1 and 100 characters".to_string(),
            ));
        }

        let email = sanitize_email(&request.email);
        if !is_valid_syntax(&email) {
            return Err(AppError::InvalidRequest(
                "Please provide a valid email address".to_string(),
            ));
        }

        let validity = match request.expires_in_days {
            None => None,
            Some(days) if (1..=MAX_ADMIN_VALIDITY_DAYS).contains(&days) => {
                Some(Duration::days(days))
            }
            Some(_) => {
                return Err(AppError::InvalidRequest(
                    "Expiration time must be between 1 and 365 days".to_string(),
                ));
            }
        };

        let now = Utc::now();
        let key_value = generate_key_value();
        let record = self
            .keys
            .insert(NewKeyRecord {
                key_hash: hash_secret(&key_value),
                key_hint: mask_key(&key_value),
                owner_email: email,
                display_name: name,
                purpose: None,
                rate_limit: self.policy.rate_limit,
                created_at: now,
                expires_at: validity.map(|d| now + d),
                issued_from: None,
            })
            .await?
            .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

        tracing::info!(key_id = %record.id, owner_email = %record.owner_email, "api key issued by operator");

        Ok(IssuedKey {
            id: record.id,
            key_value,
            rate_limit: record.rate_limit,
            expires_at: record.expires_at,
        })
    }
}
