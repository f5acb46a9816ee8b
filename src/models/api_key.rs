//! API key model for authentication and metering.
//!
//! Keys are stored as SHA-256 hashes. The plaintext `ev_...` value is returned
//! exactly once, when the key is issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. Rows are never deleted: revocation flips
/// `is_active` to false and keeps usage history available.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct KeyRecord {
    /// Unique identifier for this API key
    pub id: Uuid,

    /// SHA-256 hash of the bearer secret (64 hex characters)
    ///
    /// When a request comes in with "Bearer ev_abc", we hash "ev_abc" and look
    /// the hash up here.
    pub key_hash: String,

    /// Masked form of the secret (`ev_1...cdef`), computed at issuance
    pub key_hint: String,

    pub owner_email: String,

    pub display_name: String,

    /// Intended use given by the requester
    pub purpose: Option<String>,

    /// Requests per hour, fixed at issuance
    pub rate_limit: i32,

    /// Lifetime count of admitted requests
    pub total_requests: i64,

    pub created_at: DateTime<Utc>,

    /// Absolute expiry; `None` means the key never expires
    pub expires_at: Option<DateTime<Utc>>,

    /// One-way flag: once false, the key is rejected forever
    pub is_active: bool,

    pub last_used_at: Option<DateTime<Utc>>,

    /// Hash of the verification token this key was issued from
    ///
    /// Unique, so one token can never produce two keys.
    pub issued_from: Option<String>,
}

impl KeyRecord {
    /// Whether the key's expiry lies before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// Values needed to insert a new key row.
#[derive(Debug, Clone)]
pub struct NewKeyRecord {
    pub key_hash: String,
    pub key_hint: String,
    pub owner_email: String,
    pub display_name: String,
    pub purpose: Option<String>,
    pub rate_limit: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_from: Option<String>,
}

impl NewKeyRecord {
    /// Materialize the row a store would hold after inserting these values.
    pub fn into_record(self, id: Uuid) -> KeyRecord {
        KeyRecord {
            id,
            key_hash: self.key_hash,
            key_hint: self.key_hint,
            owner_email: self.owner_email,
            display_name: self.display_name,
            purpose: self.purpose,
            rate_limit: self.rate_limit,
            total_requests: 0,
            created_at: self.created_at,
            expires_at: self.expires_at,
            is_active: true,
            last_used_at: None,
            issued_from: self.issued_from,
        }
    }
}

/// A freshly issued key. The only place the plaintext secret ever appears.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "key_value": "ev_6f1c2f0e-0d5a-4e57-9a43-3c0e7a5c9b21",
///   "rate_limit": 100,
///   "expires_at": "2026-01-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct IssuedKey {
    pub id: Uuid,
    pub key_value: String,
    pub rate_limit: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Listing entry for `GET /api/keys`.
///
/// `key_value` carries the masked hint only; the secret cannot be rebuilt from it.
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    pub id: Uuid,
    pub key_value: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub rate_limit: i32,
    pub total_requests: i64,
}

impl From<KeyRecord> for KeySummary {
    fn from(record: KeyRecord) -> Self {
        Self {
            id: record.id,
            key_value: record.key_hint,
            name: record.display_name,
            created_at: record.created_at,
            last_used_at: record.last_used_at,
            expires_at: record.expires_at,
            is_active: record.is_active,
            rate_limit: record.rate_limit,
            total_requests: record.total_requests,
        }
    }
}

/// Response body for `GET /api/keys`.
#[derive(Debug, Serialize)]
pub struct KeyListResponse {
    pub email: String,
    pub keys: Vec<KeySummary>,
}

/// Usage report for the key that authenticated the call.
///
/// `remaining_requests` may be negative when concurrent requests overshot the
/// hourly window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyUsage {
    pub total_requests: i64,
    pub recent_usage: i64,
    pub remaining_requests: i64,
    pub rate_limit: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /api/create-api-key`.
///
/// # JSON Example
///
/// ```json
/// {
///   "secret_key": "3f9a...",
///   "name": "internal-monitoring",
///   "email": "ops@example.com",
///   "expires_in_days": 30
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct AdminCreateKeyRequest {
    pub secret_key: String,
    pub name: String,
    pub email: String,
    /// 1..=365 days; absent means the key never expires
    pub expires_in_days: Option<i64>,
}
