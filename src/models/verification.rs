//! Email verification models.
//!
//! A verification moves through two states: pending, held in the ephemeral
//! store under its token, and issued, recorded on the key row as the token's
//! hash in `issued_from`. The move is one-way; only a pending token can be
//! redeemed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending request stored in the verification store under its token.
///
/// # Stored JSON
///
/// ```json
/// {
///   "email": "a@x.com",
///   "name": "test",
///   "purpose": "ci pipeline",
///   "expires_at": "2025-01-15T11:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub purpose: Option<String>,
    /// Mirrors the store TTL for display; the TTL is authoritative
    pub expires_at: DateTime<Utc>,
}


/// Request body for `POST /api/keys/request`.
///
/// # Validation
///
/// - `email`: required, must be a syntactically valid address
/// - `name`: 1 to 100 characters
/// - `purpose`: optional, at most 500 characters; blank counts as absent
#[derive(Debug, Deserialize)]
pub struct RequestKeyRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Response body for `POST /api/keys/request`.
#[derive(Debug, Serialize)]
pub struct RequestKeyResponse {
    pub message: String,
    pub email: String,
    /// Whether the verification email reached the delivery provider
    pub email_sent: bool,
}
