//! Error types and HTTP error response handling.
//!
//! Every rejection the gate, the verification flow or key administration can
//! produce is a variant here, and each variant maps to one HTTP status and a
//! stable machine-readable code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// Quota figures reported with a `RateLimitExceeded` rejection.
///
/// `remaining_requests` is `limit - current_usage` and is never clamped, so a
/// negative value shows that concurrent callers overshot the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDetails {
    pub limit: i64,
    pub current_usage: i64,
    pub remaining_requests: i64,
    pub requested_units: i64,
    pub bucket: String,
}

/// Application-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The durable key store failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An ephemeral (verification, usage or result) store failed.
    #[error("Ephemeral store error: {0}")]
    Cache(String),

    /// No `Authorization: Bearer ev_...` header, or it is malformed.
    #[error("Missing or malformed API key. Provide it as 'Authorization: Bearer <key>'")]
    MissingOrMalformedCredential,

    /// The presented key does not exist or has been revoked.
    #[error("Invalid or inactive API key")]
    InvalidOrInactiveKey,

    #[error("API key has expired")]
    KeyExpired,

    /// The hourly quota does not cover the requested units.
    #[error("Rate limit exceeded. Maximum {} requests per hour", .0.limit)]
    RateLimitExceeded(RateLimitDetails),

    /// The email address already holds the maximum number of active keys.
    #[error("You already have {active_keys} active API keys. Please use or revoke existing keys")]
    QuotaExceeded { active_keys: i64 },

    #[error("Invalid or expired verification link")]
    InvalidOrExpiredToken,

    #[error("{0}")]
    Forbidden(String),

    /// Revocation target does not exist or belongs to someone else.
    #[error("API key not found or not owned by your account")]
    NotFound,

    #[error("Invalid admin secret key")]
    InvalidAdminSecret,

    /// Request body or parameters are invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl AppError {
    /// Whether the error came from store infrastructure rather than the caller.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Cache(_))
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "rate_limit_exceeded",
///     "message": "Rate limit exceeded. Maximum 100 requests per hour",
///     "limit": 100,
///     "current_usage": 100,
///     "remaining_requests": 0,
///     "requested_units": 1,
///     "bucket": "2025-01-15T10"
///   }
/// }
/// ```
///
/// Store failures are reported as 503 without internal details.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::MissingOrMalformedCredential => {
                (StatusCode::UNAUTHORIZED, "missing_or_malformed_credential")
            }
            AppError::InvalidOrInactiveKey => (StatusCode::UNAUTHORIZED, "invalid_or_inactive_key"),
            AppError::KeyExpired => (StatusCode::UNAUTHORIZED, "key_expired"),
            AppError::InvalidAdminSecret => (StatusCode::UNAUTHORIZED, "invalid_admin_secret"),
            AppError::RateLimitExceeded(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded"),
            AppError::QuotaExceeded { .. } => (StatusCode::BAD_REQUEST, "quota_exceeded"),
            AppError::InvalidOrExpiredToken => (StatusCode::BAD_REQUEST, "invalid_or_expired_token"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Database(_) | AppError::Cache(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
        };

        let message = match &self {
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::Database(e) => {
                tracing::error!(error = %e, "durable key store failure");
                "Storage is temporarily unavailable, please retry".to_string()
            }
            AppError::Cache(e) => {
                tracing::error!(error = %e, "ephemeral store failure");
                "Storage is temporarily unavailable, please retry".to_string()
            }
            other => other.to_string(),
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });

        if let AppError::RateLimitExceeded(details) = &self {
            if let (Some(obj), Ok(serde_json::Value::Object(extra))) =
                (error.as_object_mut(), serde_json::to_value(details))
            {
                obj.extend(extra);
            }
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limit_rejection_reports_quota_figures() {
        let response = AppError::RateLimitExceeded(RateLimitDetails {
            limit: 5,
            current_usage: 5,
            remaining_requests: 0,
            requested_units: 1,
            bucket: "2025-01-15T10".to_string(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "rate_limit_exceeded");
        assert_eq!(body["error"]["limit"], 5);
        assert_eq!(body["error"]["remaining_requests"], 0);
        assert_eq!(body["error"]["bucket"], "2025-01-15T10");
    }

    #[tokio::test]
    async fn store_failures_hide_details() {
        let response = AppError::Cache("connection refused to 10.0.0.7".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "store_unavailable");
        assert!(!body["error"]["message"].as_str().unwrap().contains("10.0.0.7"));
    }

    #[test]
    fn status_mapping_follows_taxonomy() {
        let cases = [
            (AppError::MissingOrMalformedCredential, StatusCode::UNAUTHORIZED),
            (AppError::InvalidOrInactiveKey, StatusCode::UNAUTHORIZED),
            (AppError::KeyExpired, StatusCode::UNAUTHORIZED),
            (AppError::QuotaExceeded { active_keys: 5 }, StatusCode::BAD_REQUEST),
            (AppError::InvalidOrExpiredToken, StatusCode::BAD_REQUEST),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound, StatusCode::NOT_FOUND),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
