//! HTTP handlers for the protected email scoring capability.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
};

use crate::config::MAX_BULK_EMAILS;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::validation::{
    BulkValidateRequest, BulkValidateResponse, ValidateQuery, ValidateResponse,
};
use crate::services::scorer::sanitize_email;
use crate::state::AppState;

const RESULT_CACHE_CONTROL: &str = "public, max-age=86400";

fn cache_headers(etag: &str) -> [(HeaderName, HeaderValue); 2] {
    [
        (
            ETAG,
            HeaderValue::from_str(etag).unwrap_or_else(|_| HeaderValue::from_static("\"v1\"")),
        ),
        (CACHE_CONTROL, HeaderValue::from_static(RESULT_CACHE_CONTROL)),
    ]
}

/// Score a single email address.
///
/// # Caching
///
/// Responses carry `ETag: "<email>-v1"`. A request whose `If-None-Match`
/// equals that tag gets 304 Not Modified without being rescored; it still
/// counts against the hourly quota.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "result": {
///     "email": "a@x.com",
///     "is_valid": true,
///     "score": 0.65,
///     "checks": { "syntax": true, "mx_records": false, ... }
///   }
/// }
/// ```
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ValidateQuery>,
) -> Result<Response, AppError> {
    let email = sanitize_email(&query.email);
    if email.is_empty() {
        return Err(AppError::InvalidRequest(
            "Email parameter is required".to_string(),
        ));
    }

    let etag = format!("\"{}-v1\"", email);
    let not_modified = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, cache_headers(&etag)).into_response());
    }

    let result = state.validator.validate_one(&email).await;

    Ok((cache_headers(&etag), Json(ValidateResponse { result })).into_response())
}

/// Score up to 1000 addresses in one call.
///
/// The call needs quota for every submitted entry, duplicates included, and is
/// rejected outright when the remaining hourly quota is smaller.
///
/// # Request Body
///
/// ```json
/// { "emails": ["a@x.com", "b@y.org"] }
/// ```
pub async fn validate_bulk(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<BulkValidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.emails.is_empty() {
        return Err(AppError::InvalidRequest(
            "At least one email is required".to_string(),
        ));
    }
    if request.emails.len() > MAX_BULK_EMAILS {
        return Err(AppError::InvalidRequest(format!(
            "At most {} emails can be validated per request",
            MAX_BULK_EMAILS
        )));
    }

    let units = request.emails.len() as i64;
    let admission = state.gate.check_quota(auth.key, units).await?;

    let results = state.validator.validate_many(&request.emails).await;

    state.gate.account(&admission).await;

    Ok(Json(BulkValidateResponse { results }))
}
