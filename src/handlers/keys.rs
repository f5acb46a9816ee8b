//! HTTP handlers for the key lifecycle: request, verify, list, revoke, usage.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::api_key::{AdminCreateKeyRequest, KeyListResponse};
use crate::models::verification::RequestKeyRequest;
use crate::state::AppState;

/// Request a new API key for an email address.
///
/// # Request Body
///
/// ```json
/// {
///   "email": "a@x.com",
///   "name": "test",
///   "purpose": "ci"
/// }
/// ```
///
/// # Response
///
/// 200 OK once the pending verification is stored, whether or not the email
/// could be delivered:
///
/// ```json
/// {
///   "message": "Verification email sent. ...",
///   "email": "a@x.com",
///   "email_sent": true
/// }
/// ```
///
/// # Errors
///
/// - 400 `quota_exceeded`: the address already holds too many active keys
/// - 400 `invalid_request`: bad email, name or purpose
pub async fn request_key(
    State(state): State<AppState>,
    Json(request): Json<RequestKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.verification.request(request).await?;

    Ok(Json(response))
}

/// Redeem the emailed verification token for a new key.
///
/// # Response
///
/// Returns 201 Created. This is the only response that ever carries the
/// plaintext key.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "key_value": "ev_6f1c2f0e-0d5a-4e57-9a43-3c0e7a5c9b21",
///   "rate_limit": 100,
///   "expires_at": "2026-01-15T10:30:00Z"
/// }
/// ```
pub async fn verify_key(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let issued = state.verification.redeem(&token).await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// List every key owned by the caller's email, newest first.
///
/// Keys are masked (`ev_6...9b21`).
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let email = auth.key.owner_email;
    let keys = state.admin.list(&email).await?;

    Ok(Json(KeyListResponse { email, keys }))
}

/// Revoke another key owned by the caller.
///
/// # Errors
///
/// - 403 when `id` is the key making the request
/// - 404 when `id` is malformed, does not exist, or belongs to another owner
pub async fn revoke_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // A malformed id cannot name one of the caller's keys.
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound)?;
    state.admin.revoke(&auth.key, id).await?;

    Ok(Json(json!({ "message": "API key revoked successfully" })))
}

/// Usage of the calling key in the current hour and over its lifetime.
pub async fn key_usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let usage = state.admin.usage(&auth.key).await?;

    Ok(Json(usage))
}

/// Issue a key without email verification, for operators holding the admin
/// secret.
pub async fn create_admin_key(
    State(state): State<AppState>,
    Json(request): Json<AdminCreateKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = state.admin.create_admin_key(request).await?;

    Ok((StatusCode::CREATED, Json(issued)))
}
