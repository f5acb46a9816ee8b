//! API key admission middleware.
//!
//! Two layers wrap protected routes:
//! - [`metered_middleware`] admits one unit of quota, runs the handler, then
//!   accounts the call whatever the handler returned
//! - [`auth_middleware`] only authenticates; the handler decides how many
//!   units to admit (bulk validation)
//!
//! Either way the resolved key is injected as [`AuthContext`].

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::api_key::KeyRecord;
use crate::state::AppState;

/// Authentication context attached to admitted requests.
///
/// Handlers extract it with `Extension<AuthContext>` to learn which key, and
/// therefore which owner, made the call.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub key: KeyRecord,
}

fn authorization(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
}

/// Admit one unit, run the handler, then account it.
///
/// # Flow
///
/// 1. Authenticate `Authorization: Bearer ev_...` and check the hourly quota
/// 2. Inject `AuthContext` and run the handler
/// 3. Write the usage counter and schedule the key row update
///
/// Rejections in step 1 short-circuit with the matching 401/429/503.
pub async fn metered_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let admission = state
        .gate
        .admit(authorization(&request).as_deref())
        .await?;

    request.extensions_mut().insert(AuthContext {
        key: admission.key.clone(),
    });

    let response = next.run(request).await;

    // Accounted even when the handler failed.
    state.gate.account(&admission).await;

    Ok(response)
}

/// Authenticate without admitting any quota.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = state
        .gate
        .authenticate(authorization(&request).as_deref())
        .await?;

    request.extensions_mut().insert(AuthContext { key });

    Ok(next.run(request).await)
}
