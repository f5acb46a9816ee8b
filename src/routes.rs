//! HTTP router assembly.

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::middleware::auth::{auth_middleware, metered_middleware};
use crate::state::AppState;

/// Build the application router.
///
/// # Route groups
///
/// - public: health, key request, token redemption, admin issuance
/// - metered: one unit of hourly quota per call
/// - authenticated: the handler admits its own units (bulk validation)
pub fn router(state: AppState) -> Router {
    let metered_routes = Router::new()
        .route("/api/keys", get(handlers::keys::list_keys))
        .route("/api/keys/usage", get(handlers::keys::key_usage))
        .route("/api/keys/{id}", delete(handlers::keys::revoke_key))
        .route("/api/validate", get(handlers::validation::validate))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            metered_middleware,
        ));

    let authenticated_routes = Router::new()
        .route(
            "/api/validate/bulk",
            post(handlers::validation::validate_bulk),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/api/keys/request", post(handlers::keys::request_key))
        .route("/api/keys/verify/{token}", get(handlers::keys::verify_key))
        .route("/api/create-api-key", post(handlers::keys::create_admin_key))
        .merge(metered_routes)
        .merge(authenticated_routes)
        .layer(CorsLayer::permissive().max_age(Duration::from_secs(86400)));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span carrying the route template instead of the URI, so tokens in
/// path segments never reach the logs.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str);

    tracing::info_span!("request", method = %request.method(), path)
}
