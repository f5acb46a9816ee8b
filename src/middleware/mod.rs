//! HTTP middleware components.
//!
//! Middleware run before route handlers and can short-circuit a request, for
//! example when its API key is missing, revoked or over quota.

/// API key admission and accounting
pub mod auth;
