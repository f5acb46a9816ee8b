//! HTTP request handlers (route handlers).
//!
//! Each handler extracts request data, calls into a service, and turns the
//! outcome into a JSON response or an `AppError`.

/// Service health
pub mod health;

/// Key request, verification and administration endpoints
pub mod keys;

/// Email scoring endpoints
pub mod validation;
